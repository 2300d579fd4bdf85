//! Selection masks derived from a materialized predicate column.
//!
//! Truthiness follows the filter contract: a value passes when it is non-zero
//! (`UInt8`) or `true` (`Boolean`); nulls never pass.

use arrow::{
    array::{Array, ArrayRef, AsArray, BooleanArray, BooleanBufferBuilder, UInt32Array},
    buffer::BooleanBuffer,
    compute::{cast, take, FilterBuilder, FilterPredicate},
    datatypes::{DataType, UInt8Type},
};

use crate::{column::Column, error::FilterError};

/// Outcome of a filter known without looking at individual rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every row passes.
    AlwaysTrue,
    /// No row passes.
    AlwaysFalse,
}

/// Rows selected by a predicate column.
#[derive(Debug)]
pub enum SelectionMask {
    /// The whole chunk passes or fails.
    Verdict(Verdict),
    /// A per-row selection.
    Rows(RowSelection),
}

/// Per-row selection used to compact columns.
#[derive(Debug)]
pub enum RowSelection {
    /// One bit per row.
    Dense(DenseSelection),
    /// Ascending list of surviving rows.
    Sparse(SparseSelection),
}

/// Bitmap selection, with an Arrow filter prepared once for every column of the chunk.
#[derive(Debug)]
pub struct DenseSelection {
    mask: BooleanBuffer,
    predicate: FilterPredicate,
}

impl DenseSelection {
    /// Prepare a selection from one bit per row.
    pub fn new(mask: BooleanBuffer) -> Self {
        let predicate = FilterBuilder::new(&BooleanArray::new(mask.clone(), None))
            .optimize()
            .build();
        Self { mask, predicate }
    }

    /// The selection bitmap.
    pub fn mask(&self) -> &BooleanBuffer {
        &self.mask
    }
}

/// Index-list selection produced by sparse predicates.
#[derive(Debug)]
pub struct SparseSelection {
    rows: UInt32Array,
    len: usize,
}

impl SparseSelection {
    /// `rows` must ascend and stay below `len`.
    pub fn new(rows: Vec<u32>, len: usize) -> Self {
        Self {
            rows: UInt32Array::from(rows),
            len,
        }
    }

    /// Surviving rows, ascending.
    pub fn rows(&self) -> &[u32] {
        self.rows.values()
    }

    /// Row count of the chunk the selection applies to.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the selection applies to an empty chunk.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl RowSelection {
    /// Number of surviving rows.
    pub fn count(&self) -> usize {
        match self {
            RowSelection::Dense(selection) => selection.predicate.count(),
            RowSelection::Sparse(selection) => selection.rows.len(),
        }
    }

    /// Row count of the chunk the selection applies to.
    pub fn input_len(&self) -> usize {
        match self {
            RowSelection::Dense(selection) => selection.mask.len(),
            RowSelection::Sparse(selection) => selection.len,
        }
    }

    pub(crate) fn filter_array(&self, array: &dyn Array) -> Result<ArrayRef, FilterError> {
        match self {
            RowSelection::Dense(selection) => Ok(selection.predicate.filter(array)?),
            RowSelection::Sparse(selection) => Ok(take(array, &selection.rows, None)?),
        }
    }
}

impl SelectionMask {
    /// Derive the mask for a predicate column.
    ///
    /// Constants yield a [`Verdict`]. Sparse predicates whose default reads as false
    /// select only among their explicit entries. Everything else becomes a bitmap.
    pub fn build(predicate: &Column) -> Result<Self, FilterError> {
        match predicate {
            Column::Constant { value, .. } => Ok(SelectionMask::Verdict(constant_verdict(
                value.as_ref(),
            )?)),
            Column::Sparse(sparse) if !scalar_truth(sparse.default_value().as_ref())? => {
                let truth = truth_of_array(sparse.values().as_ref())?;
                let rows = sparse
                    .offsets()
                    .iter()
                    .zip(truth.iter())
                    .filter_map(|(&row, passes)| passes.then_some(row))
                    .collect();
                Ok(SelectionMask::Rows(RowSelection::Sparse(SparseSelection::new(
                    rows,
                    sparse.len(),
                ))))
            }
            other => Ok(SelectionMask::Rows(RowSelection::Dense(DenseSelection::new(
                truth_of_column(other)?,
            )))),
        }
    }
}

/// Number of rows a selection keeps.
pub fn count_selected(rows: &RowSelection) -> usize {
    rows.count()
}

/// Verdict of a single-value predicate.
pub fn constant_verdict(value: &dyn Array) -> Result<Verdict, FilterError> {
    Ok(if scalar_truth(value)? {
        Verdict::AlwaysTrue
    } else {
        Verdict::AlwaysFalse
    })
}

fn scalar_truth(value: &dyn Array) -> Result<bool, FilterError> {
    let truth = truth_of_array(value)?;
    Ok(!truth.is_empty() && truth.value(0))
}

fn truth_of_array(array: &dyn Array) -> Result<BooleanBuffer, FilterError> {
    let values = match array.data_type() {
        DataType::Boolean => array.as_boolean().values().clone(),
        DataType::UInt8 => {
            let array = array.as_primitive::<UInt8Type>();
            BooleanBuffer::collect_bool(array.len(), |i| array.value(i) != 0)
        }
        DataType::Null => BooleanBuffer::new_unset(array.len()),
        DataType::Dictionary(_, value_type) => {
            return truth_of_array(cast(array, value_type)?.as_ref())
        }
        other => return Err(FilterError::NonBooleanData(other.clone())),
    };
    Ok(match array.logical_nulls() {
        Some(nulls) => &values & nulls.inner(),
        None => values,
    })
}

fn truth_of_column(column: &Column) -> Result<BooleanBuffer, FilterError> {
    match column {
        Column::Dense(array) => truth_of_array(array.as_ref()),
        Column::Constant { value, len } => Ok(if scalar_truth(value.as_ref())? {
            BooleanBuffer::new_set(*len)
        } else {
            BooleanBuffer::new_unset(*len)
        }),
        Column::Sparse(sparse) => {
            let truth = truth_of_array(sparse.values().as_ref())?;
            let mut builder = BooleanBufferBuilder::new(sparse.len());
            builder.append_n(sparse.len(), scalar_truth(sparse.default_value().as_ref())?);
            for (entry, &row) in sparse.offsets().iter().enumerate() {
                builder.set_bit(row as usize, truth.value(entry));
            }
            Ok(builder.finish())
        }
        Column::Nullable { inner, nulls } => Ok(&truth_of_column(inner)? & nulls.inner()),
        Column::Dictionary { keys, values } => {
            let truth = truth_of_array(values.as_ref())?;
            if keys.values().iter().any(|&key| key as usize >= truth.len()) {
                return Err(FilterError::InvalidColumn("dictionary key out of range"));
            }
            Ok(BooleanBuffer::collect_bool(keys.len(), |i| {
                truth.value(keys.value(i) as usize)
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{Int32Array, UInt8Array},
        buffer::NullBuffer,
    };

    use super::*;

    fn dense_bits(mask: &SelectionMask) -> Vec<bool> {
        match mask {
            SelectionMask::Rows(RowSelection::Dense(selection)) => {
                selection.mask().iter().collect()
            }
            other => panic!("expected dense mask, got {other:?}"),
        }
    }

    #[test]
    fn constant_predicates_become_verdicts() {
        let truthy = Column::constant(Arc::new(UInt8Array::from(vec![3])), 10).expect("const");
        let falsy = Column::constant(Arc::new(UInt8Array::from(vec![0])), 10).expect("const");
        let null =
            Column::constant(Arc::new(UInt8Array::from(vec![None::<u8>])), 10).expect("const");

        assert!(matches!(
            SelectionMask::build(&truthy).expect("mask"),
            SelectionMask::Verdict(Verdict::AlwaysTrue)
        ));
        assert!(matches!(
            SelectionMask::build(&falsy).expect("mask"),
            SelectionMask::Verdict(Verdict::AlwaysFalse)
        ));
        assert!(matches!(
            SelectionMask::build(&null).expect("mask"),
            SelectionMask::Verdict(Verdict::AlwaysFalse)
        ));
    }

    #[test]
    fn dense_nulls_read_as_false() {
        let column = Column::dense(Arc::new(UInt8Array::from(vec![
            Some(1),
            None,
            Some(0),
            Some(100),
        ])));
        let mask = SelectionMask::build(&column).expect("mask");
        assert_eq!(dense_bits(&mask), vec![true, false, false, true]);
        let SelectionMask::Rows(rows) = mask else {
            unreachable!()
        };
        assert_eq!(count_selected(&rows), 2);
    }

    #[test]
    fn sparse_predicate_selects_explicit_truthy_entries() {
        let column = Column::sparse(
            6,
            vec![1, 2, 4],
            Arc::new(UInt8Array::from(vec![Some(0), Some(1), Some(1)])),
            Arc::new(UInt8Array::from(vec![0])),
        )
        .expect("sparse");
        match SelectionMask::build(&column).expect("mask") {
            SelectionMask::Rows(RowSelection::Sparse(selection)) => {
                assert_eq!(selection.rows(), &[2, 4]);
                assert_eq!(selection.len(), 6);
            }
            other => panic!("expected sparse mask, got {other:?}"),
        }
    }

    #[test]
    fn nullable_dictionary_predicate_is_dense() {
        let keys = UInt32Array::from(vec![0, 1, 1, 0]);
        let values: ArrayRef = Arc::new(arrow::array::BooleanArray::from(vec![false, true]));
        let dictionary = Column::Dictionary { keys, values };
        let nulls = NullBuffer::from(vec![true, true, false, true]);
        let column = Column::nullable(dictionary, nulls).expect("nullable");

        let mask = SelectionMask::build(&column).expect("mask");
        assert_eq!(dense_bits(&mask), vec![false, true, false, false]);
    }

    #[test]
    fn non_boolean_data_is_rejected() {
        let column = Column::dense(Arc::new(Int32Array::from(vec![1, 2])));
        let err = SelectionMask::build(&column).expect_err("int32 predicate");
        assert!(matches!(err, FilterError::NonBooleanData(DataType::Int32)));
    }
}
