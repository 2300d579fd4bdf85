//! Physical column representations.
//!
//! A [`Column`] is a closed set of layouts over Arrow arrays. The logical type
//! of a column never depends on the layout, so consumers should go through
//! [`Column::data_type`] and [`Column::materialize`] rather than matching on
//! a particular variant.

use std::sync::Arc;

use arrow::{
    array::{
        new_null_array, Array, ArrayRef, AsArray, BooleanArray, DictionaryArray, UInt32Array,
        UInt8Array,
    },
    buffer::NullBuffer,
    compute::{cast, concat, nullif, take},
    datatypes::{DataType, UInt32Type},
};

use crate::{error::FilterError, selection::RowSelection};

/// A column of one chunk.
#[derive(Debug, Clone)]
pub enum Column {
    /// One explicit value per row.
    Dense(ArrayRef),
    /// A single value logically repeated `len` times. `value` holds exactly one element.
    Constant {
        /// The repeated value.
        value: ArrayRef,
        /// Logical row count.
        len: usize,
    },
    /// Explicit values for a sorted set of rows, every other row reads as the default.
    Sparse(SparseColumn),
    /// Another representation plus a per-row validity bitmap.
    Nullable {
        /// Wrapped representation.
        inner: Box<Column>,
        /// Validity of each row; invalid rows read as null.
        nulls: NullBuffer,
    },
    /// Per-row indices into a shared value table.
    Dictionary {
        /// Index of each row's value in `values`.
        keys: UInt32Array,
        /// Shared dictionary.
        values: ArrayRef,
    },
}

/// Storage for [`Column::Sparse`].
#[derive(Debug, Clone)]
pub struct SparseColumn {
    len: usize,
    offsets: UInt32Array,
    values: ArrayRef,
    default: ArrayRef,
}

impl SparseColumn {
    /// Row count of the column.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows holding an explicit value, ascending.
    pub fn offsets(&self) -> &[u32] {
        self.offsets.values()
    }

    /// Explicit values, aligned with [`SparseColumn::offsets`].
    pub fn values(&self) -> &ArrayRef {
        &self.values
    }

    /// Value read by every row not listed in the offsets.
    pub fn default_value(&self) -> &ArrayRef {
        &self.default
    }

    fn cut(&self, len: usize) -> Self {
        let kept = self.offsets().partition_point(|&offset| (offset as usize) < len);
        Self {
            len,
            offsets: self.offsets.slice(0, kept),
            values: self.values.slice(0, kept),
            default: Arc::clone(&self.default),
        }
    }

    fn filter(&self, rows: &RowSelection) -> Result<Self, FilterError> {
        let mut kept = Vec::new();
        let mut offsets = Vec::new();
        match rows {
            RowSelection::Dense(selection) => {
                let mask = selection.mask();
                let mut rank = 0;
                let mut scanned = 0;
                for (entry, &offset) in self.offsets().iter().enumerate() {
                    let offset = offset as usize;
                    rank += mask.slice(scanned, offset - scanned).count_set_bits();
                    scanned = offset;
                    if mask.value(offset) {
                        kept.push(entry as u32);
                        offsets.push(rank as u32);
                    }
                }
            }
            RowSelection::Sparse(selection) => {
                let selected = selection.rows();
                let mut cursor = 0;
                for (entry, &offset) in self.offsets().iter().enumerate() {
                    while cursor < selected.len() && selected[cursor] < offset {
                        cursor += 1;
                    }
                    if cursor < selected.len() && selected[cursor] == offset {
                        kept.push(entry as u32);
                        offsets.push(cursor as u32);
                    }
                }
            }
        }
        Ok(Self {
            len: rows.count(),
            offsets: UInt32Array::from(offsets),
            values: take(self.values.as_ref(), &UInt32Array::from(kept), None)?,
            default: Arc::clone(&self.default),
        })
    }

    fn materialize(&self) -> Result<ArrayRef, FilterError> {
        let combined = concat(&[self.values.as_ref(), self.default.as_ref()])?;
        let default_index = self.values.len() as u32;
        let offsets = self.offsets();
        let mut next = 0;
        let indices: UInt32Array = (0..self.len)
            .map(|row| {
                if next < offsets.len() && offsets[next] as usize == row {
                    next += 1;
                    next as u32 - 1
                } else {
                    default_index
                }
            })
            .collect::<Vec<_>>()
            .into();
        Ok(take(combined.as_ref(), &indices, None)?)
    }
}

impl Column {
    /// Wrap an explicit array.
    pub fn dense(array: ArrayRef) -> Self {
        Column::Dense(array)
    }

    /// A single value repeated `len` times. Only the first element of `value` is used.
    pub fn constant(value: ArrayRef, len: usize) -> Result<Self, FilterError> {
        if value.is_empty() {
            return Err(FilterError::InvalidColumn("constant column needs one value"));
        }
        Ok(Column::Constant {
            value: value.slice(0, 1),
            len,
        })
    }

    /// A sparse column over `len` rows.
    ///
    /// `offsets` must be strictly ascending and below `len`, and aligned with `values`.
    pub fn sparse(
        len: usize,
        offsets: Vec<u32>,
        values: ArrayRef,
        default: ArrayRef,
    ) -> Result<Self, FilterError> {
        if offsets.len() != values.len() {
            return Err(FilterError::InvalidColumn(
                "sparse offsets and values differ in length",
            ));
        }
        if offsets.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(FilterError::InvalidColumn("sparse offsets must ascend"));
        }
        if offsets.last().is_some_and(|&last| last as usize >= len) {
            return Err(FilterError::InvalidColumn("sparse offset out of range"));
        }
        if default.len() != 1 || default.data_type() != values.data_type() {
            return Err(FilterError::InvalidColumn(
                "sparse default must be one value of the column type",
            ));
        }
        Ok(Column::Sparse(SparseColumn {
            len,
            offsets: UInt32Array::from(offsets),
            values,
            default,
        }))
    }

    /// Attach a validity bitmap to another representation.
    pub fn nullable(inner: Column, nulls: NullBuffer) -> Result<Self, FilterError> {
        if inner.len() != nulls.len() {
            return Err(FilterError::InvalidColumn(
                "null bitmap does not match inner column",
            ));
        }
        Ok(Column::Nullable {
            inner: Box::new(inner),
            nulls,
        })
    }

    /// A dictionary-encoded column. Null keys are lifted into a [`Column::Nullable`] wrapper.
    pub fn dictionary(keys: UInt32Array, values: ArrayRef) -> Self {
        match keys.nulls().cloned() {
            Some(nulls) => {
                let keys = UInt32Array::new(keys.values().clone(), None);
                Column::Nullable {
                    inner: Box::new(Column::Dictionary { keys, values }),
                    nulls,
                }
            }
            None => Column::Dictionary { keys, values },
        }
    }

    /// Convert an Arrow array, keeping dictionary arrays encoded.
    pub fn from_array(array: ArrayRef) -> Result<Self, FilterError> {
        let Some(dictionary) = array.as_any_dictionary_opt() else {
            return Ok(Column::Dense(array));
        };
        let keys = cast(dictionary.keys(), &DataType::UInt32)?;
        let keys = keys
            .as_primitive_opt::<UInt32Type>()
            .ok_or(FilterError::InvalidColumn("dictionary keys"))?
            .clone();
        Ok(Column::dictionary(keys, Arc::clone(dictionary.values())))
    }

    /// A constant column reading as true in the given declared type.
    ///
    /// Dictionary types produce a one-entry dictionary, `Null` produces a null constant.
    pub fn constant_true(data_type: &DataType, len: usize) -> Result<Self, FilterError> {
        Ok(Column::Constant {
            value: true_value(data_type)?,
            len,
        })
    }

    /// Logical row count.
    pub fn len(&self) -> usize {
        match self {
            Column::Dense(array) => array.len(),
            Column::Constant { len, .. } => *len,
            Column::Sparse(sparse) => sparse.len(),
            Column::Nullable { nulls, .. } => nulls.len(),
            Column::Dictionary { keys, .. } => keys.len(),
        }
    }

    /// Whether the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the column is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self, Column::Constant { .. })
    }

    /// Whether the column is sparse.
    pub fn is_sparse(&self) -> bool {
        matches!(self, Column::Sparse(_))
    }

    /// Whether the column carries a validity wrapper.
    pub fn is_nullable(&self) -> bool {
        matches!(self, Column::Nullable { .. })
    }

    /// Whether the column is dictionary-encoded, looking through a validity wrapper.
    pub fn is_dictionary(&self) -> bool {
        match self {
            Column::Dictionary { .. } => true,
            Column::Nullable { inner, .. } => inner.is_dictionary(),
            _ => false,
        }
    }

    /// Logical value type, independent of the representation.
    pub fn data_type(&self) -> DataType {
        match self {
            Column::Dense(array) => array.data_type().clone(),
            Column::Constant { value, .. } => match value.data_type() {
                DataType::Dictionary(_, value_type) => value_type.as_ref().clone(),
                other => other.clone(),
            },
            Column::Sparse(sparse) => sparse.values().data_type().clone(),
            Column::Nullable { inner, .. } => inner.data_type(),
            Column::Dictionary { values, .. } => values.data_type().clone(),
        }
    }

    /// Keep the first `len` rows.
    pub fn cut(&self, len: usize) -> Self {
        let len = len.min(self.len());
        match self {
            Column::Dense(array) => Column::Dense(array.slice(0, len)),
            Column::Constant { value, .. } => Column::Constant {
                value: Arc::clone(value),
                len,
            },
            Column::Sparse(sparse) => Column::Sparse(sparse.cut(len)),
            Column::Nullable { inner, nulls } => Column::Nullable {
                inner: Box::new(inner.cut(len)),
                nulls: nulls.slice(0, len),
            },
            Column::Dictionary { keys, values } => Column::Dictionary {
                keys: keys.slice(0, len),
                values: Arc::clone(values),
            },
        }
    }

    /// Keep the selected rows, preserving order and representation.
    pub fn filter(&self, rows: &RowSelection) -> Result<Self, FilterError> {
        Ok(match self {
            Column::Dense(array) => Column::Dense(rows.filter_array(array.as_ref())?),
            Column::Constant { value, .. } => Column::Constant {
                value: Arc::clone(value),
                len: rows.count(),
            },
            Column::Sparse(sparse) => Column::Sparse(sparse.filter(rows)?),
            Column::Nullable { inner, nulls } => {
                let validity = BooleanArray::new(nulls.inner().clone(), None);
                let validity = rows.filter_array(&validity)?;
                let validity = validity
                    .as_boolean_opt()
                    .ok_or(FilterError::InvalidColumn("validity bitmap"))?;
                Column::Nullable {
                    inner: Box::new(inner.filter(rows)?),
                    nulls: NullBuffer::new(validity.values().clone()),
                }
            }
            Column::Dictionary { keys, values } => {
                let keys = rows.filter_array(keys)?;
                let keys = keys
                    .as_primitive_opt::<UInt32Type>()
                    .ok_or(FilterError::InvalidColumn("dictionary keys"))?
                    .clone();
                Column::Dictionary {
                    keys,
                    values: Arc::clone(values),
                }
            }
        })
    }

    /// Expand into a plain Arrow array of the logical type.
    pub fn materialize(&self) -> Result<ArrayRef, FilterError> {
        match self {
            Column::Dense(array) => Ok(Arc::clone(array)),
            Column::Constant { value, len } => {
                let indices = UInt32Array::from(vec![0u32; *len]);
                Ok(take(value.as_ref(), &indices, None)?)
            }
            Column::Sparse(sparse) => sparse.materialize(),
            Column::Nullable { inner, nulls } => {
                let array = inner.materialize()?;
                let invalid = BooleanArray::new(!nulls.inner(), None);
                Ok(nullif(array.as_ref(), &invalid)?)
            }
            Column::Dictionary { keys, values } => Ok(take(values.as_ref(), keys, None)?),
        }
    }
}

pub(crate) fn true_value(data_type: &DataType) -> Result<ArrayRef, FilterError> {
    Ok(match data_type {
        DataType::Boolean => Arc::new(BooleanArray::from(vec![true])),
        DataType::Null => new_null_array(&DataType::Null, 1),
        DataType::Dictionary(_, value_type) => {
            let dictionary = DictionaryArray::<UInt32Type>::try_new(
                UInt32Array::from(vec![0u32]),
                true_value(value_type)?,
            )?;
            cast(&dictionary, data_type)?
        }
        other => {
            let one: ArrayRef = Arc::new(UInt8Array::from(vec![1u8]));
            cast(one.as_ref(), other)?
        }
    })
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{Int32Array, Int64Array, StringArray},
        buffer::BooleanBuffer,
    };

    use super::*;
    use crate::selection::{DenseSelection, SparseSelection};

    fn ints(array: &ArrayRef) -> Vec<Option<i64>> {
        let array = cast(array.as_ref(), &DataType::Int64).expect("cast");
        array
            .as_any()
            .downcast_ref::<Int64Array>()
            .expect("int64")
            .iter()
            .collect()
    }

    fn dense_rows(bits: &[bool]) -> RowSelection {
        RowSelection::Dense(DenseSelection::new(BooleanBuffer::from(bits.to_vec())))
    }

    #[test]
    fn constant_cut_keeps_value() {
        let column = Column::constant(Arc::new(Int32Array::from(vec![7])), 10).expect("constant");
        let cut = column.cut(4);
        assert!(cut.is_constant());
        assert_eq!(cut.len(), 4);
        assert_eq!(ints(&cut.materialize().expect("materialize")), vec![Some(7); 4]);
    }

    #[test]
    fn sparse_filter_with_dense_mask_remaps_offsets() {
        let column = Column::sparse(
            6,
            vec![1, 3, 4],
            Arc::new(Int32Array::from(vec![10, 30, 40])),
            Arc::new(Int32Array::from(vec![0])),
        )
        .expect("sparse");
        let filtered = column
            .filter(&dense_rows(&[true, false, true, true, false, true]))
            .expect("filter");
        let Column::Sparse(sparse) = &filtered else {
            panic!("representation changed: {filtered:?}");
        };
        assert_eq!(sparse.len(), 4);
        assert_eq!(sparse.offsets(), &[2]);
        assert_eq!(
            ints(&filtered.materialize().expect("materialize")),
            vec![Some(0), Some(0), Some(30), Some(0)]
        );
    }

    #[test]
    fn sparse_filter_with_sparse_mask_drops_excluded_entries() {
        let column = Column::sparse(
            8,
            vec![0, 2, 5, 7],
            Arc::new(Int32Array::from(vec![1, 2, 5, 7])),
            Arc::new(Int32Array::from(vec![-1])),
        )
        .expect("sparse");
        let rows = RowSelection::Sparse(SparseSelection::new(vec![2, 3, 7], 8));
        let filtered = column.filter(&rows).expect("filter");
        let Column::Sparse(sparse) = &filtered else {
            panic!("representation changed: {filtered:?}");
        };
        assert_eq!(sparse.offsets(), &[0, 2]);
        assert_eq!(
            ints(&filtered.materialize().expect("materialize")),
            vec![Some(2), Some(-1), Some(7)]
        );
    }

    #[test]
    fn nullable_dictionary_filters_keys_and_validity() {
        let keys = UInt32Array::from(vec![Some(0), None, Some(1), Some(0)]);
        let values: ArrayRef = Arc::new(StringArray::from(vec!["a", "b"]));
        let column = Column::dictionary(keys, values);
        assert!(column.is_nullable());
        assert!(column.is_dictionary());
        assert_eq!(column.data_type(), DataType::Utf8);

        let filtered = column
            .filter(&dense_rows(&[false, true, true, true]))
            .expect("filter");
        assert!(filtered.is_dictionary());
        let array = filtered.materialize().expect("materialize");
        let strings = array.as_string::<i32>();
        assert_eq!(
            strings.iter().collect::<Vec<_>>(),
            vec![None, Some("b"), Some("a")]
        );
    }

    #[test]
    fn constant_true_matches_declared_type() {
        let dictionary_type =
            DataType::Dictionary(Box::new(DataType::UInt16), Box::new(DataType::UInt8));
        let column = Column::constant_true(&dictionary_type, 3).expect("constant");
        let Column::Constant { value, len } = &column else {
            panic!("expected constant");
        };
        assert_eq!(*len, 3);
        assert_eq!(value.data_type(), &dictionary_type);

        let column = Column::constant_true(&DataType::UInt8, 2).expect("constant");
        assert_eq!(ints(&column.materialize().expect("materialize")), vec![Some(1); 2]);
    }

    #[test]
    fn sparse_rejects_unsorted_offsets() {
        let err = Column::sparse(
            4,
            vec![2, 1],
            Arc::new(Int32Array::from(vec![1, 2])),
            Arc::new(Int32Array::from(vec![0])),
        )
        .expect_err("unsorted");
        assert!(matches!(err, FilterError::InvalidColumn(_)));
    }
}
