//! Cost-based compaction of a chunk under a row selection.
//!
//! The surviving row count is learned by compacting the cheapest fixed-width
//! column first (the probe). Empty and full selections then short-circuit
//! before the remaining columns are touched.

use arrow::datatypes::{DataType, Field};

use crate::{
    column::Column,
    error::FilterError,
    header::Header,
    selection::{count_selected, RowSelection},
};

/// Result of compacting a chunk's columns.
#[derive(Debug)]
pub enum CompactionOutcome {
    /// No row survived.
    Empty,
    /// Every row survived; columns keep their content.
    Unchanged(Vec<Column>),
    /// Some rows survived. The predicate column is already a constant true.
    Compacted {
        /// Compacted columns, all of length `num_rows`.
        columns: Vec<Column>,
        /// Surviving row count.
        num_rows: usize,
    },
}

/// Bytes one value of `field` occupies in memory, counting a null-indicator
/// byte for nullable fields. `None` for types not stored as fixed-width numbers.
pub fn value_size_in_memory(field: &Field) -> Option<usize> {
    let data_type = match field.data_type() {
        DataType::Dictionary(_, value_type) => value_type.as_ref(),
        other => other,
    };
    let width = data_type.primitive_width()?;
    Some(width + usize::from(field.is_nullable()))
}

/// Position of the column to compact first, if any qualifies.
///
/// Candidates are non-constant, fixed-width columns other than the predicate.
/// The smallest value size wins, ties go to the leftmost column.
pub fn choose_probe(header: &Header, columns: &[Column], filter_position: usize) -> Option<usize> {
    let mut probe: Option<(usize, usize)> = None;
    for (position, column) in columns.iter().enumerate() {
        if position == filter_position || column.is_constant() {
            continue;
        }
        let Some(size) = header
            .column(position)
            .and_then(|declared| value_size_in_memory(declared.field()))
        else {
            continue;
        };
        if probe.map_or(true, |(_, best)| size < best) {
            probe = Some((position, size));
        }
    }
    probe.map(|(position, _)| position)
}

/// Compact `columns` to the rows kept by `rows`.
///
/// `header` supplies declared types for the probe choice and for the constant
/// that replaces the predicate column at `filter_position`.
pub fn compact(
    mut columns: Vec<Column>,
    header: &Header,
    filter_position: usize,
    rows: &RowSelection,
) -> Result<CompactionOutcome, FilterError> {
    let num_rows = rows.input_len();
    let probe = choose_probe(header, &columns, filter_position);
    let kept = match probe {
        Some(position) => {
            columns[position] = columns[position].filter(rows)?;
            columns[position].len()
        }
        None => count_selected(rows),
    };

    if kept == 0 {
        return Ok(CompactionOutcome::Empty);
    }
    if kept == num_rows {
        return Ok(CompactionOutcome::Unchanged(columns));
    }

    let filter_type = header
        .column(filter_position)
        .map(|declared| declared.data_type().clone())
        .unwrap_or(DataType::UInt8);
    let mut compacted = Vec::with_capacity(columns.len());
    for (position, column) in columns.into_iter().enumerate() {
        let column = if position == filter_position {
            Column::constant_true(&filter_type, kept)?
        } else if Some(position) == probe {
            column
        } else if column.is_constant() {
            column.cut(kept)
        } else {
            column.filter(rows)?
        };
        compacted.push(column);
    }
    Ok(CompactionOutcome::Compacted {
        columns: compacted,
        num_rows: kept,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::{
        array::{AsArray, Int16Array, Int64Array, Int8Array, StringArray, UInt8Array},
        buffer::BooleanBuffer,
        datatypes::Int64Type,
    };

    use super::*;
    use crate::selection::DenseSelection;

    fn header() -> Header {
        Header::from(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("big", DataType::Int64, false),
            Field::new("small", DataType::Int8, true),
            Field::new("short", DataType::Int16, false),
            Field::new("f", DataType::UInt8, false),
        ])
    }

    fn columns() -> Vec<Column> {
        vec![
            Column::dense(Arc::new(StringArray::from(vec!["a", "b", "c", "d"]))),
            Column::dense(Arc::new(Int64Array::from(vec![10, 20, 30, 40]))),
            Column::dense(Arc::new(Int8Array::from(vec![1, 2, 3, 4]))),
            Column::dense(Arc::new(Int16Array::from(vec![5, 6, 7, 8]))),
            Column::dense(Arc::new(UInt8Array::from(vec![1, 0, 1, 0]))),
        ]
    }

    fn rows(bits: &[bool]) -> RowSelection {
        RowSelection::Dense(DenseSelection::new(BooleanBuffer::from(bits.to_vec())))
    }

    #[test]
    fn sizes_strip_dictionary_and_count_null_byte() {
        let field = Field::new(
            "d",
            DataType::Dictionary(Box::new(DataType::UInt16), Box::new(DataType::Int32)),
            true,
        );
        assert_eq!(value_size_in_memory(&field), Some(5));
        assert_eq!(
            value_size_in_memory(&Field::new("s", DataType::Utf8, false)),
            None
        );
    }

    #[test]
    fn probe_prefers_smallest_then_leftmost() {
        // "small" is Int8 + null byte = 2, "short" is Int16 = 2; the leftmost wins.
        assert_eq!(choose_probe(&header(), &columns(), 4), Some(2));

        let mut columns = columns();
        columns[2] = Column::constant(Arc::new(Int8Array::from(vec![1])), 4).expect("const");
        assert_eq!(choose_probe(&header(), &columns, 4), Some(3));
    }

    #[test]
    fn no_probe_without_fixed_width_columns() {
        let header = Header::from(vec![
            Field::new("name", DataType::Utf8, false),
            Field::new("f", DataType::UInt8, false),
        ]);
        let columns = vec![
            Column::dense(Arc::new(StringArray::from(vec!["a", "b"]))),
            Column::dense(Arc::new(UInt8Array::from(vec![1, 0]))),
        ];
        assert_eq!(choose_probe(&header, &columns, 1), None);

        match compact(columns, &header, 1, &rows(&[true, false])).expect("compact") {
            CompactionOutcome::Compacted { columns, num_rows } => {
                assert_eq!(num_rows, 1);
                assert!(columns[1].is_constant());
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn compacts_every_column() {
        let mut input = columns();
        input[3] = Column::constant(Arc::new(Int16Array::from(vec![9])), 4).expect("const");
        let outcome =
            compact(input, &header(), 4, &rows(&[true, false, true, false])).expect("compact");
        let CompactionOutcome::Compacted { columns, num_rows } = outcome else {
            panic!("expected compaction");
        };
        assert_eq!(num_rows, 2);
        assert!(columns.iter().all(|column| column.len() == 2));
        assert!(columns[3].is_constant());
        assert!(columns[4].is_constant());
        let big = columns[1].materialize().expect("materialize");
        assert_eq!(big.as_primitive::<Int64Type>().values().to_vec(), vec![10, 30]);
    }

    #[test]
    fn empty_and_full_selections_short_circuit() {
        assert!(matches!(
            compact(columns(), &header(), 4, &rows(&[false; 4])).expect("compact"),
            CompactionOutcome::Empty
        ));
        assert!(matches!(
            compact(columns(), &header(), 4, &rows(&[true; 4])).expect("compact"),
            CompactionOutcome::Unchanged(columns) if columns.len() == 5
        ));
    }
}
