//! Chunks: the unit of data flowing between processors.

use arrow::{
    array::{Array, ArrayRef},
    compute::cast,
    datatypes::SchemaRef,
    record_batch::{RecordBatch, RecordBatchOptions},
};

use crate::{column::Column, error::FilterError};

/// A batch of rows stored column-wise.
///
/// Every column has exactly `num_rows` logical rows; constant columns carry
/// their own repeat count.
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Chunk {
    /// Build a chunk, checking every column against `num_rows`.
    pub fn try_new(columns: Vec<Column>, num_rows: usize) -> Result<Self, FilterError> {
        for (position, column) in columns.iter().enumerate() {
            check_len(position, column, num_rows)?;
        }
        Ok(Self { columns, num_rows })
    }

    /// Dense chunk over the columns of a record batch. Dictionary arrays stay encoded.
    pub fn from_record_batch(batch: &RecordBatch) -> Result<Self, FilterError> {
        let columns = batch
            .columns()
            .iter()
            .map(|array| Column::from_array(ArrayRef::clone(array)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            columns,
            num_rows: batch.num_rows(),
        })
    }

    /// Materialize every column into a record batch with the given schema.
    ///
    /// Columns are cast to the declared field types, so dictionary fields come
    /// back dictionary-encoded.
    pub fn to_record_batch(&self, schema: SchemaRef) -> Result<RecordBatch, FilterError> {
        let arrays = self
            .columns
            .iter()
            .zip(schema.fields().iter())
            .map(|(column, field)| {
                let array = column.materialize()?;
                if array.data_type() == field.data_type() {
                    Ok(array)
                } else {
                    Ok(cast(array.as_ref(), field.data_type())?)
                }
            })
            .collect::<Result<Vec<_>, FilterError>>()?;
        let options = RecordBatchOptions::new().with_row_count(Some(self.num_rows));
        Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    /// Number of columns.
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Whether the chunk holds at least one row.
    pub fn has_rows(&self) -> bool {
        self.num_rows > 0
    }

    /// All columns in header order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at `position`.
    pub fn column(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }

    /// Take the columns out, leaving an empty chunk.
    pub fn detach_columns(&mut self) -> Vec<Column> {
        self.num_rows = 0;
        std::mem::take(&mut self.columns)
    }

    /// Replace all columns and the row count.
    pub fn set_columns(&mut self, columns: Vec<Column>, num_rows: usize) -> Result<(), FilterError> {
        *self = Chunk::try_new(columns, num_rows)?;
        Ok(())
    }

    /// Append a column.
    pub fn push_column(&mut self, column: Column) -> Result<(), FilterError> {
        check_len(self.columns.len(), &column, self.num_rows)?;
        self.columns.push(column);
        Ok(())
    }

    /// Replace the column at `position`.
    pub fn set_column(&mut self, position: usize, column: Column) -> Result<(), FilterError> {
        check_len(position, &column, self.num_rows)?;
        self.columns[position] = column;
        Ok(())
    }

    /// Remove and return the column at `position`.
    pub fn erase(&mut self, position: usize) -> Column {
        self.columns.remove(position)
    }
}

fn check_len(position: usize, column: &Column, num_rows: usize) -> Result<(), FilterError> {
    if column.len() != num_rows {
        return Err(FilterError::LengthMismatch {
            column: position,
            expected: num_rows,
            actual: column.len(),
        });
    }
    Ok(())
}
