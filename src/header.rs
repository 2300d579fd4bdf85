//! Chunk headers: the ordered, named and typed column layout of a stream.

use std::{collections::HashSet, sync::Arc};

use arrow::{
    array::{Array, ArrayRef},
    datatypes::{DataType, FieldRef, Schema, SchemaRef},
};

use crate::error::FilterError;

/// One column slot of a [`Header`].
///
/// Nullability is the field's `nullable` flag, dictionary encoding is a
/// `DataType::Dictionary` declared type. A slot may carry a value known for
/// every row of every chunk, such as a folded constant.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderColumn {
    field: FieldRef,
    constant: Option<ArrayRef>,
}

impl HeaderColumn {
    /// A column with no known value.
    pub fn new(field: impl Into<FieldRef>) -> Self {
        Self {
            field: field.into(),
            constant: None,
        }
    }

    /// Attach a value every row of this column is known to hold.
    pub fn with_constant(self, value: ArrayRef) -> Self {
        let value = if value.len() > 1 { value.slice(0, 1) } else { value };
        Self {
            constant: Some(value),
            ..self
        }
    }

    /// Column name.
    pub fn name(&self) -> &str {
        self.field.name()
    }

    /// Declared field.
    pub fn field(&self) -> &FieldRef {
        &self.field
    }

    /// Declared type.
    pub fn data_type(&self) -> &DataType {
        self.field.data_type()
    }

    /// Known constant value, if any.
    pub fn constant(&self) -> Option<&ArrayRef> {
        self.constant.as_ref()
    }
}

/// Ordered set of uniquely named columns. Positions are significant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Header {
    columns: Vec<HeaderColumn>,
}

impl Header {
    /// Build a header, rejecting duplicate names.
    pub fn try_new(columns: Vec<HeaderColumn>) -> Result<Self, FilterError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name()) {
                return Err(FilterError::DuplicateColumn(column.name().to_string()));
            }
        }
        Ok(Self { columns })
    }

    /// Header of an Arrow schema, with no known constants.
    pub fn from_schema(schema: &Schema) -> Result<Self, FilterError> {
        Self::try_new(
            schema
                .fields()
                .iter()
                .map(|field| HeaderColumn::new(Arc::clone(field)))
                .collect(),
        )
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the header has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// All columns in order.
    pub fn columns(&self) -> &[HeaderColumn] {
        &self.columns
    }

    /// Column at `position`.
    pub fn column(&self, position: usize) -> Option<&HeaderColumn> {
        self.columns.get(position)
    }

    /// Position of the column called `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    /// Column called `name`.
    pub fn by_name(&self, name: &str) -> Option<&HeaderColumn> {
        self.position(name).and_then(|position| self.column(position))
    }

    /// Append a column, rejecting a duplicate name.
    pub fn push(&mut self, column: HeaderColumn) -> Result<(), FilterError> {
        if self.position(column.name()).is_some() {
            return Err(FilterError::DuplicateColumn(column.name().to_string()));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the column at `position`, keeping the slot.
    pub fn replace(&mut self, position: usize, column: HeaderColumn) {
        self.columns[position] = column;
    }

    /// Remove and return the column at `position`.
    pub fn erase(&mut self, position: usize) -> HeaderColumn {
        self.columns.remove(position)
    }

    /// Arrow schema with the same fields.
    pub fn to_schema(&self) -> SchemaRef {
        Arc::new(Schema::new(
            self.columns
                .iter()
                .map(|column| Arc::clone(&column.field))
                .collect::<Vec<FieldRef>>(),
        ))
    }
}

#[cfg(test)]
impl From<Vec<arrow::datatypes::Field>> for Header {
    fn from(fields: Vec<arrow::datatypes::Field>) -> Self {
        Header::try_new(fields.into_iter().map(HeaderColumn::new).collect())
            .expect("unique field names")
    }
}

#[cfg(test)]
mod tests {
    use arrow::{array::UInt8Array, datatypes::Field};

    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let err = Header::try_new(vec![
            HeaderColumn::new(Field::new("a", DataType::Int32, false)),
            HeaderColumn::new(Field::new("a", DataType::Int64, false)),
        ])
        .expect_err("duplicate");
        assert!(matches!(err, FilterError::DuplicateColumn(name) if name == "a"));
    }

    #[test]
    fn erase_shifts_positions() {
        let mut header = Header::from(vec![
            Field::new("a", DataType::Int32, false),
            Field::new("f", DataType::UInt8, false),
            Field::new("b", DataType::Utf8, true),
        ]);
        let removed = header.erase(1);
        assert_eq!(removed.name(), "f");
        assert_eq!(header.position("b"), Some(1));
        assert_eq!(header.to_schema().fields().len(), 2);
    }

    #[test]
    fn constants_keep_a_single_value() {
        let column = HeaderColumn::new(Field::new("f", DataType::UInt8, false))
            .with_constant(Arc::new(UInt8Array::from(vec![1, 1, 1])));
        assert_eq!(column.constant().map(|value| value.len()), Some(1));
    }
}
