//! Contract with the expression evaluator that produces the predicate column.

use std::{fmt, sync::Arc};

use arrow::{array::ArrayRef, datatypes::Field};

use crate::{
    chunk::Chunk,
    column::Column,
    error::{BoxedError, FilterError},
    header::{Header, HeaderColumn},
};

/// Shared handle to an expression.
pub type ExpressionRef = Arc<dyn Expression>;

/// Computation run on each chunk before filtering.
///
/// Implementations may add or replace columns but must not change the row
/// count of the chunk.
pub trait Expression: Send + Sync + fmt::Debug {
    /// Header produced by [`Expression::execute`] for chunks shaped like `header`.
    fn update_header(&self, header: &Header) -> Result<Header, FilterError>;

    /// Materialize computed columns in place.
    fn execute(&self, chunk: &mut Chunk) -> Result<(), BoxedError>;

    /// Whether `name` is proven to be false for every row, e.g. membership in
    /// an empty prepared set. Must be cheap; it is polled by the scheduler.
    fn is_column_always_false(&self, _name: &str) -> bool {
        false
    }
}

type ComputeFn = dyn Fn(&Chunk) -> Result<Column, BoxedError> + Send + Sync;

/// Expression appending one column computed by a closure.
pub struct ComputeColumn {
    output: HeaderColumn,
    compute: Box<ComputeFn>,
    always_false: bool,
}

impl ComputeColumn {
    /// Append `field`, computed by `compute` from the incoming chunk.
    pub fn new<F>(field: Field, compute: F) -> Self
    where
        F: Fn(&Chunk) -> Result<Column, BoxedError> + Send + Sync + 'static,
    {
        Self {
            output: HeaderColumn::new(field),
            compute: Box::new(compute),
            always_false: false,
        }
    }

    /// Declare the computed column constant in the header, e.g. after constant folding.
    pub fn with_constant(self, value: ArrayRef) -> Self {
        Self {
            output: self.output.with_constant(value),
            ..self
        }
    }

    /// Report the computed column as always false to the scheduler-facing check.
    pub fn with_always_false(self, always_false: bool) -> Self {
        Self {
            always_false,
            ..self
        }
    }
}

impl Expression for ComputeColumn {
    fn update_header(&self, header: &Header) -> Result<Header, FilterError> {
        let mut header = header.clone();
        header.push(self.output.clone())?;
        Ok(header)
    }

    fn execute(&self, chunk: &mut Chunk) -> Result<(), BoxedError> {
        let column = (self.compute)(chunk)?;
        chunk.push_column(column)?;
        Ok(())
    }

    fn is_column_always_false(&self, name: &str) -> bool {
        self.always_false && self.output.name() == name
    }
}

impl fmt::Debug for ComputeColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeColumn")
            .field("output", &self.output.name())
            .field("always_false", &self.always_false)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use arrow::{
        array::{AsArray, Int32Array, UInt8Array},
        datatypes::{DataType, Int32Type},
    };

    use super::*;

    fn positive(field_name: &str) -> ComputeColumn {
        ComputeColumn::new(Field::new(field_name, DataType::UInt8, false), |chunk| {
            let Some(Column::Dense(values)) = chunk.column(0) else {
                return Err("first column must be dense".into());
            };
            let values = values.as_primitive::<Int32Type>();
            let flags: UInt8Array = values.iter().map(|v| v.map(|v| u8::from(v > 0))).collect();
            Ok(Column::dense(Arc::new(flags)))
        })
    }

    #[test]
    fn appends_computed_column() {
        let header = Header::from(vec![Field::new("v", DataType::Int32, false)]);
        let expression = positive("keep");
        let rewritten = expression.update_header(&header).expect("header");
        assert_eq!(rewritten.position("keep"), Some(1));

        let mut chunk = Chunk::try_new(
            vec![Column::dense(Arc::new(Int32Array::from(vec![-1, 2])))],
            2,
        )
        .expect("chunk");
        expression.execute(&mut chunk).expect("execute");
        assert_eq!(chunk.num_columns(), 2);
    }

    #[test]
    fn rejects_name_clash() {
        let header = Header::from(vec![Field::new("keep", DataType::Int32, false)]);
        let err = positive("keep")
            .update_header(&header)
            .expect_err("clash");
        assert!(matches!(err, FilterError::DuplicateColumn(_)));
    }

    #[test]
    fn evaluation_errors_surface() {
        let mut chunk = Chunk::try_new(vec![], 0).expect("chunk");
        let err = positive("keep").execute(&mut chunk).expect_err("no input");
        assert_eq!(err.to_string(), "first column must be dense");
    }
}
