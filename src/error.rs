use arrow::{datatypes::DataType, error::ArrowError};
use thiserror::Error;

/// Boxed error produced by an external expression evaluator.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by header negotiation and chunk filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The predicate column does not exist in the (expression-rewritten) header.
    #[error("filter column {0} not found in header")]
    MissingColumn(String),
    /// The predicate column is declared with a type that cannot act as a filter.
    #[error("illegal type {data_type:?} of column {column} for filter, must be UInt8, Boolean or a nullable/dictionary wrapping of them")]
    IllegalFilterType {
        /// Name of the predicate column.
        column: String,
        /// Declared type found in the header.
        data_type: DataType,
    },
    /// Two header columns share a name.
    #[error("duplicate column {0} in header")]
    DuplicateColumn(String),
    /// A column does not match the chunk row count.
    #[error("column {column} has {actual} rows, chunk expects {expected}")]
    LengthMismatch {
        /// Position of the offending column.
        column: usize,
        /// Row count declared by the chunk.
        expected: usize,
        /// Row count of the column.
        actual: usize,
    },
    /// A column was constructed from inconsistent parts.
    #[error("invalid column: {0}")]
    InvalidColumn(&'static str),
    /// A column's physical data cannot be read as a filter.
    #[error("column of type {0:?} cannot be used as a filter")]
    NonBooleanData(DataType),
    /// The expression evaluator changed the number of rows of a chunk.
    #[error("expression changed the chunk row count from {before} to {after}")]
    RowCountChanged {
        /// Rows before evaluation.
        before: usize,
        /// Rows after evaluation.
        after: usize,
    },
    /// The external expression evaluator failed.
    #[error("expression evaluation failed: {0}")]
    Evaluation(#[source] BoxedError),
    /// An Arrow compute kernel failed.
    #[error("arrow kernel error: {0}")]
    Arrow(#[from] ArrowError),
    /// The scheduler protocol was violated.
    #[error(transparent)]
    Port(#[from] PortError),
    /// The pipeline driver could not make progress.
    #[error("pipeline stalled with {0} unfinished processors")]
    Stalled(usize),
}

/// Misuse of the port protocol between two processors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    /// A chunk was pushed while the previous one had not been pulled.
    #[error("cannot push into a port that already holds data")]
    Full,
    /// A chunk was pushed after the port was finished or closed.
    #[error("cannot push into a finished port")]
    Finished,
    /// A pull was attempted on a port without data.
    #[error("cannot pull from an empty port")]
    Empty,
}
