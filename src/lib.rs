#![deny(missing_docs)]
//! Columnar filter transform for push/pull query pipelines.
//!
//! A [`FilterTransform`] keeps the rows of each [`Chunk`] whose predicate
//! column reads as true. The predicate may be computed per chunk by an
//! [`Expression`]. Columns stay in their physical representation
//! (dense, constant, sparse, nullable, dictionary), and the cheapest
//! fixed-width column is compacted first so empty and full selections skip
//! the remaining work.
//!
//! The transform is exposed three ways: directly, as a [`FilterProcessor`]
//! for schedulers speaking the prepare/work protocol, and as a
//! [`FilterStream`] over async chunk streams.

/// Columns in their physical representations.
pub mod column;

/// Batches of equally long columns.
pub mod chunk;

/// Ordered, named column declarations with optional known constants.
pub mod header;

/// Reading a predicate column as a row selection.
pub mod selection;

/// Cost-based compaction of a chunk under a selection.
pub mod planner;

/// Header negotiation and the per-chunk filter step.
pub mod transform;

/// Ports, processor status and the filter processor.
pub mod processor;

/// Minimal single-threaded driver for linear processor chains.
pub mod pipeline;

/// Async stream adapter.
pub mod stream;

/// External evaluator contract.
pub mod expression;

/// Filtered-row accounting.
pub mod metrics;

/// Transform configuration.
pub mod option;

/// Error types.
pub mod error;

mod observability;

pub use crate::{
    chunk::Chunk,
    column::Column,
    error::{FilterError, PortError},
    expression::{ComputeColumn, Expression, ExpressionRef},
    header::{Header, HeaderColumn},
    metrics::RowsFilteredCounter,
    option::FilterOptions,
    processor::FilterProcessor,
    selection::Verdict,
    stream::FilterStream,
    transform::{transform_header, FilterTransform},
};
