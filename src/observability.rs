//! Structured logging for the filter pipeline.
//!
//! All events go through `tracing` with target "columnsieve" and carry an
//! `event` field plus a `component` field naming the emitting subsystem
//! (`header`, `filter`, `processor`, `pipeline`, `stream`).
//!
//! The crate never installs a global subscriber; embedding applications own
//! that decision.

/// Target for all log events emitted by this crate.
pub(crate) const SIEVE_TARGET: &str = "columnsieve";

/// Macro for info-level log events.
///
/// # Example
/// ```ignore
/// log_info!(
///     component = "header",
///     event = "header_negotiated",
///     filter_column = %name,
///     remove_filter_column = remove,
/// );
/// ```
macro_rules! log_info {
    ($($field:tt)*) => {
        ::tracing::info!(target: $crate::observability::SIEVE_TARGET, $($field)*)
    };
}

/// Macro for debug-level log events.
macro_rules! log_debug {
    ($($field:tt)*) => {
        ::tracing::debug!(target: $crate::observability::SIEVE_TARGET, $($field)*)
    };
}

/// Macro for trace-level log events. Used on the per-chunk hot path.
macro_rules! log_trace {
    ($($field:tt)*) => {
        ::tracing::trace!(target: $crate::observability::SIEVE_TARGET, $($field)*)
    };
}

/// Macro for warn-level log events.
macro_rules! log_warn {
    ($($field:tt)*) => {
        ::tracing::warn!(target: $crate::observability::SIEVE_TARGET, $($field)*)
    };
}

pub(crate) use log_debug;
pub(crate) use log_info;
pub(crate) use log_trace;
pub(crate) use log_warn;
