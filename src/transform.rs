//! Header negotiation and the per-chunk filter step.

use arrow::datatypes::DataType;

use crate::{
    chunk::Chunk,
    column::{true_value, Column},
    error::FilterError,
    expression::{Expression, ExpressionRef},
    header::{Header, HeaderColumn},
    observability::{log_debug, log_trace},
    option::FilterOptions,
    planner::{compact, CompactionOutcome},
    selection::{constant_verdict, SelectionMask, Verdict},
};

/// Output header of a filter over `header`.
///
/// The predicate column must be declared as `UInt8` or `Boolean` (possibly
/// nullable or dictionary-encoded) or as `Null`. It is removed when
/// `remove_filter_column` is set and otherwise declared as a constant true of
/// its own type, since every surviving row passed the filter.
pub fn transform_header(
    header: &Header,
    expression: Option<&dyn Expression>,
    filter_column: &str,
    remove_filter_column: bool,
) -> Result<Header, FilterError> {
    let transformed = apply_expression(header, expression)?;
    let (output, _) = finish_header(transformed, filter_column, remove_filter_column)?;
    Ok(output)
}

fn apply_expression(
    header: &Header,
    expression: Option<&dyn Expression>,
) -> Result<Header, FilterError> {
    match expression {
        Some(expression) => expression.update_header(header),
        None => Ok(header.clone()),
    }
}

/// Check and rewrite the predicate column of an expression-rewritten header.
/// Returns the output header and the predicate position.
fn finish_header(
    mut header: Header,
    filter_column: &str,
    remove_filter_column: bool,
) -> Result<(Header, usize), FilterError> {
    let position = header
        .position(filter_column)
        .ok_or_else(|| FilterError::MissingColumn(filter_column.to_string()))?;
    let declared = header.columns()[position].clone();
    if !is_filter_type(declared.data_type()) {
        return Err(FilterError::IllegalFilterType {
            column: filter_column.to_string(),
            data_type: declared.data_type().clone(),
        });
    }

    if remove_filter_column {
        header.erase(position);
    } else {
        let value = true_value(declared.data_type())?;
        header.replace(
            position,
            HeaderColumn::new(declared.field().clone()).with_constant(value),
        );
    }
    Ok((header, position))
}

/// A predicate that can only hold nulls never selects a row.
fn is_only_null(data_type: &DataType) -> bool {
    match data_type {
        DataType::Null => true,
        DataType::Dictionary(_, value_type) => is_only_null(value_type),
        _ => false,
    }
}

fn is_filter_type(data_type: &DataType) -> bool {
    match data_type {
        DataType::Null | DataType::UInt8 | DataType::Boolean => true,
        DataType::Dictionary(_, value_type) => is_filter_type(value_type),
        _ => false,
    }
}

/// What the transform assumes about the predicate before looking at a chunk.
///
/// Starts from the header's known constant and falls back to per-chunk
/// evaluation the first time a chunk contradicts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerdictState {
    AlwaysTrue,
    AlwaysFalse,
    PerChunk,
}

impl From<Option<Verdict>> for VerdictState {
    fn from(verdict: Option<Verdict>) -> Self {
        match verdict {
            Some(Verdict::AlwaysTrue) => VerdictState::AlwaysTrue,
            Some(Verdict::AlwaysFalse) => VerdictState::AlwaysFalse,
            None => VerdictState::PerChunk,
        }
    }
}

/// Removes rows whose predicate column does not read as true.
#[derive(Debug)]
pub struct FilterTransform {
    input_header: Header,
    transformed_header: Header,
    output_header: Header,
    expression: Option<ExpressionRef>,
    filter_column: String,
    filter_position: usize,
    options: FilterOptions,
    static_verdict: Option<Verdict>,
    verdict: VerdictState,
}

impl FilterTransform {
    /// Negotiate headers and prepare the transform.
    ///
    /// Fails when the predicate column is missing or not boolean-compatible.
    pub fn try_new(
        input_header: Header,
        expression: Option<ExpressionRef>,
        filter_column: impl Into<String>,
        options: FilterOptions,
    ) -> Result<Self, FilterError> {
        let filter_column = filter_column.into();
        let transformed_header = apply_expression(&input_header, expression.as_deref())?;
        let (output_header, filter_position) = finish_header(
            transformed_header.clone(),
            &filter_column,
            options.remove_filter_column,
        )?;
        let declared = &transformed_header.columns()[filter_position];
        let static_verdict = if is_only_null(declared.data_type()) {
            Some(Verdict::AlwaysFalse)
        } else {
            declared
                .constant()
                .map(|value| constant_verdict(value.as_ref()))
                .transpose()?
        };

        log_debug!(
            component = "header",
            event = "header_negotiated",
            filter_column = %filter_column,
            filter_position,
            remove_filter_column = options.remove_filter_column,
            on_totals = options.on_totals,
            static_verdict = ?static_verdict,
        );

        Ok(Self {
            input_header,
            transformed_header,
            output_header,
            expression,
            filter_column,
            filter_position,
            options,
            static_verdict,
            verdict: static_verdict.into(),
        })
    }

    /// Header of incoming chunks.
    pub fn input_header(&self) -> &Header {
        &self.input_header
    }

    /// Header of emitted chunks.
    pub fn output_header(&self) -> &Header {
        &self.output_header
    }

    /// Name of the predicate column.
    pub fn filter_column(&self) -> &str {
        &self.filter_column
    }

    /// Verdict known from the header at construction.
    pub fn static_verdict(&self) -> Option<Verdict> {
        self.static_verdict
    }

    /// Whether the transform can finish without reading any input.
    pub(crate) fn is_always_false(&self) -> bool {
        !self.options.on_totals && self.verdict == VerdictState::AlwaysFalse
    }

    /// Whether prepared-set precomputation already proves the predicate false.
    pub(crate) fn is_proven_false_by_expression(&self) -> bool {
        !self.options.on_totals
            && self
                .expression
                .as_ref()
                .is_some_and(|expression| expression.is_column_always_false(&self.filter_column))
    }

    /// Filter one chunk. `None` means no row survived.
    ///
    /// The rows-filtered counter grows by the number of removed rows.
    pub fn transform(&mut self, chunk: Chunk) -> Result<Option<Chunk>, FilterError> {
        let rows_before = chunk.num_rows();
        let filtered = self.filter_chunk(chunk)?;
        let rows_after = filtered.as_ref().map_or(0, Chunk::num_rows);
        if let Some(counter) = &self.options.rows_filtered {
            counter.add(rows_before - rows_after);
        }
        log_trace!(
            component = "filter",
            event = "chunk_filtered",
            rows_in = rows_before,
            rows_out = rows_after,
        );
        Ok(filtered)
    }

    fn filter_chunk(&mut self, mut chunk: Chunk) -> Result<Option<Chunk>, FilterError> {
        let rows_before = chunk.num_rows();
        if let Some(expression) = &self.expression {
            expression
                .execute(&mut chunk)
                .map_err(FilterError::Evaluation)?;
        }
        let num_rows = chunk.num_rows();
        if num_rows != rows_before {
            return Err(FilterError::RowCountChanged {
                before: rows_before,
                after: num_rows,
            });
        }
        let columns = chunk.detach_columns();
        let predicate = columns
            .get(self.filter_position)
            .ok_or_else(|| FilterError::MissingColumn(self.filter_column.clone()))?;

        if self.options.on_totals {
            return self.forward(columns, num_rows);
        }

        if self.verdict == VerdictState::AlwaysTrue {
            if let Column::Constant { value, .. } = predicate {
                if constant_verdict(value.as_ref())? == Verdict::AlwaysTrue {
                    return self.forward(columns, num_rows);
                }
            }
        }

        let mask = SelectionMask::build(predicate)?;
        self.observe(&mask);
        let rows = match mask {
            SelectionMask::Verdict(Verdict::AlwaysFalse) => return Ok(None),
            SelectionMask::Verdict(Verdict::AlwaysTrue) => {
                return self.forward(columns, num_rows)
            }
            SelectionMask::Rows(rows) => rows,
        };

        match compact(
            columns,
            &self.transformed_header,
            self.filter_position,
            &rows,
        )? {
            CompactionOutcome::Empty => Ok(None),
            CompactionOutcome::Unchanged(columns) => self.forward(columns, num_rows),
            CompactionOutcome::Compacted {
                mut columns,
                num_rows,
            } => {
                if self.options.remove_filter_column {
                    columns.remove(self.filter_position);
                }
                Ok(Some(Chunk::try_new(columns, num_rows)?))
            }
        }
    }

    /// Drop the cached verdict once a chunk contradicts it.
    fn observe(&mut self, mask: &SelectionMask) {
        let seen = match mask {
            SelectionMask::Verdict(Verdict::AlwaysTrue) => VerdictState::AlwaysTrue,
            SelectionMask::Verdict(Verdict::AlwaysFalse) => VerdictState::AlwaysFalse,
            SelectionMask::Rows(_) => VerdictState::PerChunk,
        };
        if self.verdict != VerdictState::PerChunk && self.verdict != seen {
            log_debug!(
                component = "filter",
                event = "verdict_invalidated",
                filter_column = %self.filter_column,
                cached = ?self.verdict,
                observed = ?seen,
            );
            self.verdict = VerdictState::PerChunk;
        }
    }

    /// Emit every row, rewriting or removing the predicate column.
    fn forward(
        &self,
        mut columns: Vec<Column>,
        num_rows: usize,
    ) -> Result<Option<Chunk>, FilterError> {
        if num_rows == 0 {
            return Ok(None);
        }
        if self.options.remove_filter_column {
            columns.remove(self.filter_position);
        } else {
            let declared = self.transformed_header.columns()[self.filter_position].data_type();
            columns[self.filter_position] = Column::constant_true(declared, num_rows)?;
        }
        Ok(Some(Chunk::try_new(columns, num_rows)?))
    }
}
