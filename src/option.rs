use crate::metrics::RowsFilteredCounter;

/// Configuration of a filter transform.
#[derive(Debug, Clone, Default)]
pub struct FilterOptions {
    pub(crate) remove_filter_column: bool,
    pub(crate) on_totals: bool,
    pub(crate) rows_filtered: Option<RowsFilteredCounter>,
}

impl FilterOptions {
    /// Drop the predicate column from the output instead of rewriting it to a constant true.
    pub fn remove_filter_column(self, remove_filter_column: bool) -> Self {
        FilterOptions {
            remove_filter_column,
            ..self
        }
    }

    /// Pass chunks through without filtering, as for a totals row.
    pub fn on_totals(self, on_totals: bool) -> Self {
        FilterOptions { on_totals, ..self }
    }

    /// Add the number of removed rows of every chunk to `counter`.
    pub fn rows_filtered(self, counter: RowsFilteredCounter) -> Self {
        FilterOptions {
            rows_filtered: Some(counter),
            ..self
        }
    }
}
