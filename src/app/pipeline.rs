//! Shared dashboard pipeline used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! filter state -> cascade -> filtered subset -> daily series -> ranking
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).
//! Everything here is a pure function of the dataset and the filter state.

use serde::Serialize;

use crate::domain::{
    AggregateMode, Capabilities, DateRange, FilterState, Measure, QuickRange, Record,
};
use crate::error::AppError;
use crate::filter::{Cascade, date_bounds, filter_with};
use crate::io::export::export_rows;
use crate::io::ingest::Dataset;
use crate::report::{DailyPoint, Ranking, daily_aggregate, rank_funds};

/// Knobs that shape the view but are not filters.
#[derive(Debug, Clone, Copy)]
pub struct ViewConfig {
    pub rank_measure: Measure,
    pub top_n: usize,
}

/// All computed outputs for one filter state.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub source: String,
    pub total_rows: usize,
    pub capabilities: Capabilities,
    pub cascade: Cascade,
    /// Dates available under the categorical selections.
    pub date_bounds: Option<DateRange>,
    /// Date range applied to the subset (`None` = every date).
    pub date_range: Option<DateRange>,
    pub subset_rows: usize,
    /// Daily sum of net asset value.
    pub net_assets: Vec<DailyPoint>,
    /// Running total of daily net sales.
    pub net_sales_cumulative: Vec<DailyPoint>,
    pub ranking: Ranking,
}

impl DashboardView {
    pub fn is_empty(&self) -> bool {
        self.subset_rows == 0
    }
}

/// Compute the full dashboard for `state`.
pub fn build_view(dataset: &Dataset, state: &FilterState, config: ViewConfig) -> DashboardView {
    let cascade = Cascade::resolve(&dataset.records, dataset.capabilities, state);
    let bounds = date_bounds(&dataset.records, &cascade);
    let subset = filter_with(&dataset.records, &cascade, state.date_range());

    tracing::debug!(
        rows = subset.len(),
        active = cascade.active().count(),
        "filters applied"
    );

    DashboardView {
        source: dataset.info.path.display().to_string(),
        total_rows: dataset.records.len(),
        capabilities: dataset.capabilities,
        date_bounds: bounds,
        date_range: state.date_range(),
        subset_rows: subset.len(),
        net_assets: daily_aggregate(&subset, Measure::NetAssets, AggregateMode::Plain),
        net_sales_cumulative: daily_aggregate(&subset, Measure::NetSales, AggregateMode::Cumulative),
        ranking: rank_funds(&subset, config.rank_measure, config.top_n),
        cascade,
    }
}

/// Rows of the dataset passing `state`.
pub fn filtered_rows<'a>(dataset: &'a Dataset, state: &FilterState) -> Vec<&'a Record> {
    let cascade = Cascade::resolve(&dataset.records, dataset.capabilities, state);
    filter_with(&dataset.records, &cascade, state.date_range())
}

/// CSV bytes for the rows passing `state`, or `ExportTooLarge`.
pub fn export_filtered(dataset: &Dataset, state: &FilterState, row_cap: usize) -> Result<Vec<u8>, AppError> {
    let rows = filtered_rows(dataset, state);
    export_rows(&rows, dataset.capabilities, row_cap)
}

/// Replace the state's date range with `quick`, resolved against the dates
/// available under the current categorical selections.
///
/// With no dated rows the state is returned unchanged.
pub fn with_quick_range(dataset: &Dataset, state: &FilterState, quick: QuickRange) -> FilterState {
    let cascade = Cascade::resolve(&dataset.records, dataset.capabilities, state);
    match date_bounds(&dataset.records, &cascade) {
        Some(bounds) => state.with_date_range(Some(quick.resolve(bounds))),
        None => state.clone(),
    }
}
