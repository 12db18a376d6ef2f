//! # Insights Pipeline
//!
//! load → clean → filter → describe → chart. Everything here is pure and
//! synchronous; handlers run it on the blocking pool.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

pub mod charts;
pub mod clean;
pub mod filters;
pub mod json;
pub mod kpis;
pub mod loader;
pub mod stats;
pub mod table;

pub use charts::Chart;
pub use json::sanitize_json;
pub use loader::LoadError;
pub use stats::ColumnSummary;
pub use table::{ColumnData, RawTable, Table};

/// Analytics for one (optionally filtered) table.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InsightsReport {
    #[schema(value_type = Object)]
    pub kpis: Map<String, Value>,
    pub statistics: Vec<ColumnSummary>,
    pub charts: BTreeMap<String, Chart>,
    /// Filter dropdown options, computed after filtering
    #[schema(value_type = Object)]
    pub filters: Map<String, Value>,
}

/// Decode, clean and type a stored file.
pub fn load_clean_table(blob_path: &str, data: &[u8]) -> Result<Table, LoadError> {
    let raw = loader::load_table(blob_path, data)?;
    Ok(Table::from_raw(clean::clean_table(raw)))
}

/// Apply `filters` and compute the full report.
pub fn generate_insights(table: &Table, filters: &Map<String, Value>) -> InsightsReport {
    let filtered = filters::apply_filters(table, filters);

    InsightsReport {
        kpis: kpis::compute_kpis(&filtered),
        statistics: stats::describe(&filtered),
        charts: charts::build_charts(&filtered),
        filters: filters::filter_options(&filtered),
    }
}
