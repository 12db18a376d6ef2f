use serde_json::{Map, Value};

use super::json::round_to;
use super::stats::mean;
use super::table::Table;

pub const TOTAL_ROWS: &str = "Total Rows";

/// Headline numbers: the row count, then the rounded mean of each numeric column.
pub fn compute_kpis(table: &Table) -> Map<String, Value> {
    let mut kpis = Map::new();
    kpis.insert(TOTAL_ROWS.to_string(), Value::from(table.row_count()));

    for (name, values) in table.numeric_columns() {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let average = mean(&present).and_then(|m| round_to(m, 2));
        kpis.insert(format!("Average {name}"), Value::from(average));
    }

    kpis
}
