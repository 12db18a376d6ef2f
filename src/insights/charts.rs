//! Chart specifications derived from a table.
//!
//! Charts are plain data; rendering is left to the client.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use utoipa::ToSchema;

use super::json::finite;
use super::stats::pearson;
use super::table::Table;

const MAX_HISTOGRAM_BINS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BarEntry {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Chart {
    Histogram {
        title: String,
        column: String,
        bins: Vec<HistogramBin>,
    },
    BarChart {
        title: String,
        column: String,
        bars: Vec<BarEntry>,
    },
    CorrelationMatrix {
        title: String,
        columns: Vec<String>,
        /// Row-major; `null` where a column has zero variance
        matrix: Vec<Vec<Option<f64>>>,
    },
}

/// Build every applicable chart, keyed by chart kind.
pub fn build_charts(table: &Table) -> BTreeMap<String, Chart> {
    let mut charts = BTreeMap::new();

    if let Some(chart) = histogram(table) {
        charts.insert("histogram".to_string(), chart);
    }
    if let Some(chart) = bar_chart(table) {
        charts.insert("bar_chart".to_string(), chart);
    }
    if let Some(chart) = correlation_matrix(table) {
        charts.insert("correlation_matrix".to_string(), chart);
    }

    charts
}

/// Distribution of the first numeric column.
pub fn histogram(table: &Table) -> Option<Chart> {
    let (name, values) = table.numeric_columns().next()?;
    let present: Vec<f64> = values.iter().flatten().copied().filter_map(finite).collect();
    if present.is_empty() {
        return None;
    }

    Some(Chart::Histogram {
        title: format!("Distribution of {name}"),
        column: name.to_string(),
        bins: bin_values(&present),
    })
}

fn bin_values(values: &[f64]) -> Vec<HistogramBin> {
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if min == max {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: values.len(),
        }];
    }

    // Sturges' rule
    let bin_count = ((values.len() as f64).log2().ceil() as usize + 1).clamp(1, MAX_HISTOGRAM_BINS);
    let width = (max - min) / bin_count as f64;

    let mut counts = vec![0usize; bin_count];
    for value in values {
        let idx = (((value - min) / width).floor() as usize).min(bin_count - 1);
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(idx, count)| HistogramBin {
            start: min + width * idx as f64,
            end: if idx + 1 == bin_count {
                max
            } else {
                min + width * (idx + 1) as f64
            },
            count,
        })
        .collect()
}

/// Value counts of the first text column, most frequent first.
pub fn bar_chart(table: &Table) -> Option<Chart> {
    let (name, values) = table.text_columns().next()?;

    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().flatten() {
        let entry = counts.entry(value.as_str()).or_insert_with(|| {
            order.push(value.as_str());
            0
        });
        *entry += 1;
    }
    if order.is_empty() {
        return None;
    }

    let mut bars: Vec<BarEntry> = order
        .into_iter()
        .map(|label| BarEntry {
            label: label.to_string(),
            count: counts[label],
        })
        .collect();
    // Stable sort keeps first-seen order among equal counts.
    bars.sort_by(|a, b| b.count.cmp(&a.count));

    Some(Chart::BarChart {
        title: format!("{name} Counts"),
        column: name.to_string(),
        bars,
    })
}

/// Pearson matrix over rows where every numeric column has a value.
///
/// Requires at least two numeric columns and two complete rows.
pub fn correlation_matrix(table: &Table) -> Option<Chart> {
    let numeric: Vec<(&str, &[Option<f64>])> = table.numeric_columns().collect();
    if numeric.len() < 2 {
        return None;
    }

    let complete_rows: Vec<usize> = (0..table.row_count())
        .filter(|&row| {
            numeric
                .iter()
                .all(|(_, values)| values[row].is_some_and(f64::is_finite))
        })
        .collect();
    if complete_rows.len() < 2 {
        return None;
    }

    let series: Vec<Vec<f64>> = numeric
        .iter()
        .map(|(_, values)| {
            complete_rows
                .iter()
                .filter_map(|&row| values[row])
                .collect()
        })
        .collect();

    let matrix = series
        .iter()
        .map(|xs| series.iter().map(|ys| pearson(xs, ys)).collect())
        .collect();

    Some(Chart::CorrelationMatrix {
        title: "Correlation Matrix".to_string(),
        columns: numeric.iter().map(|(name, _)| name.to_string()).collect(),
        matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::table::{Column, ColumnData};

    fn numeric(name: &str, values: Vec<Option<f64>>) -> Column {
        Column {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    fn text(name: &str, values: &[&str]) -> Column {
        Column {
            name: name.into(),
            data: ColumnData::Text(values.iter().map(|v| Some(v.to_string())).collect()),
        }
    }

    #[test]
    fn test_histogram_uses_sturges_bins() {
        let values: Vec<Option<f64>> = (1..=8).map(|v| Some(v as f64)).collect();
        let table = Table::new(vec![numeric("score", values)]);

        let Some(Chart::Histogram { title, bins, .. }) = histogram(&table) else {
            panic!("expected histogram");
        };
        assert_eq!(title, "Distribution of score");
        assert_eq!(bins.len(), 4);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 8);
        assert_eq!(bins[0].start, 1.0);
        assert_eq!(bins[3].end, 8.0);
    }

    #[test]
    fn test_histogram_of_constant_column_is_single_bin() {
        let table = Table::new(vec![numeric("c", vec![Some(2.0), Some(2.0), None])]);
        let Some(Chart::Histogram { bins, .. }) = histogram(&table) else {
            panic!("expected histogram");
        };
        assert_eq!(bins, vec![HistogramBin { start: 2.0, end: 2.0, count: 2 }]);
    }

    #[test]
    fn test_bar_chart_orders_by_count_then_first_seen() {
        let table = Table::new(vec![text("city", &["Lima", "Oslo", "Oslo", "Pune", "Lima", "Oslo"])]);

        let Some(Chart::BarChart { title, bars, .. }) = bar_chart(&table) else {
            panic!("expected bar chart");
        };
        assert_eq!(title, "city Counts");
        let labels: Vec<(&str, usize)> = bars.iter().map(|b| (b.label.as_str(), b.count)).collect();
        assert_eq!(labels, vec![("Oslo", 3), ("Lima", 2), ("Pune", 1)]);
    }

    #[test]
    fn test_correlation_needs_two_numeric_columns() {
        let table = Table::new(vec![
            numeric("a", vec![Some(1.0), Some(2.0), Some(3.0)]),
            text("t", &["x", "y", "z"]),
        ]);
        assert!(correlation_matrix(&table).is_none());
    }

    #[test]
    fn test_correlation_needs_two_complete_rows() {
        let table = Table::new(vec![
            numeric("a", vec![Some(1.0), None, Some(3.0)]),
            numeric("b", vec![Some(1.0), Some(2.0), None]),
        ]);
        assert!(correlation_matrix(&table).is_none());
    }

    #[test]
    fn test_correlation_drops_incomplete_rows() {
        let table = Table::new(vec![
            numeric("a", vec![Some(1.0), Some(2.0), None, Some(3.0)]),
            numeric("b", vec![Some(2.0), Some(4.0), Some(100.0), Some(6.0)]),
            numeric("flat", vec![Some(5.0), Some(5.0), Some(5.0), Some(5.0)]),
        ]);

        let Some(Chart::CorrelationMatrix { columns, matrix, .. }) = correlation_matrix(&table) else {
            panic!("expected correlation matrix");
        };
        assert_eq!(columns, vec!["a", "b", "flat"]);
        assert!((matrix[0][1].unwrap() - 1.0).abs() < 1e-9);
        assert_eq!(matrix[0][2], None);
        assert_eq!(matrix[2][2], None);
    }

    #[test]
    fn test_build_charts_keys_and_tags() {
        let table = Table::new(vec![
            numeric("a", vec![Some(1.0), Some(2.0)]),
            numeric("b", vec![Some(3.0), Some(1.0)]),
            text("t", &["x", "y"]),
        ]);

        let charts = build_charts(&table);
        let keys: Vec<&str> = charts.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["bar_chart", "correlation_matrix", "histogram"]);

        let json = serde_json::to_value(&charts).unwrap();
        assert_eq!(json["histogram"]["type"], "histogram");
        assert_eq!(json["correlation_matrix"]["type"], "correlation_matrix");
    }
}
