//! Descriptive statistics over numeric columns.

use serde::Serialize;
use utoipa::ToSchema;

use super::json::finite;
use super::table::Table;

/// `describe()`-style summary of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1)
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub p25: Option<f64>,
    #[serde(rename = "50%")]
    pub p50: Option<f64>,
    #[serde(rename = "75%")]
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

/// Summaries for every numeric column, in table order.
pub fn describe(table: &Table) -> Vec<ColumnSummary> {
    table
        .numeric_columns()
        .map(|(name, values)| summarize(name, values))
        .collect()
}

pub fn summarize(name: &str, values: &[Option<f64>]) -> ColumnSummary {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    present.sort_by(f64::total_cmp);

    ColumnSummary {
        column: name.to_string(),
        count: present.len(),
        mean: mean(&present),
        std: sample_std(&present),
        min: present.first().copied().and_then(finite),
        p25: quantile_sorted(&present, 0.25),
        p50: quantile_sorted(&present, 0.50),
        p75: quantile_sorted(&present, 0.75),
        max: present.last().copied().and_then(finite),
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    finite(values.iter().sum::<f64>() / values.len() as f64)
}

pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    finite((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Linear-interpolated quantile of already sorted values.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    match sorted.len() {
        0 => None,
        1 => finite(sorted[0]),
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = pos.ceil() as usize;
            let fraction = pos - lower as f64;
            finite(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
        }
    }
}

/// Pearson correlation of paired samples; `None` when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    finite((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}
