//! Categorical filter options and row filtering.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use super::table::{ColumnData, Table};

/// Columns with more distinct values than this get no filter dropdown.
pub const MAX_FILTER_OPTIONS: usize = 50;

/// Sorted distinct values of each low-cardinality text column.
pub fn filter_options(table: &Table) -> Map<String, Value> {
    table
        .text_columns()
        .filter_map(|(name, values)| {
            let distinct: BTreeSet<&str> = values.iter().flatten().map(String::as_str).collect();
            (distinct.len() <= MAX_FILTER_OPTIONS).then(|| {
                (
                    name.to_string(),
                    Value::Array(distinct.into_iter().map(Value::from).collect()),
                )
            })
        })
        .collect()
}

/// Keep the rows matching every active filter.
///
/// Unknown columns and `null`/blank/`"all"` values are ignored. Text columns
/// compare as strings; numeric columns compare numerically.
pub fn apply_filters(table: &Table, filters: &Map<String, Value>) -> Table {
    let mut keep = vec![true; table.row_count()];
    let mut active = false;

    for (key, value) in filters {
        let Some(column) = table.column(key) else {
            continue;
        };
        let Some(wanted) = FilterValue::parse(value) else {
            continue;
        };
        active = true;

        match &column.data {
            ColumnData::Text(cells) => {
                let target = wanted.as_text();
                for (keep, cell) in keep.iter_mut().zip(cells) {
                    *keep &= cell.as_deref() == Some(target.as_str());
                }
            }
            ColumnData::Numeric(cells) => {
                let target = wanted.as_number();
                for (keep, cell) in keep.iter_mut().zip(cells) {
                    *keep &= matches!((cell, target), (Some(c), Some(t)) if *c == t);
                }
            }
        }
    }

    if active {
        table.select_rows(&keep)
    } else {
        table.clone()
    }
}

enum FilterValue<'a> {
    Text(&'a str),
    Number(f64),
    Bool(bool),
}

impl<'a> FilterValue<'a> {
    fn parse(value: &'a Value) -> Option<Self> {
        match value {
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
                    None
                } else {
                    Some(FilterValue::Text(s))
                }
            }
            Value::Number(n) => n.as_f64().map(FilterValue::Number),
            Value::Bool(b) => Some(FilterValue::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    fn as_text(&self) -> String {
        match self {
            FilterValue::Text(s) => s.to_string(),
            FilterValue::Number(n) => n.to_string(),
            FilterValue::Bool(b) => b.to_string(),
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Text(s) => s.trim().parse().ok(),
            FilterValue::Number(n) => Some(*n),
            FilterValue::Bool(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::table::Column;
    use serde_json::json;

    fn sample() -> Table {
        Table::new(vec![
            Column {
                name: "region".into(),
                data: ColumnData::Text(vec![
                    Some("north".into()),
                    Some("south".into()),
                    Some("north".into()),
                    None,
                ]),
            },
            Column {
                name: "units".into(),
                data: ColumnData::Numeric(vec![Some(1.0), Some(2.0), Some(2.0), Some(3.0)]),
            },
        ])
    }

    fn filters(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_options_sorted_and_capped() {
        let options = filter_options(&sample());
        assert_eq!(Value::Object(options), json!({"region": ["north", "south"]}));

        let many = Table::new(vec![Column {
            name: "id".into(),
            data: ColumnData::Text((0..51).map(|i| Some(format!("v{i}"))).collect()),
        }]);
        assert!(filter_options(&many).is_empty());
    }

    #[test]
    fn test_noop_filters_keep_every_row() {
        let table = sample();
        for value in [
            json!({"unknown": "north"}),
            json!({"region": "all"}),
            json!({"region": "  ALL "}),
            json!({"region": ""}),
            json!({"region": null}),
            json!({}),
        ] {
            assert_eq!(apply_filters(&table, &filters(value.clone())), table, "{value}");
        }
    }

    #[test]
    fn test_text_filter() {
        let filtered = apply_filters(&sample(), &filters(json!({"region": "north"})));
        assert_eq!(filtered.row_count(), 2);
    }

    #[test]
    fn test_numeric_filter_accepts_numbers_and_strings() {
        let table = sample();
        assert_eq!(apply_filters(&table, &filters(json!({"units": 2}))).row_count(), 2);
        assert_eq!(apply_filters(&table, &filters(json!({"units": "2"}))).row_count(), 2);
        assert_eq!(apply_filters(&table, &filters(json!({"units": "two"}))).row_count(), 0);
    }

    #[test]
    fn test_filters_combine() {
        let filtered = apply_filters(&sample(), &filters(json!({"region": "north", "units": 2})));
        assert_eq!(filtered.row_count(), 1);
    }
}
