//! In-memory tabular model.
//!
//! A [`RawTable`] is what the loader produces: headers plus rows of optional
//! strings. [`Table`] is the typed, column-oriented form the analytics run on.

use serde_json::{Map, Value};

/// Untyped rows straight out of a CSV or worksheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    /// Every row has exactly `headers.len()` cells
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Build from ragged rows, padding short rows and dropping overflow cells.
    pub fn from_ragged(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect();
        Self { headers, rows }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    fn select(&self, keep: &[bool]) -> ColumnData {
        fn pick<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(keep)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| value.clone())
                .collect()
        }

        match self {
            ColumnData::Numeric(values) => ColumnData::Numeric(pick(values, keep)),
            ColumnData::Text(values) => ColumnData::Text(pick(values, keep)),
        }
    }

    fn cell_json(&self, row: usize) -> Value {
        match self {
            ColumnData::Numeric(values) => values[row]
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ColumnData::Text(values) => values[row]
                .as_ref()
                .map(|text| Value::String(text.clone()))
                .unwrap_or(Value::Null),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Column-oriented table; all columns have `row_count` entries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Assemble a table from columns of equal length.
    ///
    /// # Panics
    ///
    /// Panics if the columns differ in length.
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.first().map(|c| c.data.len()).unwrap_or(0);
        assert!(
            columns.iter().all(|c| c.data.len() == row_count),
            "all columns must have the same length"
        );
        Self { columns, row_count }
    }

    /// Infer column types from raw cells.
    ///
    /// A column is numeric when every non-missing cell parses as a float.
    pub fn from_raw(raw: RawTable) -> Self {
        let row_count = raw.rows.len();
        let columns = raw
            .headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let cells: Vec<Option<String>> =
                    raw.rows.iter().map(|row| row[idx].clone()).collect();
                Column {
                    name,
                    data: infer_column(cells),
                }
            })
            .collect();

        Self { columns, row_count }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Numeric columns in table order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns.iter().filter_map(|c| match &c.data {
            ColumnData::Numeric(values) => Some((c.name.as_str(), values.as_slice())),
            ColumnData::Text(_) => None,
        })
    }

    /// Text columns in table order.
    pub fn text_columns(&self) -> impl Iterator<Item = (&str, &[Option<String>])> {
        self.columns.iter().filter_map(|c| match &c.data {
            ColumnData::Text(values) => Some((c.name.as_str(), values.as_slice())),
            ColumnData::Numeric(_) => None,
        })
    }

    /// Keep only rows whose mask entry is true.
    pub fn select_rows(&self, keep: &[bool]) -> Table {
        debug_assert_eq!(keep.len(), self.row_count);
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.select(keep),
                })
                .collect(),
            row_count: keep.iter().filter(|k| **k).count(),
        }
    }

    /// First `n` rows as JSON objects keyed by column name.
    pub fn head(&self, n: usize) -> Vec<Map<String, Value>> {
        (0..self.row_count.min(n))
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.data.cell_json(row)))
                    .collect()
            })
            .collect()
    }
}

fn infer_column(cells: Vec<Option<String>>) -> ColumnData {
    let parsed: Option<Vec<Option<f64>>> = cells
        .iter()
        .map(|cell| match cell {
            None => Some(None),
            Some(text) => text.parse::<f64>().ok().map(Some),
        })
        .collect();

    match parsed {
        Some(values) if values.iter().any(Option::is_some) => ColumnData::Numeric(values),
        _ => ColumnData::Text(cells),
    }
}
