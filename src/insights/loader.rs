//! Decode stored spreadsheet bytes into a [`RawTable`].

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, XlsxError, open_workbook_from_rs};
use thiserror::Error;

use super::table::RawTable;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {0}")]
    UnsupportedType(String),
    #[error("failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to parse workbook: {0}")]
    Workbook(String),
    #[error("file contains no header row")]
    Empty,
}

/// Supported source formats, chosen from the blob path extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Csv,
    Xlsx,
}

impl SourceFormat {
    pub fn from_path(path: &str) -> Result<Self, LoadError> {
        let lower = path.to_ascii_lowercase();
        if lower.ends_with(".csv") {
            Ok(SourceFormat::Csv)
        } else if lower.ends_with(".xlsx") {
            Ok(SourceFormat::Xlsx)
        } else {
            Err(LoadError::UnsupportedType(path.to_string()))
        }
    }
}

/// Parse `data` according to the extension of `path`.
pub fn load_table(path: &str, data: &[u8]) -> Result<RawTable, LoadError> {
    match SourceFormat::from_path(path)? {
        SourceFormat::Csv => load_csv(data),
        SourceFormat::Xlsx => load_xlsx(data),
    }
}

/// Header row first; rows may be ragged and invalid UTF-8 is replaced.
pub fn load_csv(data: &[u8]) -> Result<RawTable, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers: Vec<String> = reader
        .byte_headers()?
        .iter()
        .map(|field| String::from_utf8_lossy(field).into_owned())
        .collect();
    if headers.is_empty() {
        return Err(LoadError::Empty);
    }

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| Some(String::from_utf8_lossy(field).into_owned()))
                .collect(),
        );
    }

    Ok(RawTable::from_ragged(headers, rows))
}

/// First worksheet only; its first row is the header.
pub fn load_xlsx(data: &[u8]) -> Result<RawTable, LoadError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))
        .map_err(|err: XlsxError| LoadError::Workbook(err.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(LoadError::Empty)?
        .map_err(|err| LoadError::Workbook(err.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(LoadError::Empty)?
        .iter()
        .map(|cell| cell_to_string(cell).unwrap_or_default())
        .collect();

    let rows = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    Ok(RawTable::from_ragged(headers, rows))
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) => Some(s.clone()),
        Data::Float(f) => Some(f.to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(d) => Some(d.to_string()),
        Data::DateTimeIso(d) => Some(d.clone()),
        Data::DurationIso(d) => Some(d.clone()),
        Data::Error(_) | Data::Empty => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SourceFormat::from_path("a/b/Sales.CSV").unwrap(), SourceFormat::Csv);
        assert_eq!(SourceFormat::from_path("x.xlsx").unwrap(), SourceFormat::Xlsx);
        assert!(matches!(
            SourceFormat::from_path("notes.txt"),
            Err(LoadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_load_csv_pads_short_rows() {
        let raw = load_csv(b"\xef\xbb\xbfname,age,city\nana,31,Oslo\nbo,40\n").unwrap();
        assert_eq!(raw.headers, vec!["name", "age", "city"]);
        assert_eq!(raw.rows.len(), 2);
        assert_eq!(raw.rows[1], vec![Some("bo".into()), Some("40".into()), None]);
    }

    #[test]
    fn test_load_csv_replaces_invalid_utf8() {
        let raw = load_csv(b"label\nca\xfff\n").unwrap();
        assert_eq!(raw.rows[0][0].as_deref(), Some("ca\u{fffd}f"));
    }

    #[test]
    fn test_load_empty_csv_fails() {
        assert!(matches!(load_csv(b""), Err(LoadError::Empty)));
    }

    #[test]
    fn test_load_garbage_xlsx_fails() {
        assert!(matches!(
            load_table("report.xlsx", b"definitely not a zip archive"),
            Err(LoadError::Workbook(_))
        ));
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_to_string(&Data::Int(7)).as_deref(), Some("7"));
        assert_eq!(cell_to_string(&Data::Float(2.5)).as_deref(), Some("2.5"));
        assert_eq!(cell_to_string(&Data::Bool(true)).as_deref(), Some("true"));
        assert_eq!(cell_to_string(&Data::Empty), None);
    }
}
