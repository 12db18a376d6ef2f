//! Normalisation applied to every table before analysis.

use std::collections::HashSet;

use super::table::RawTable;

/// Cell tokens treated as missing (compared case-insensitively after trimming).
const MISSING_TOKENS: &[&str] = &["", "na", "n/a", "nan", "null", "none"];

/// Clean a freshly loaded table.
///
/// Headers are trimmed, blank ones named `column_{n}` and duplicates suffixed
/// `.1`, `.2`. Text cells are trimmed and missing tokens become `None`. Rows
/// and then columns with no values at all are dropped.
pub fn clean_table(raw: RawTable) -> RawTable {
    let headers = normalize_headers(&raw.headers);

    let rows: Vec<Vec<Option<String>>> = raw
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(normalize_cell).collect::<Vec<_>>())
        .filter(|row| row.iter().any(Option::is_some))
        .collect();

    let keep: Vec<bool> = (0..headers.len())
        .map(|idx| rows.iter().any(|row| row[idx].is_some()))
        .collect();

    let headers = headers
        .into_iter()
        .zip(&keep)
        .filter(|(_, keep)| **keep)
        .map(|(header, _)| header)
        .collect();

    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&keep)
                .filter(|(_, keep)| **keep)
                .map(|(cell, _)| cell)
                .collect()
        })
        .collect();

    RawTable { headers, rows }
}

fn normalize_cell(cell: Option<String>) -> Option<String> {
    let cell = cell?;
    let trimmed = cell.trim();
    if is_missing_token(trimmed) {
        None
    } else if trimmed.len() == cell.len() {
        Some(cell)
    } else {
        Some(trimmed.to_string())
    }
}

fn is_missing_token(value: &str) -> bool {
    MISSING_TOKENS
        .iter()
        .any(|token| token.eq_ignore_ascii_case(value))
}

fn normalize_headers(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            let base = match header.trim_start_matches('\u{feff}').trim() {
                "" => format!("column_{}", idx + 1),
                name => name.to_string(),
            };

            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}
