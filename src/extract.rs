// Entry Extractor - rows out of a resolved month sheet
//
// Column matching is canonicalization-based, never exact-string: the header
// row is folded through the Text Normalizer and required columns are located
// in that map. The description column is resolved through an ordered alias
// table (first alias present wins); when no alias column exists the
// description defaults to empty. Incomplete rows (missing code fields, hours
// absent or not a positive number) are blank/trailing noise, not reportable
// errors, and are dropped silently.

use calamine::{Data, Range};
use chrono::NaiveDate;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::EngineConfig;
use crate::normalize::canonical;

// ============================================================================
// CELL COERCION
// ============================================================================

/// Text content of a cell. Non-text values are stringified so the normalizer
/// stays total; empty cells yield `None`.
pub fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(s.trim().to_string()),
        Data::Float(v) => Some(format!("{v}")),
        Data::Int(v) => Some(format!("{v}")),
        Data::Bool(v) => Some(if *v { "1".to_string() } else { "0".to_string() }),
        other => Some(format!("{other:?}")),
    }
}

/// Numeric content of a cell as an exact decimal.
pub fn cell_decimal(cell: &Data) -> Option<Decimal> {
    match cell {
        Data::Float(v) => Decimal::from_f64(*v),
        Data::Int(v) => Some(Decimal::from(*v)),
        Data::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Date content of a cell, if it carries one.
pub fn cell_date(cell: &Data) -> Option<NaiveDate> {
    match cell {
        Data::DateTime(dt) => dt.as_datetime().map(|d| d.date()),
        Data::DateTimeIso(s) => NaiveDate::parse_from_str(&s[..10.min(s.len())], "%Y-%m-%d").ok(),
        Data::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
        _ => None,
    }
}

// ============================================================================
// HEADER RESOLUTION
// ============================================================================

/// Map of canonical header name to column index; on duplicate headers the
/// first column wins.
pub fn header_map(header_row: &[Data]) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    for (idx, cell) in header_row.iter().enumerate() {
        if let Some(text) = cell_text(cell) {
            let norm = canonical(&text);
            if !norm.is_empty() {
                map.entry(norm).or_insert(idx);
            }
        }
    }
    map
}

/// Locate a column by canonical name.
pub fn find_column(headers: &HashMap<String, usize>, name: &str) -> Option<usize> {
    headers.get(&canonical(name)).copied()
}

/// Locate a column through an ordered alias list; the first alias present
/// wins.
pub fn find_alias_column(headers: &HashMap<String, usize>, aliases: &[String]) -> Option<usize> {
    aliases
        .iter()
        .find_map(|alias| headers.get(&canonical(alias)).copied())
}

// ============================================================================
// CANDIDATE ROWS
// ============================================================================

/// One candidate row read from a month sheet, provenance-tagged. Codes are
/// kept exactly as written; canonicalization happens at comparison time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub client_raw: String,
    pub project_raw: String,
    pub description: String,
    pub date: Option<NaiveDate>,
    pub hours: Decimal,
    /// 1-based Excel row locator (header is row 1).
    pub row_number: u32,
    pub sheet: String,
    pub source_file: String,
    pub employee: String,
}

/// Extraction result for one sheet: candidate rows plus the count of rows
/// dropped as incomplete.
#[derive(Debug, Clone)]
pub struct SheetExtraction {
    pub rows: Vec<RawRow>,
    pub dropped_rows: usize,
}

/// Required source columns could not be located.
///
/// Non-fatal: the caller skips the file, logs the missing columns and the
/// run continues.
#[derive(Debug, Error)]
#[error("{file}/{sheet}: missing required column(s): {}", missing.join(", "))]
pub struct SchemaError {
    pub file: String,
    pub sheet: String,
    pub missing: Vec<String>,
}

/// Extract candidate rows from a resolved month sheet.
///
/// The row cap bounds pathological files. Rows whose client code, project
/// code or hours cell is empty, or whose hours do not parse as a number
/// greater than zero, are dropped silently and counted.
pub fn extract_sheet(
    range: &Range<Data>,
    sheet: &str,
    source_file: &str,
    employee: &str,
    config: &EngineConfig,
) -> Result<SheetExtraction, SchemaError> {
    let mut rows_iter = range.rows();
    let header_row = match rows_iter.next() {
        Some(row) => row,
        None => {
            return Err(SchemaError {
                file: source_file.to_string(),
                sheet: sheet.to_string(),
                missing: vec![
                    config.client_column.clone(),
                    config.project_column.clone(),
                    config.hours_column.clone(),
                ],
            })
        }
    };

    let headers = header_map(header_row);
    let idx_client = find_column(&headers, &config.client_column);
    let idx_project = find_column(&headers, &config.project_column);
    let idx_hours = find_column(&headers, &config.hours_column);

    let mut missing = Vec::new();
    if idx_client.is_none() {
        missing.push(config.client_column.clone());
    }
    if idx_project.is_none() {
        missing.push(config.project_column.clone());
    }
    if idx_hours.is_none() {
        missing.push(config.hours_column.clone());
    }
    if !missing.is_empty() {
        return Err(SchemaError {
            file: source_file.to_string(),
            sheet: sheet.to_string(),
            missing,
        });
    }
    let (idx_client, idx_project, idx_hours) =
        (idx_client.unwrap(), idx_project.unwrap(), idx_hours.unwrap());

    let idx_description = find_alias_column(&headers, &config.description_aliases);
    let idx_date = find_alias_column(&headers, &config.date_aliases);

    let mut rows = Vec::new();
    let mut dropped = 0usize;

    for (row_idx, row) in rows_iter.take(config.max_rows_per_sheet).enumerate() {
        let row_number = (row_idx + 2) as u32; // header is Excel row 1

        let client_raw = row.get(idx_client).and_then(cell_text).unwrap_or_default();
        let project_raw = row.get(idx_project).and_then(cell_text).unwrap_or_default();
        let hours = row.get(idx_hours).and_then(cell_decimal);

        let hours = match hours {
            Some(h) if h > Decimal::ZERO => h,
            _ => {
                dropped += 1;
                continue;
            }
        };
        if client_raw.is_empty() || project_raw.is_empty() {
            dropped += 1;
            continue;
        }

        let description = idx_description
            .and_then(|i| row.get(i))
            .and_then(cell_text)
            .unwrap_or_default();
        let date = idx_date.and_then(|i| row.get(i)).and_then(cell_date);

        rows.push(RawRow {
            client_raw,
            project_raw,
            description,
            date,
            hours,
            row_number,
            sheet: sheet.to_string(),
            source_file: source_file.to_string(),
            employee: employee.to_string(),
        });
    }

    Ok(SheetExtraction {
        rows,
        dropped_rows: dropped,
    })
}
