//! XLSX row source for disgraph.
//!
//! Reads the DISARM master workbook (fetched over HTTP or from disk) and
//! maps the `incidents` and `incidenttechniques` sheets into the explicit row
//! records the core consumes. Header names drive the column mapping, so
//! upstream column reordering does not break ingestion. This crate is the
//! only place spreadsheet structure is known; the core never sees a cell.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use disgraph_core::{IncidentRow, TechniqueRow};
use tracing::info;
use umya_spreadsheet::{Spreadsheet, Worksheet};

/// Published location of the DISARM master data workbook.
pub const DISARM_MASTER_XLSX_URL: &str =
    "https://github.com/DISARMFoundation/DISARMframeworks/raw/main/DISARM_MASTER_DATA/DISARM_DATA_MASTER.xlsx";

pub const INCIDENTS_SHEET: &str = "incidents";
pub const TECHNIQUES_SHEET: &str = "incidenttechniques";

/// Download the workbook into memory and parse it.
pub fn fetch_workbook(url: &str) -> Result<Spreadsheet> {
    info!(url, "downloading source workbook");
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("failed to download workbook from {url}"))?
        .error_for_status()
        .with_context(|| format!("workbook download rejected by {url}"))?;
    let bytes = response.bytes().context("failed to read workbook body")?;
    umya_spreadsheet::reader::xlsx::read_reader(Cursor::new(bytes.to_vec()), true)
        .context("failed to parse downloaded workbook")
}

/// Parse a workbook from disk.
pub fn read_workbook(path: &Path) -> Result<Spreadsheet> {
    umya_spreadsheet::reader::xlsx::read(path)
        .with_context(|| format!("failed to read workbook {}", path.display()))
}

/// Extract the `incidents` sheet in sheet order.
pub fn incident_rows(book: &Spreadsheet) -> Result<Vec<IncidentRow>> {
    let sheet = sheet_by_name(book, INCIDENTS_SHEET)?;
    let header = header_index(sheet);
    let (_, max_row) = sheet.get_highest_column_and_row();

    let mut rows = Vec::new();
    for row in 2..=max_row {
        let record = IncidentRow {
            disarm_id: cell(sheet, &header, "disarm_id", row),
            name: cell(sheet, &header, "name", row),
            summary: cell(sheet, &header, "summary", row),
            found_in_country: cell(sheet, &header, "found_in_country", row),
            attributions_seen: cell(sheet, &header, "attributions_seen", row),
            year_started: numeric_cell(sheet, &header, "year_started", row),
            urls: cell(sheet, &header, "urls", row),
            notes: cell(sheet, &header, "notes", row),
            found_via: cell(sheet, &header, "found_via", row),
        };
        if record == IncidentRow::default() {
            continue; // blank padding row
        }
        rows.push(record);
    }
    info!(rows = rows.len(), sheet = INCIDENTS_SHEET, "extracted incident rows");
    Ok(rows)
}

/// Extract the `incidenttechniques` sheet in sheet order.
pub fn technique_rows(book: &Spreadsheet) -> Result<Vec<TechniqueRow>> {
    let sheet = sheet_by_name(book, TECHNIQUES_SHEET)?;
    let header = header_index(sheet);
    let (_, max_row) = sheet.get_highest_column_and_row();

    let mut rows = Vec::new();
    for row in 2..=max_row {
        let record = TechniqueRow {
            incident_id: cell(sheet, &header, "incident_id", row),
            technique_ids: cell(sheet, &header, "technique_ids", row),
            summary: cell(sheet, &header, "summary", row),
        };
        if record == TechniqueRow::default() {
            continue;
        }
        rows.push(record);
    }
    info!(rows = rows.len(), sheet = TECHNIQUES_SHEET, "extracted technique rows");
    Ok(rows)
}

fn sheet_by_name<'a>(book: &'a Spreadsheet, name: &str) -> Result<&'a Worksheet> {
    book.get_sheet_by_name(name)
        .ok_or_else(|| anyhow!("sheet '{name}' not found in workbook"))
}

/// Header-name → column index, from row 1. Headers are matched
/// case-insensitively because the master sheet has drifted over revisions.
fn header_index(sheet: &Worksheet) -> HashMap<String, u32> {
    let (max_col, _) = sheet.get_highest_column_and_row();
    let mut index = HashMap::new();
    for col in 1..=max_col {
        let raw = sheet.get_value((col, 1));
        let name = raw.trim();
        if !name.is_empty() {
            index.insert(name.to_ascii_lowercase(), col);
        }
    }
    index
}

/// A cell as an optional string: missing column, empty, and whitespace-only
/// all map to `None`.
fn cell(
    sheet: &Worksheet,
    header: &HashMap<String, u32>,
    column: &str,
    row: u32,
) -> Option<String> {
    let col = *header.get(column)?;
    let value = sheet.get_value((col, row));
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn numeric_cell(
    sheet: &Worksheet,
    header: &HashMap<String, u32>,
    column: &str,
    row: u32,
) -> Option<f64> {
    cell(sheet, header, column, row)?.trim().parse::<f64>().ok()
}
