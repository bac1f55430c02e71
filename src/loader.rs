// Spreadsheet loading for the CLI.
//
// Turns uploaded files into the parsed shapes the engine consumes:
// - `.csv` -> one `RawSheet` named after the file,
// - `.xlsx` / `.xlsm` / `.xls` / `.ods` -> one `RawSheet` per worksheet,
// - `.json` -> `{ sheet: { header: [cells] } }` bags, already column-keyed.
use anyhow::{bail, Context};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::path::Path;

use crate::engine::SheetInput;
use crate::types::{CellValue, RawSheet, SheetBag};
use crate::util::parse_f64_safe;

/// Sheets with fewer rows cannot hold a header plus an "out of" row.
const MIN_ROWS: usize = 2;

pub fn load_sheets(path: &Path) -> anyhow::Result<Vec<SheetInput>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let sheets = match ext.as_str() {
        "csv" => vec![SheetInput::Rows(load_csv(path)?)],
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path)?
            .into_iter()
            .map(SheetInput::Rows)
            .collect(),
        "json" => load_bags(path)?.into_iter().map(SheetInput::Columns).collect(),
        _ => bail!("unsupported file type: {}", path.display()),
    };
    tracing::info!(file = %path.display(), sheets = sheets.len(), "loaded spreadsheet");
    Ok(sheets)
}

fn sheet_name_from(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Sheet1")
        .to_string()
}

/// Text cells that hold a number become numbers; blanks become `Empty`.
fn text_cell(s: &str) -> CellValue {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return CellValue::Empty;
    }
    match parse_f64_safe(Some(trimmed)) {
        Some(v) => CellValue::Number(v),
        None => CellValue::Text(trimmed.to_string()),
    }
}

pub fn load_csv(path: &Path) -> anyhow::Result<RawSheet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("{}: bad CSV row {}", path.display(), i + 1))?;
        rows.push(record.iter().map(text_cell).collect());
    }
    Ok(RawSheet::new(sheet_name_from(path), rows))
}

fn data_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Float(v) => CellValue::Number(*v),
        Data::String(s) => text_cell(s),
        Data::Empty => CellValue::Empty,
        Data::Error(_) => CellValue::Empty,
        other => CellValue::Text(other.to_string()),
    }
}

pub fn load_workbook(path: &Path) -> anyhow::Result<Vec<RawSheet>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let range = workbook
            .worksheet_range(&name)
            .with_context(|| format!("{}: failed to read sheet {name}", path.display()))?;
        let rows: Vec<Vec<CellValue>> = range
            .rows()
            .map(|row| row.iter().map(data_cell).collect())
            .collect();
        if rows.len() < MIN_ROWS {
            tracing::debug!(sheet = %name, rows = rows.len(), "skipping near-empty sheet");
            continue;
        }
        sheets.push(RawSheet::new(name, rows));
    }
    Ok(sheets)
}

/// `{ "Sheet1": { "StudentName": [...], "Total of CO1": [...] } }`
pub fn load_bags(path: &Path) -> anyhow::Result<Vec<SheetBag>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed: BTreeMap<String, BTreeMap<String, Vec<CellValue>>> = serde_json::from_str(&text)
        .with_context(|| format!("{}: expected sheet -> header -> cells", path.display()))?;
    Ok(parsed
        .into_iter()
        .map(|(name, columns)| SheetBag::from_entries(name, columns))
        .collect())
}
