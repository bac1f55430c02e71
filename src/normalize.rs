// Sheet normalizer.
//
// Two steps, both total:
// - `extract_columns` locates the header rows of a raw sheet and slices it
//   into header-keyed columns (the bag-of-arrays shape).
// - `normalize` classifies the bag's keys through the header schema and keeps
//   the four series the engine needs.
//
// Neither step fails. Whatever cannot be recognised is simply left out, and a
// sheet with nothing recognisable normalizes to empty series.
use std::collections::BTreeMap;

use crate::schema::{FieldRole, HeaderSchema, DEFAULT_SCHEMA};
use crate::types::{CellValue, NormalizedSheetData, RawSheet, Series, SheetBag};

pub fn extract_columns(raw: &RawSheet) -> SheetBag {
    extract_columns_with(raw, &DEFAULT_SCHEMA)
}

pub fn extract_columns_with(raw: &RawSheet, schema: &HeaderSchema) -> SheetBag {
    let role_of = |cell: &CellValue| cell.as_text().and_then(|t| schema.classify(t));

    // Title rows may mention a CO ("Mid Term (CO1, CO2)"); the header row is
    // the one with the most CO/total cells, earliest on a tie.
    let co_roles = [FieldRole::CoMarks, FieldRole::TotalMarks];
    let co_header = raw
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| (i, role_count(row, schema, &co_roles)))
        .filter(|(_, count)| *count > 0)
        .fold(None::<(usize, usize)>, |best, (i, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((i, count)),
        })
        .map(|(i, _)| i);

    // Identity headers sit on the CO header row or the out-of row below it.
    // Only a sheet without CO headers is searched top to bottom.
    let id_roles = [FieldRole::StudentName, FieldRole::RollNumber];
    let id_header = match co_header {
        Some(h) => (h..raw.rows.len().min(h + 2))
            .find(|&i| role_count(&raw.rows[i], schema, &id_roles) > 0),
        None => raw
            .rows
            .iter()
            .position(|row| role_count(row, schema, &id_roles) > 0),
    };

    let mut bag = SheetBag::new(raw.name.clone());
    if co_header.is_none() && id_header.is_none() {
        tracing::warn!(sheet = %raw.name, "no recognisable header row; sheet contributes no data");
        return bag;
    }

    // (column, key, index of the row holding the "out of" value)
    let mut headers: Vec<(usize, String, Option<usize>)> = Vec::new();
    if let Some(h) = co_header {
        for (col, cell) in raw.rows[h].iter().enumerate() {
            if let (Some(text), Some(m)) = (cell.as_text(), role_of(cell)) {
                if matches!(m.role, FieldRole::CoMarks | FieldRole::TotalMarks) {
                    headers.push((col, text.trim().to_string(), Some(h + 1)));
                }
            }
        }
    }
    if let Some(h) = id_header {
        for (col, cell) in raw.rows[h].iter().enumerate() {
            if let (Some(text), Some(m)) = (cell.as_text(), role_of(cell)) {
                let taken = headers.iter().any(|(c, _, _)| *c == col);
                if matches!(m.role, FieldRole::StudentName | FieldRole::RollNumber) && !taken {
                    headers.push((col, text.trim().to_string(), None));
                }
            }
        }
    }
    headers.sort_by_key(|(col, _, _)| *col);

    let data_start = co_header
        .map(|h| h + 2)
        .into_iter()
        .chain(id_header.map(|h| h + 1))
        .max()
        .unwrap_or(0);

    let student_rows: Vec<&Vec<CellValue>> = raw
        .rows
        .iter()
        .skip(data_start)
        .take_while(|row| {
            let first = row.first().map(|c| c.to_string()).unwrap_or_default();
            !schema.is_terminator(&first)
        })
        .filter(|row| !row.iter().all(CellValue::is_blank))
        .collect();

    for (col, key, out_of_row) in headers {
        let mut values = Vec::with_capacity(student_rows.len() + 1);
        values.push(
            out_of_row
                .and_then(|r| raw.rows.get(r))
                .map(|row| cell_at(row, col))
                .unwrap_or_default(),
        );
        values.extend(student_rows.iter().map(|row| cell_at(row, col)));
        bag.push(key, values);
    }

    tracing::debug!(
        sheet = %raw.name,
        columns = bag.columns.len(),
        students = student_rows.len(),
        "extracted sheet columns"
    );
    bag
}

fn role_count(row: &[CellValue], schema: &HeaderSchema, wanted: &[FieldRole]) -> usize {
    row.iter()
        .filter_map(|cell| cell.as_text().and_then(|t| schema.classify(t)))
        .filter(|m| wanted.contains(&m.role))
        .count()
}

fn cell_at(row: &[CellValue], col: usize) -> CellValue {
    row.get(col).cloned().unwrap_or_default()
}

pub fn normalize(bag: &SheetBag) -> NormalizedSheetData {
    normalize_with(bag, &DEFAULT_SCHEMA)
}

pub fn normalize_with(bag: &SheetBag, schema: &HeaderSchema) -> NormalizedSheetData {
    let mut names: Option<Series> = None;
    let mut rolls: Option<Series> = None;
    let mut totals: Option<Series> = None;
    // label -> (came from a "total ..." key, series)
    let mut cos: BTreeMap<_, (bool, Series)> = BTreeMap::new();

    for column in &bag.columns {
        let Some(m) = schema.classify(&column.key) else {
            continue;
        };
        let series = || Series(column.values.clone());
        match m.role {
            FieldRole::StudentName => {
                names.get_or_insert_with(series);
            }
            FieldRole::RollNumber => {
                rolls.get_or_insert_with(series);
            }
            FieldRole::TotalMarks => {
                totals.get_or_insert_with(series);
            }
            FieldRole::CoMarks => {
                let Some(label) = m.co else { continue };
                let is_total = schema.is_total_key(&column.key);
                let keep_existing = matches!(
                    cos.get(&label),
                    Some((existing_total, _)) if *existing_total || !is_total
                );
                if !keep_existing {
                    cos.insert(label, (is_total, series()));
                }
            }
        }
    }

    if cos.is_empty() {
        tracing::warn!(sheet = %bag.name, "sheet has no CO columns");
    }

    NormalizedSheetData {
        sheet_name: bag.name.clone(),
        student_names: names.unwrap_or_default(),
        roll_numbers: rolls.unwrap_or_default(),
        co_data: cos.into_iter().map(|(k, (_, s))| (k, s)).collect(),
        total_marks: totals.unwrap_or_default(),
    }
}

/// `extract_columns` followed by `normalize`.
pub fn normalize_sheet(raw: &RawSheet) -> NormalizedSheetData {
    normalize(&extract_columns(raw))
}
