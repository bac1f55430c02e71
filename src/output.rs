use anyhow::Context;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{builder::Builder, settings::Style, Table, Tabled};

use crate::types::{ReportTable, ReportTables};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Header row then the rendered cells; numbers carry two decimals.
pub fn write_table_csv(path: &Path, table: &ReportTable) -> anyhow::Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    wtr.write_record(&table.header)?;
    for row in table.string_rows() {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// File-system friendly version of a table title.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Write every table as CSV under `dir` plus `report_tables.json`.
/// Returns the files written, in order.
pub fn write_report(dir: &Path, tables: &ReportTables) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;
    let mut written = Vec::new();

    for (i, table) in tables.sheet_data.iter().enumerate() {
        let path = dir.join(format!("sheet{}_{}_data.csv", i + 1, slug(&table.title)));
        write_table_csv(&path, table)?;
        written.push(path);
    }
    for (i, table) in tables.sheet_attainment.iter().enumerate() {
        let path = dir.join(format!("sheet{}_{}.csv", i + 1, slug(&table.title)));
        write_table_csv(&path, table)?;
        written.push(path);
    }
    for (name, table) in [
        ("co_attainment_levels.csv", &tables.component_levels),
        ("co_analysis.csv", &tables.co_analysis),
        ("co_po_mapping.csv", &tables.copo_mapping),
        ("co_po_attainment.csv", &tables.copo_attainment),
    ] {
        let path = dir.join(name);
        write_table_csv(&path, table)?;
        written.push(path);
    }

    let path = dir.join("co_summary.csv");
    write_csv(&path, &tables.co_summary)?;
    written.push(path);

    let path = dir.join("report_tables.json");
    write_json(&path, tables)?;
    written.push(path);
    Ok(written)
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

/// Markdown rendering of the first `max_rows` rows of a report table.
pub fn render_report_table(table: &ReportTable, max_rows: usize) -> String {
    if table.rows.is_empty() {
        return "(no rows)".to_string();
    }
    let mut builder = Builder::default();
    builder.push_record(table.header.iter().cloned());
    for row in table.string_rows().into_iter().take(max_rows) {
        builder.push_record(row);
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn preview_report_table(table: &ReportTable, max_rows: usize) {
    println!("{}\n", table.title);
    println!("{}\n", render_report_table(table, max_rows));
}
