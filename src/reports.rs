// Report data builder.
//
// Shapes an `AttainmentSnapshot` into the flat tables the export collaborator
// writes out. No figure is recomputed here; every number is read from the
// snapshot so displayed and exported values cannot drift apart.
use std::collections::BTreeMap;

use crate::attainment::SheetAttainment;
use crate::engine::AttainmentSnapshot;
use crate::types::{
    CoSummaryRow, NormalizedSheetData, OutcomeSummary, PoLabel, ReportCell, ReportTable,
    ReportTables, SummaryStats,
};
use crate::util::format_number;

pub fn build_report_tables(snapshot: &AttainmentSnapshot) -> ReportTables {
    let mut sheet_data = Vec::new();
    let mut sheet_attainment = Vec::new();
    for (component, sheets) in snapshot.components.iter().zip(&snapshot.normalized) {
        for (data, evaluated) in sheets.iter().zip(&component.sheets) {
            let title = format!("{} / {}", component.name, data.sheet_name);
            sheet_data.push(sheet_data_table(&title, data));
            sheet_attainment.push(sheet_attainment_table(&title, evaluated));
        }
    }

    ReportTables {
        sheet_data,
        sheet_attainment,
        component_levels: component_level_table(snapshot),
        co_analysis: co_analysis_table(snapshot),
        co_summary: co_summary_rows(snapshot),
        copo_mapping: copo_mapping_table(snapshot),
        copo_attainment: copo_attainment_table(snapshot),
    }
}

/// Roll number, name, every CO column and the total, with the "out of" row first.
fn sheet_data_table(title: &str, data: &NormalizedSheetData) -> ReportTable {
    let mut header = vec!["Roll No".to_string(), "Student Name".to_string()];
    header.extend(data.co_data.keys().map(|co| co.to_string()));
    header.push("Total Marks".to_string());
    let mut table = ReportTable::new(title, header);

    let co_out_of: Vec<ReportCell> = data
        .co_data
        .values()
        .map(|s| s.out_of().map(ReportCell::Number).unwrap_or(ReportCell::Blank))
        .collect();
    let mut out_of_row = vec![ReportCell::Blank, ReportCell::text("Out of")];
    out_of_row.extend(co_out_of);
    out_of_row.push(
        data.total_marks
            .out_of()
            .map(ReportCell::Number)
            .unwrap_or(ReportCell::Blank),
    );
    table.rows.push(out_of_row);

    for i in 0..data.student_count() {
        let cell = |s: &crate::types::Series| {
            s.student(i).map(ReportCell::from).unwrap_or(ReportCell::Blank)
        };
        let mut row = vec![cell(&data.roll_numbers), cell(&data.student_names)];
        row.extend(data.co_data.values().map(cell));
        // Without a "Total Marks" column the student's CO marks are summed.
        let total = if data.total_marks.is_empty() {
            ReportCell::Number(
                data.co_data
                    .values()
                    .filter_map(|s| s.student(i))
                    .map(|c| c.to_f64_lossy())
                    .sum(),
            )
        } else {
            cell(&data.total_marks)
        };
        row.push(total);
        table.rows.push(row);
    }
    table
}

fn sheet_attainment_table(title: &str, evaluated: &SheetAttainment) -> ReportTable {
    let mut header = vec!["COs".to_string()];
    header.extend(evaluated.per_co.keys().map(|co| co.to_string()));
    let mut table = ReportTable::new(format!("{} - Attainment", title), header);

    let results: Vec<_> = evaluated.per_co.values().collect();
    let mut push = |label: &str, cells: Vec<ReportCell>| {
        let mut row = vec![ReportCell::text(label)];
        row.extend(cells);
        table.rows.push(row);
    };
    push("Marks", results.iter().map(|r| ReportCell::Number(r.out_of)).collect());
    push(
        "Total No. of Students in Class",
        results
            .iter()
            .map(|r| ReportCell::Integer(r.total_students as i64))
            .collect(),
    );
    push(
        "Threshold Marks",
        results
            .iter()
            .map(|r| ReportCell::Number(r.threshold_marks))
            .collect(),
    );
    push(
        "No. of Students Above Threshold",
        results
            .iter()
            .map(|r| ReportCell::Integer(r.above_count as i64))
            .collect(),
    );
    push(
        "Percentage Attainment",
        results.iter().map(|r| ReportCell::Number(r.percentage)).collect(),
    );
    push(
        "Attainment Level",
        results
            .iter()
            .map(|r| ReportCell::Integer(r.level.value() as i64))
            .collect(),
    );
    table
}

fn component_level_table(snapshot: &AttainmentSnapshot) -> ReportTable {
    let mut header = vec!["CO".to_string()];
    header.extend(snapshot.component_names().iter().map(|n| n.to_string()));
    header.push("Attainment Level".to_string());
    let mut table = ReportTable::new("CO-wise Attainment Level", header);
    for outcome in &snapshot.outcomes {
        let mut row = vec![ReportCell::text(outcome.co.to_string())];
        row.extend(
            outcome
                .component_levels
                .iter()
                .map(|l| ReportCell::Integer(l.value() as i64)),
        );
        row.push(ReportCell::Number(outcome.aggregate.attainment_level));
        table.rows.push(row);
    }
    table
}

fn co_analysis_table(snapshot: &AttainmentSnapshot) -> ReportTable {
    let names = snapshot.component_names();
    let mut header = vec!["CO".to_string(), "CO Statement".to_string()];
    header.extend(names.iter().map(|n| n.to_string()));
    header.extend(
        [
            "Attainment Level",
            "Indirect Attainment",
            "Overall Attainment",
            "Overall Attainment (%)",
        ]
        .map(String::from),
    );
    let mut table = ReportTable::new("Detailed CO Analysis", header);

    let mut weights = vec![ReportCell::text("Weightage (%)"), ReportCell::Blank];
    weights.extend((0..names.len()).map(|i| ReportCell::Number(snapshot.weight(i))));
    weights.extend(std::iter::repeat(ReportCell::Blank).take(4));
    table.rows.push(weights);

    for outcome in &snapshot.outcomes {
        let mut row = vec![
            ReportCell::text(outcome.co.to_string()),
            ReportCell::text(outcome.statement.clone()),
        ];
        row.extend(
            outcome
                .component_levels
                .iter()
                .map(|l| ReportCell::Integer(l.value() as i64)),
        );
        let agg = &outcome.aggregate;
        row.extend([
            ReportCell::Number(agg.attainment_level),
            ReportCell::Number(agg.indirect_score),
            ReportCell::Number(agg.overall_attainment),
            ReportCell::Number(agg.overall_percentage),
        ]);
        table.rows.push(row);
    }
    table
}

fn co_summary_rows(snapshot: &AttainmentSnapshot) -> Vec<CoSummaryRow> {
    let target = snapshot.context.threshold.percent();
    snapshot
        .outcomes
        .iter()
        .map(|o| CoSummaryRow {
            co: o.co.to_string(),
            attainment_level: format_number(o.aggregate.attainment_level, 2),
            indirect_attainment: format_number(o.aggregate.indirect_score, 2),
            overall_attainment: format_number(o.aggregate.overall_attainment, 2),
            overall_percentage: format_number(o.aggregate.overall_percentage, 2),
            target_percentage: format_number(target, 2),
            target_met: if o.target_met { "Yes" } else { "No" }.to_string(),
        })
        .collect()
}

fn po_header() -> Vec<String> {
    let mut header = vec!["CO".to_string()];
    header.extend(PoLabel::ALL.iter().map(|po| po.to_string()));
    header
}

/// Unmapped pairs render blank.
fn copo_mapping_table(snapshot: &AttainmentSnapshot) -> ReportTable {
    let mut table = ReportTable::new("CO-PO Mapping", po_header());
    for outcome in &snapshot.outcomes {
        let mut row = vec![ReportCell::text(outcome.co.to_string())];
        row.extend(snapshot.context.mapping.row(outcome.co).iter().map(|s| match s {
            0 => ReportCell::Blank,
            s => ReportCell::Integer(*s as i64),
        }));
        table.rows.push(row);
    }
    table
}

/// Cells of unmapped pairs and PO averages with no contributing CO render
/// blank; a mapped pair with zero attainment renders as 0.
fn copo_attainment_table(snapshot: &AttainmentSnapshot) -> ReportTable {
    let mut table = ReportTable::new("CO-PO Attainment", po_header());
    for row in &snapshot.copo.rows {
        let strengths = snapshot.context.mapping.row(row.co);
        let mut cells = vec![ReportCell::text(row.co.to_string())];
        cells.extend(
            row.cells
                .iter()
                .zip(strengths)
                .map(|(cell, strength)| match strength {
                    0 => ReportCell::Blank,
                    _ => ReportCell::Number(*cell),
                }),
        );
        table.rows.push(cells);
    }
    let mut averages = vec![ReportCell::text("Average")];
    averages.extend(
        snapshot
            .copo
            .po_averages
            .iter()
            .map(|avg| avg.map(ReportCell::Number).unwrap_or(ReportCell::Blank)),
    );
    table.rows.push(averages);
    table
}

/// Headline figures for `summary.json`. `generated_at` is supplied by the
/// caller so the builder stays deterministic.
pub fn generate_summary(snapshot: &AttainmentSnapshot, generated_at: &str) -> SummaryStats {
    let total_students = snapshot
        .normalized
        .iter()
        .flatten()
        .map(NormalizedSheetData::student_count)
        .sum();
    let po_attainment: BTreeMap<PoLabel, Option<f64>> = PoLabel::ALL
        .iter()
        .map(|po| (*po, snapshot.copo.average(*po)))
        .collect();
    SummaryStats {
        course_name: snapshot.course.course_name.clone(),
        academic_year: snapshot.course.academic_year.clone(),
        threshold: snapshot.context.threshold.percent(),
        aggregation: snapshot.context.policy.to_string(),
        total_students,
        outcomes: snapshot
            .outcomes
            .iter()
            .map(|o| OutcomeSummary {
                co: o.co,
                attainment_level: o.aggregate.attainment_level,
                overall_attainment: o.aggregate.overall_attainment,
                overall_percentage: o.aggregate.overall_percentage,
                target_met: o.target_met,
            })
            .collect(),
        po_attainment,
        generated_at: generated_at.to_string(),
    }
}
