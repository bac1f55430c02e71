// Attainment calculator.
//
// Threshold comparison per CO column, then per sheet, then pooled across the
// sheets that make up one assessment component.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::{AttainmentLevel, CellValue, CoLabel, NormalizedSheetData, Series, Threshold};

/// Threshold comparison for one CO over one set of students.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentResult {
    /// Maximum marks; 0 when the CO was not assessed.
    pub out_of: f64,
    pub threshold_marks: f64,
    pub above_count: usize,
    pub total_students: usize,
    pub percentage: f64,
    pub level: AttainmentLevel,
}

impl AttainmentResult {
    pub fn is_assessed(&self) -> bool {
        self.out_of > 0.0
    }
}

/// Count students at or above `threshold` of `max_marks` and classify.
///
/// - A missing or non-positive `max_marks` means "not assessed": nothing is
///   above, percentage and level are 0.
/// - Non-numeric or blank marks still count as students but never as above.
pub fn compute_attainment(
    students: &[CellValue],
    max_marks: Option<f64>,
    threshold: Threshold,
) -> AttainmentResult {
    let total_students = students.len();
    let out_of = match max_marks {
        Some(m) if m.is_finite() && m > 0.0 => m,
        _ => {
            return AttainmentResult {
                out_of: 0.0,
                threshold_marks: 0.0,
                above_count: 0,
                total_students,
                percentage: 0.0,
                level: AttainmentLevel::Unattained,
            }
        }
    };

    let threshold_marks = threshold.marks_for(out_of);
    let above_count = students
        .iter()
        .filter_map(CellValue::as_f64)
        .filter(|mark| *mark >= threshold_marks)
        .count();
    let percentage = if total_students > 0 {
        (above_count as f64 / total_students as f64) * 100.0
    } else {
        0.0
    };

    AttainmentResult {
        out_of,
        threshold_marks,
        above_count,
        total_students,
        percentage,
        level: AttainmentLevel::from_percentage(percentage),
    }
}

/// [`compute_attainment`] over a series laid out as out-of first, students after.
pub fn series_attainment(series: &Series, threshold: Threshold) -> AttainmentResult {
    compute_attainment(series.students(), series.out_of(), threshold)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetAttainment {
    pub sheet_name: String,
    pub student_count: usize,
    pub per_co: BTreeMap<CoLabel, AttainmentResult>,
}

pub fn evaluate_sheet(data: &NormalizedSheetData, threshold: Threshold) -> SheetAttainment {
    let per_co: BTreeMap<CoLabel, AttainmentResult> = data
        .co_data
        .iter()
        .map(|(co, series)| (*co, series_attainment(series, threshold)))
        .collect();
    for (co, r) in &per_co {
        tracing::debug!(
            sheet = %data.sheet_name,
            co = %co,
            above = r.above_count,
            students = r.total_students,
            percentage = r.percentage,
            level = r.level.value(),
            "co attainment"
        );
    }
    SheetAttainment {
        sheet_name: data.sheet_name.clone(),
        student_count: data.student_count(),
        per_co,
    }
}

/// A component's attainment for one CO, pooled over its sheets.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PooledAttainment {
    pub above_count: usize,
    pub total_students: usize,
    pub sheets_assessed: usize,
    pub percentage: f64,
    pub level: AttainmentLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentAttainment {
    pub name: String,
    pub sheets: Vec<SheetAttainment>,
    pub per_co: BTreeMap<CoLabel, PooledAttainment>,
}

impl ComponentAttainment {
    /// Level for `co`; 0 when no sheet of this component assessed it.
    pub fn level(&self, co: CoLabel) -> AttainmentLevel {
        self.per_co.get(&co).map(|p| p.level).unwrap_or_default()
    }
}

/// Pool per-sheet results into one component result. Only sheets where a CO
/// was assessed contribute to that CO's counts.
pub fn pool_component(name: &str, sheets: Vec<SheetAttainment>) -> ComponentAttainment {
    let mut per_co: BTreeMap<CoLabel, PooledAttainment> = BTreeMap::new();
    for sheet in &sheets {
        for (co, r) in &sheet.per_co {
            let e = per_co.entry(*co).or_default();
            if r.is_assessed() {
                e.above_count += r.above_count;
                e.total_students += r.total_students;
                e.sheets_assessed += 1;
            }
        }
    }
    for pooled in per_co.values_mut() {
        pooled.percentage = if pooled.total_students > 0 {
            (pooled.above_count as f64 / pooled.total_students as f64) * 100.0
        } else {
            0.0
        };
        pooled.level = AttainmentLevel::from_percentage(pooled.percentage);
    }
    ComponentAttainment {
        name: name.to_string(),
        sheets,
        per_co,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marks(values: &[f64]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Number(*v)).collect()
    }

    #[test]
    fn ten_students_six_above_is_level_two() {
        let students = marks(&[12.0, 10.0, 15.0, 9.5, 20.0, 3.0, 11.0, 10.0, 0.0, 7.0]);
        let r = compute_attainment(&students, Some(20.0), Threshold(50.0));
        assert_eq!(r.threshold_marks, 10.0);
        assert_eq!(r.above_count, 6);
        assert_eq!(r.total_students, 10);
        assert!((r.percentage - 60.0).abs() < 1e-9);
        assert_eq!(r.level, AttainmentLevel::Moderate);
    }

    #[test]
    fn zero_max_marks_is_not_assessed() {
        let students = marks(&[20.0, 20.0, 20.0]);
        for max in [Some(0.0), None, Some(-5.0), Some(f64::NAN)] {
            let r = compute_attainment(&students, max, Threshold(50.0));
            assert_eq!(r.above_count, 0);
            assert_eq!(r.percentage, 0.0);
            assert_eq!(r.level, AttainmentLevel::Unattained);
            assert_eq!(r.total_students, 3);
            assert!(!r.is_assessed());
        }
    }

    #[test]
    fn non_numeric_marks_count_as_students_only() {
        let students = vec![
            CellValue::Number(8.0),
            CellValue::text("AB"),
            CellValue::Empty,
            CellValue::text("9"),
        ];
        let r = compute_attainment(&students, Some(10.0), Threshold(0.0));
        assert_eq!(r.total_students, 4);
        assert_eq!(r.above_count, 2);
        assert_eq!(r.level, AttainmentLevel::Moderate);
    }

    #[test]
    fn raising_threshold_never_increases_above_count() {
        let students = marks(&[1.0, 4.0, 5.0, 7.5, 9.0, 10.0, 2.0, 6.0]);
        let mut last = usize::MAX;
        for pct in (0..=100).step_by(5) {
            let r = compute_attainment(&students, Some(10.0), Threshold(pct as f64));
            assert!(r.above_count <= last, "threshold {pct}");
            last = r.above_count;
        }
    }

    #[test]
    fn empty_series_has_no_students() {
        let r = series_attainment(&Series::default(), Threshold::default());
        assert_eq!(r.total_students, 0);
        assert_eq!(r.percentage, 0.0);
    }

    #[test]
    fn pooling_sums_counts_of_assessed_sheets() {
        let co = CoLabel(1);
        let sheet = |above: usize, total: usize, out_of: f64| SheetAttainment {
            sheet_name: "s".into(),
            student_count: total,
            per_co: BTreeMap::from([(
                co,
                AttainmentResult {
                    out_of,
                    threshold_marks: out_of / 2.0,
                    above_count: above,
                    total_students: total,
                    percentage: 0.0,
                    level: AttainmentLevel::Unattained,
                },
            )]),
        };
        let pooled = pool_component(
            "Quiz",
            vec![sheet(9, 10, 10.0), sheet(7, 10, 10.0), sheet(0, 30, 0.0)],
        );
        let p = pooled.per_co[&co];
        assert_eq!(p.above_count, 16);
        assert_eq!(p.total_students, 20);
        assert_eq!(p.sheets_assessed, 2);
        assert!((p.percentage - 80.0).abs() < 1e-9);
        assert_eq!(pooled.level(co), AttainmentLevel::High);
        assert_eq!(pooled.level(CoLabel(9)), AttainmentLevel::Unattained);
    }
}
