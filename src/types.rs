use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use tabled::Tabled;

use crate::util::{format_number, parse_f64_safe};

/// One spreadsheet cell as handed over by the parsing collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// Numeric view of the cell; `None` for blanks and non-numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            CellValue::Number(_) => None,
            CellValue::Text(s) => parse_f64_safe(Some(s)),
            CellValue::Empty => None,
        }
    }

    /// Numeric view with the engine's coercion rule: anything unreadable is 0.
    pub fn to_f64_lossy(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{}", v),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Number(v)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

/// A parsed sheet: its name and the rows of cells in sheet order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// One header-keyed column of a sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetColumn {
    pub key: String,
    pub values: Vec<CellValue>,
}

/// Bag-of-arrays view of a sheet: header key -> values in row order.
///
/// Every column follows the same indexing: index 0 is the "out of" row and
/// students start at index 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetBag {
    pub name: String,
    pub columns: Vec<SheetColumn>,
}

impl SheetBag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn from_entries<I, K>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Vec<CellValue>)>,
        K: Into<String>,
    {
        Self {
            name: name.into(),
            columns: entries
                .into_iter()
                .map(|(key, values)| SheetColumn {
                    key: key.into(),
                    values,
                })
                .collect(),
        }
    }

    pub fn push(&mut self, key: impl Into<String>, values: Vec<CellValue>) {
        self.columns.push(SheetColumn {
            key: key.into(),
            values,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// An ordered series of cells where index 0 is the maximum-marks ("out of")
/// slot and indices >= 1 are students.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series(pub Vec<CellValue>);

impl Series {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Maximum marks, if the slot holds a number.
    pub fn out_of(&self) -> Option<f64> {
        self.0.first().and_then(CellValue::as_f64)
    }

    pub fn students(&self) -> &[CellValue] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn student_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn student(&self, idx: usize) -> Option<&CellValue> {
        self.students().get(idx)
    }
}

/// Course outcome label, `CO{n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CoLabel(pub u32);

impl CoLabel {
    /// Find a `co` marker followed by a number anywhere in `text`
    /// (`"Total of CO1"`, `"co 2"`, `"Q3 (CO-4)"`).
    pub fn find_in(text: &str) -> Option<CoLabel> {
        let lower = text.to_lowercase();
        let bytes = lower.as_bytes();
        let mut start = 0;
        while let Some(pos) = lower[start..].find("co") {
            let mut i = start + pos + 2;
            while i < bytes.len() && matches!(bytes[i], b' ' | b'-' | b'_' | b'.') {
                i += 1;
            }
            let digits_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i > digits_start {
                if let Ok(n) = lower[digits_start..i].parse::<u32>() {
                    return Some(CoLabel(n));
                }
            }
            start += pos + 2;
        }
        None
    }
}

impl fmt::Display for CoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CO{}", self.0)
    }
}

impl FromStr for CoLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_uppercase();
        upper
            .strip_prefix("CO")
            .and_then(|n| n.trim().parse::<u32>().ok())
            .map(CoLabel)
            .ok_or_else(|| format!("not a CO label: {:?}", trimmed))
    }
}

impl TryFrom<String> for CoLabel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<CoLabel> for String {
    fn from(co: CoLabel) -> Self {
        co.to_string()
    }
}

/// Program outcome or program-specific outcome. The label set is fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum PoLabel {
    Po(u8),
    Pso(u8),
}

impl PoLabel {
    pub const PO_COUNT: u8 = 12;
    pub const PSO_COUNT: u8 = 3;

    pub const ALL: [PoLabel; 15] = [
        PoLabel::Po(1),
        PoLabel::Po(2),
        PoLabel::Po(3),
        PoLabel::Po(4),
        PoLabel::Po(5),
        PoLabel::Po(6),
        PoLabel::Po(7),
        PoLabel::Po(8),
        PoLabel::Po(9),
        PoLabel::Po(10),
        PoLabel::Po(11),
        PoLabel::Po(12),
        PoLabel::Pso(1),
        PoLabel::Pso(2),
        PoLabel::Pso(3),
    ];

    /// Position in [`PoLabel::ALL`].
    pub fn index(self) -> usize {
        match self {
            PoLabel::Po(n) => (n as usize).saturating_sub(1),
            PoLabel::Pso(n) => Self::PO_COUNT as usize + (n as usize).saturating_sub(1),
        }
    }
}

impl fmt::Display for PoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoLabel::Po(n) => write!(f, "PO{}", n),
            PoLabel::Pso(n) => write!(f, "PSO{}", n),
        }
    }
}

impl FromStr for PoLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let (ctor, max, rest): (fn(u8) -> PoLabel, u8, Option<&str>) =
            if let Some(rest) = upper.strip_prefix("PSO") {
                (PoLabel::Pso, Self::PSO_COUNT, Some(rest))
            } else {
                (PoLabel::Po, Self::PO_COUNT, upper.strip_prefix("PO"))
            };
        match rest.and_then(|n| n.trim().parse::<u8>().ok()) {
            Some(n) if (1..=max).contains(&n) => Ok(ctor(n)),
            _ => Err(format!("not a PO/PSO label: {:?}", s.trim())),
        }
    }
}

impl TryFrom<String> for PoLabel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PoLabel> for String {
    fn from(po: PoLabel) -> Self {
        po.to_string()
    }
}

/// A sheet reduced to the four parallel series the engine reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSheetData {
    pub sheet_name: String,
    pub student_names: Series,
    pub roll_numbers: Series,
    pub co_data: BTreeMap<CoLabel, Series>,
    pub total_marks: Series,
}

impl NormalizedSheetData {
    /// Students on the sheet, taken from the longest series.
    pub fn student_count(&self) -> usize {
        std::iter::once(&self.student_names)
            .chain(std::iter::once(&self.roll_numbers))
            .chain(std::iter::once(&self.total_marks))
            .chain(self.co_data.values())
            .map(Series::student_count)
            .max()
            .unwrap_or(0)
    }
}

/// Discrete 0-3 attainment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(into = "u8")]
pub enum AttainmentLevel {
    #[default]
    Unattained = 0,
    Low = 1,
    Moderate = 2,
    High = 3,
}

impl AttainmentLevel {
    /// Partition of a percentage:
    /// `>= 80` -> 3, `(40, 80)` -> 2, `(0, 40]` -> 1, anything else -> 0.
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 80.0 {
            AttainmentLevel::High
        } else if pct > 40.0 {
            AttainmentLevel::Moderate
        } else if pct > 0.0 {
            AttainmentLevel::Low
        } else {
            AttainmentLevel::Unattained
        }
    }

    pub fn value(self) -> u8 {
        self as u8
    }

    pub fn as_f64(self) -> f64 {
        self.value() as f64
    }
}

impl From<AttainmentLevel> for u8 {
    fn from(level: AttainmentLevel) -> Self {
        level.value()
    }
}

impl fmt::Display for AttainmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Percentage of maximum marks a student must reach to count as attaining.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Threshold(pub f64);

impl Threshold {
    pub const DEFAULT_PERCENT: f64 = 50.0;

    pub fn percent(self) -> f64 {
        self.0
    }

    pub fn marks_for(self, out_of: f64) -> f64 {
        out_of * (self.0 / 100.0)
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Threshold(Self::DEFAULT_PERCENT)
    }
}

/// A cell of a report table. Numbers keep full precision and are rounded to
/// two decimals only when rendered.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportCell {
    Text(String),
    Number(f64),
    Integer(i64),
    Blank,
}

impl ReportCell {
    pub fn text(s: impl Into<String>) -> Self {
        ReportCell::Text(s.into())
    }
}

impl fmt::Display for ReportCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportCell::Text(s) => f.write_str(s),
            ReportCell::Number(v) => f.write_str(&format_number(*v, 2)),
            ReportCell::Integer(v) => write!(f, "{}", v),
            ReportCell::Blank => Ok(()),
        }
    }
}

impl From<&CellValue> for ReportCell {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Number(v) => ReportCell::Number(*v),
            CellValue::Text(s) if !s.trim().is_empty() => ReportCell::Text(s.clone()),
            _ => ReportCell::Blank,
        }
    }
}

/// A titled, row-oriented table ready for the export collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportTable {
    pub title: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<ReportCell>>,
}

impl ReportTable {
    pub fn new(title: impl Into<String>, header: Vec<String>) -> Self {
        Self {
            title: title.into(),
            header,
            rows: Vec::new(),
        }
    }

    /// Rows rendered to display strings.
    pub fn string_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(ReportCell::to_string).collect())
            .collect()
    }
}

#[derive(Debug, Serialize, Tabled, Clone, PartialEq)]
pub struct CoSummaryRow {
    #[serde(rename = "CO")]
    #[tabled(rename = "CO")]
    pub co: String,
    #[serde(rename = "AttainmentLevel")]
    #[tabled(rename = "AttainmentLevel")]
    pub attainment_level: String,
    #[serde(rename = "IndirectAttainment")]
    #[tabled(rename = "IndirectAttainment")]
    pub indirect_attainment: String,
    #[serde(rename = "OverallAttainment")]
    #[tabled(rename = "OverallAttainment")]
    pub overall_attainment: String,
    #[serde(rename = "OverallPct")]
    #[tabled(rename = "OverallPct")]
    pub overall_percentage: String,
    #[serde(rename = "TargetPct")]
    #[tabled(rename = "TargetPct")]
    pub target_percentage: String,
    #[serde(rename = "TargetMet")]
    #[tabled(rename = "TargetMet")]
    pub target_met: String,
}

/// Every table the export collaborator renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTables {
    /// Raw marks per uploaded sheet.
    pub sheet_data: Vec<ReportTable>,
    /// Threshold comparison per uploaded sheet.
    pub sheet_attainment: Vec<ReportTable>,
    /// Pooled level per CO and component.
    pub component_levels: ReportTable,
    /// Statements, weights, levels and the overall blend per CO.
    pub co_analysis: ReportTable,
    pub co_summary: Vec<CoSummaryRow>,
    pub copo_mapping: ReportTable,
    pub copo_attainment: ReportTable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeSummary {
    pub co: CoLabel,
    pub attainment_level: f64,
    pub overall_attainment: f64,
    pub overall_percentage: f64,
    pub target_met: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub course_name: String,
    pub academic_year: String,
    pub threshold: f64,
    pub aggregation: String,
    pub total_students: usize,
    pub outcomes: Vec<OutcomeSummary>,
    /// `None` serialises as `null`: no CO contributes to that PO.
    pub po_attainment: BTreeMap<PoLabel, Option<f64>>,
    pub generated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn co_labels_are_found_in_headers() {
        assert_eq!(CoLabel::find_in("Total of CO1"), Some(CoLabel(1)));
        assert_eq!(CoLabel::find_in("co 12"), Some(CoLabel(12)));
        assert_eq!(CoLabel::find_in("Q3 (CO-4)"), Some(CoLabel(4)));
        assert_eq!(CoLabel::find_in("Comments"), None);
        assert_eq!(CoLabel::find_in("Course code CO5"), Some(CoLabel(5)));
    }

    #[test]
    fn po_labels_cover_fixed_set() {
        assert_eq!(PoLabel::ALL.len(), 15);
        for (i, po) in PoLabel::ALL.iter().enumerate() {
            assert_eq!(po.index(), i);
            assert_eq!(po.to_string().parse::<PoLabel>(), Ok(*po));
        }
        assert!("PO13".parse::<PoLabel>().is_err());
        assert!("PSO4".parse::<PoLabel>().is_err());
        assert_eq!("pso2".parse::<PoLabel>(), Ok(PoLabel::Pso(2)));
    }

    #[test]
    fn level_partition_is_complete() {
        let mut pct = 0.0;
        while pct <= 100.0 {
            let level = AttainmentLevel::from_percentage(pct);
            let expected = if pct >= 80.0 {
                3
            } else if pct > 40.0 {
                2
            } else if pct > 0.0 {
                1
            } else {
                0
            };
            assert_eq!(level.value(), expected, "pct {pct}");
            pct += 0.25;
        }
        assert_eq!(AttainmentLevel::from_percentage(40.0), AttainmentLevel::Low);
        assert_eq!(AttainmentLevel::from_percentage(80.0), AttainmentLevel::High);
        assert_eq!(AttainmentLevel::from_percentage(f64::NAN), AttainmentLevel::Unattained);
    }

    #[test]
    fn series_reserves_index_zero_for_out_of() {
        let s = Series(vec![20.0.into(), 12.0.into(), "AB".into()]);
        assert_eq!(s.out_of(), Some(20.0));
        assert_eq!(s.student_count(), 2);
        assert_eq!(s.students()[1].to_f64_lossy(), 0.0);
        assert_eq!(Series::default().student_count(), 0);
    }

    #[test]
    fn cells_deserialize_untagged() {
        let cells: Vec<CellValue> = serde_json::from_str(r#"[1.5, "x", null]"#).unwrap();
        assert_eq!(
            cells,
            vec![CellValue::Number(1.5), CellValue::text("x"), CellValue::Empty]
        );
    }
}
