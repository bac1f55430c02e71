// The computation pipeline.
//
// normalize -> evaluate per sheet -> pool per component -> aggregate per CO
// -> propagate to POs. Every stage is a pure function; `compute` threads one
// immutable input through all of them and returns the full derived snapshot.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{aggregate_co, AggregationPolicy, CoAggregate};
use crate::attainment::{evaluate_sheet, pool_component, ComponentAttainment};
use crate::copo::{propagate, CoPoMapping, CoPoResult};
use crate::normalize::{normalize, normalize_sheet};
use crate::types::{AttainmentLevel, CoLabel, NormalizedSheetData, RawSheet, SheetBag, Threshold};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseDetails {
    pub branch_name: String,
    pub course_name: String,
    pub class_name: String,
    pub semester: String,
    pub academic_year: String,
}

/// Indirect (survey) attainment: one course-wide score with optional per-CO
/// overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectScores {
    pub default: f64,
    pub per_co: BTreeMap<CoLabel, f64>,
}

impl IndirectScores {
    pub fn uniform(score: f64) -> Self {
        Self {
            default: score,
            per_co: BTreeMap::new(),
        }
    }

    pub fn for_co(&self, co: CoLabel) -> f64 {
        self.per_co.get(&co).copied().unwrap_or(self.default)
    }
}

/// The caller-owned, user-editable settings read once per computation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputationContext {
    pub threshold: Threshold,
    /// Percent weight per component, aligned with `ComputationInput::components`.
    pub weights: Vec<f64>,
    pub policy: AggregationPolicy,
    pub indirect: IndirectScores,
    pub mapping: CoPoMapping,
}

/// A sheet as handed over by the parsing collaborator, in either shape.
#[derive(Debug, Clone)]
pub enum SheetInput {
    Rows(RawSheet),
    Columns(SheetBag),
}

impl SheetInput {
    pub fn normalize(&self) -> NormalizedSheetData {
        match self {
            SheetInput::Rows(raw) => normalize_sheet(raw),
            SheetInput::Columns(bag) => normalize(bag),
        }
    }
}

/// One assessment component (quiz, mid term, ...) and the sheets uploaded for it.
#[derive(Debug, Clone)]
pub struct ComponentInput {
    pub name: String,
    pub sheets: Vec<SheetInput>,
}

#[derive(Debug, Clone, Default)]
pub struct ComputationInput {
    pub course: CourseDetails,
    pub components: Vec<ComponentInput>,
    /// Statement of `CO{i+1}` at index `i`.
    pub co_statements: Vec<String>,
    pub context: ComputationContext,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoOutcome {
    pub co: CoLabel,
    pub statement: String,
    /// Level per component, aligned with `AttainmentSnapshot::components`.
    pub component_levels: Vec<AttainmentLevel>,
    #[serde(flatten)]
    pub aggregate: CoAggregate,
    /// Overall percentage reaches the threshold percentage.
    pub target_met: bool,
}

/// Everything derived in one pass. Report tables are built from this alone.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentSnapshot {
    pub course: CourseDetails,
    pub context: ComputationContext,
    /// Normalized sheets per component, aligned with `components`.
    pub normalized: Vec<Vec<NormalizedSheetData>>,
    pub components: Vec<ComponentAttainment>,
    pub outcomes: Vec<CoOutcome>,
    pub copo: CoPoResult,
}

impl AttainmentSnapshot {
    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn weight(&self, component: usize) -> f64 {
        self.context.weights.get(component).copied().unwrap_or(0.0)
    }

    pub fn outcome(&self, co: CoLabel) -> Option<&CoOutcome> {
        self.outcomes.iter().find(|o| o.co == co)
    }
}

/// Run the whole pipeline. Pure: the same input always yields the same snapshot.
pub fn compute(input: &ComputationInput) -> AttainmentSnapshot {
    let ctx = &input.context;

    let normalized: Vec<Vec<NormalizedSheetData>> = input
        .components
        .iter()
        .map(|c| c.sheets.iter().map(SheetInput::normalize).collect())
        .collect();

    let components: Vec<ComponentAttainment> = input
        .components
        .iter()
        .zip(&normalized)
        .map(|(component, sheets)| {
            let evaluated = sheets
                .iter()
                .map(|s| evaluate_sheet(s, ctx.threshold))
                .collect();
            pool_component(&component.name, evaluated)
        })
        .collect();

    let outcomes: Vec<CoOutcome> = course_outcomes(input, &components)
        .into_iter()
        .map(|co| {
            let component_levels: Vec<AttainmentLevel> =
                components.iter().map(|c| c.level(co)).collect();
            let aggregate = aggregate_co(
                &component_levels,
                &ctx.weights,
                ctx.indirect.for_co(co),
                ctx.policy,
            );
            CoOutcome {
                co,
                statement: statement_for(&input.co_statements, co),
                component_levels,
                target_met: aggregate.overall_percentage >= ctx.threshold.percent(),
                aggregate,
            }
        })
        .collect();

    let overall: Vec<(CoLabel, f64)> = outcomes
        .iter()
        .map(|o| (o.co, o.aggregate.overall_attainment))
        .collect();
    let copo = propagate(&overall, &ctx.mapping);

    tracing::info!(
        components = components.len(),
        cos = outcomes.len(),
        threshold = ctx.threshold.percent(),
        policy = %ctx.policy,
        "attainment computed"
    );

    AttainmentSnapshot {
        course: input.course.clone(),
        context: ctx.clone(),
        normalized,
        components,
        outcomes,
        copo,
    }
}

/// CO1..COn from the statements, plus any CO that showed up in the data.
fn course_outcomes(input: &ComputationInput, components: &[ComponentAttainment]) -> Vec<CoLabel> {
    let mut cos: BTreeSet<CoLabel> = (1..=input.co_statements.len() as u32).map(CoLabel).collect();
    for component in components {
        cos.extend(component.per_co.keys().copied());
    }
    cos.into_iter().collect()
}

fn statement_for(statements: &[String], co: CoLabel) -> String {
    (co.0 as usize)
        .checked_sub(1)
        .and_then(|i| statements.get(i))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn bag(name: &str, cols: Vec<(&str, Vec<f64>)>) -> SheetInput {
        SheetInput::Columns(SheetBag::from_entries(
            name,
            cols.into_iter()
                .map(|(k, v)| (k, v.into_iter().map(CellValue::Number).collect())),
        ))
    }

    #[test]
    fn statements_define_the_co_set() {
        let input = ComputationInput {
            co_statements: vec!["Explain".into(), "Apply".into()],
            components: vec![ComponentInput {
                name: "Quiz".into(),
                sheets: vec![bag("A", vec![("Total of CO3", vec![10.0, 9.0])])],
            }],
            context: ComputationContext {
                weights: vec![100.0],
                ..Default::default()
            },
            ..Default::default()
        };
        let snap = compute(&input);
        let cos: Vec<CoLabel> = snap.outcomes.iter().map(|o| o.co).collect();
        assert_eq!(cos, vec![CoLabel(1), CoLabel(2), CoLabel(3)]);
        assert_eq!(snap.outcome(CoLabel(2)).unwrap().statement, "Apply");
        assert_eq!(snap.outcome(CoLabel(3)).unwrap().statement, "");
        assert_eq!(snap.outcome(CoLabel(1)).unwrap().aggregate.attainment_level, 0.0);
        assert_eq!(snap.outcome(CoLabel(3)).unwrap().component_levels, vec![AttainmentLevel::High]);
    }

    #[test]
    fn indirect_override_applies_per_co() {
        let mut indirect = IndirectScores::uniform(2.0);
        indirect.per_co.insert(CoLabel(1), 3.0);
        assert_eq!(indirect.for_co(CoLabel(1)), 3.0);
        assert_eq!(indirect.for_co(CoLabel(2)), 2.0);
    }

    #[test]
    fn target_met_compares_against_threshold() {
        let input = ComputationInput {
            components: vec![ComponentInput {
                name: "Exam".into(),
                sheets: vec![bag("A", vec![("CO1", vec![10.0, 9.0, 8.0])])],
            }],
            context: ComputationContext {
                threshold: Threshold(50.0),
                weights: vec![100.0],
                indirect: IndirectScores::uniform(3.0),
                ..Default::default()
            },
            ..Default::default()
        };
        let snap = compute(&input);
        let o = snap.outcome(CoLabel(1)).unwrap();
        assert!((o.aggregate.overall_attainment - 3.0).abs() < 1e-12);
        assert!(o.target_met);
    }
}
