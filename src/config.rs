// Course configuration: what the course form collects, read from a JSON file.
//
// The engine never validates its inputs. The rules the course form enforces
// (unique component names, weights summing to 100, ...) live here instead and
// are reported as a list of issues rather than a hard error.
use anyhow::Context;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::aggregate::{AggregationPolicy, MAX_LEVEL};
use crate::copo::{CoPoMapping, MAX_STRENGTH};
use crate::engine::{ComputationContext, CourseDetails, IndirectScores};
use crate::types::{CoLabel, PoLabel, Threshold};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentConfig {
    pub name: String,
    pub weight: f64,
    /// Spreadsheets for this component, relative to the config file.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseConfig {
    #[serde(flatten)]
    pub course: CourseDetails,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    #[serde(default)]
    pub co_statements: Vec<String>,
    #[serde(default)]
    pub indirect_attainment: f64,
    #[serde(default)]
    pub indirect_overrides: BTreeMap<String, f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub aggregation: AggregationPolicy,
    /// `{ "CO1": { "PO2": 3 } }`
    #[serde(default)]
    pub co_po_mapping: BTreeMap<String, BTreeMap<String, i64>>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_threshold() -> f64 {
    Threshold::DEFAULT_PERCENT
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigIssue {
    #[error("no assessment components configured")]
    NoComponents,
    #[error("duplicate component name `{0}`")]
    DuplicateComponent(String),
    #[error("component `{component}` weight {weight} must be between 0 and 100")]
    WeightOutOfRange { component: String, weight: f64 },
    #[error("component `{component}` weight {weight} has more than 2 decimals")]
    WeightPrecision { component: String, weight: f64 },
    #[error("component weights add up to {0}, expected 100")]
    WeightTotal(f64),
    #[error("indirect attainment {0} must be between 0 and 3")]
    IndirectOutOfRange(f64),
    #[error("threshold {0}% must be between 0 and 100")]
    ThresholdOutOfRange(f64),
    #[error("statement for {0} is empty")]
    EmptyStatement(CoLabel),
    #[error("unknown label `{0}` in CO-PO mapping")]
    UnknownLabel(String),
    #[error("mapping {co}->{po} value {value} must be between 0 and 3")]
    MappingOutOfRange { co: String, po: String, value: i64 },
}

impl CourseConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: CourseConfig = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(config)
    }

    pub fn files_for(&self, component: &ComponentConfig) -> Vec<PathBuf> {
        component
            .files
            .iter()
            .map(|f| if f.is_absolute() { f.clone() } else { self.base_dir.join(f) })
            .collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.components.iter().map(|c| c.weight).collect()
    }

    /// Build the computation context. Unknown labels are skipped and mapping
    /// values are clamped into 0..=3.
    pub fn context(&self) -> ComputationContext {
        let mut mapping = CoPoMapping::new();
        for (co_key, row) in &self.co_po_mapping {
            let Ok(co) = co_key.parse::<CoLabel>() else {
                tracing::warn!(label = %co_key, "ignoring unknown CO in mapping");
                continue;
            };
            for (po_key, value) in row {
                let Ok(po) = po_key.parse::<PoLabel>() else {
                    tracing::warn!(label = %po_key, "ignoring unknown PO in mapping");
                    continue;
                };
                mapping.set(co, po, (*value).clamp(0, MAX_STRENGTH as i64) as u8);
            }
        }

        let mut indirect = IndirectScores::uniform(self.indirect_attainment);
        for (co_key, score) in &self.indirect_overrides {
            match co_key.parse::<CoLabel>() {
                Ok(co) => {
                    indirect.per_co.insert(co, *score);
                }
                Err(_) => {
                    tracing::warn!(label = %co_key, "ignoring unknown CO in indirect overrides")
                }
            }
        }

        ComputationContext {
            threshold: Threshold(self.threshold),
            weights: self.weights(),
            policy: self.aggregation,
            indirect,
            mapping,
        }
    }

    /// Check the course form's rules. An empty list means the config is valid.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.components.is_empty() {
            issues.push(ConfigIssue::NoComponents);
        }

        let mut seen = std::collections::HashSet::new();
        let mut total = 0.0;
        for c in &self.components {
            if !seen.insert(c.name.trim().to_lowercase()) {
                issues.push(ConfigIssue::DuplicateComponent(c.name.clone()));
            }
            if !(0.0..=100.0).contains(&c.weight) {
                issues.push(ConfigIssue::WeightOutOfRange {
                    component: c.name.clone(),
                    weight: c.weight,
                });
                continue;
            }
            let cents = c.weight * 100.0;
            if (cents - cents.round()).abs() > 1e-6 {
                issues.push(ConfigIssue::WeightPrecision {
                    component: c.name.clone(),
                    weight: c.weight,
                });
                continue;
            }
            total += c.weight;
        }
        if !self.components.is_empty() && (total - 100.0).abs() > 0.01 {
            issues.push(ConfigIssue::WeightTotal(total));
        }

        let indirect_scores = std::iter::once(self.indirect_attainment)
            .chain(self.indirect_overrides.values().copied());
        for score in indirect_scores {
            if !(0.0..=MAX_LEVEL).contains(&score) {
                issues.push(ConfigIssue::IndirectOutOfRange(score));
            }
        }
        if !(0.0..=100.0).contains(&self.threshold) {
            issues.push(ConfigIssue::ThresholdOutOfRange(self.threshold));
        }
        for (i, statement) in self.co_statements.iter().enumerate() {
            if statement.trim().is_empty() {
                issues.push(ConfigIssue::EmptyStatement(CoLabel(i as u32 + 1)));
            }
        }

        for (co_key, row) in &self.co_po_mapping {
            if co_key.parse::<CoLabel>().is_err() {
                issues.push(ConfigIssue::UnknownLabel(co_key.clone()));
            }
            for (po_key, value) in row {
                if po_key.parse::<PoLabel>().is_err() {
                    issues.push(ConfigIssue::UnknownLabel(po_key.clone()));
                }
                if !(0..=MAX_STRENGTH as i64).contains(value) {
                    issues.push(ConfigIssue::MappingOutOfRange {
                        co: co_key.clone(),
                        po: po_key.clone(),
                        value: *value,
                    });
                }
            }
        }
        issues
    }
}
