// Component aggregator.
//
// Folds the per-component levels of one CO into a single attainment level and
// blends it with the indirect (survey) score.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::AttainmentLevel;
use crate::util::finite_or_zero;

/// Share of the overall score taken from direct (marks-based) assessment.
pub const DIRECT_SHARE: f64 = 0.8;
/// Share of the overall score taken from the indirect assessment.
pub const INDIRECT_SHARE: f64 = 0.2;
/// Highest attainment level; converts scores to percentages.
pub const MAX_LEVEL: f64 = 3.0;

/// How component levels are folded into one CO level. Both variants ignore
/// components whose level is 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// `sum(level * weight) / sum(weight)`, weights given in percent.
    #[default]
    Weighted,
    /// Plain mean of the nonzero levels.
    Unweighted,
}

impl AggregationPolicy {
    /// Missing weights count as 0. Weights are scaled by 1/100 but never
    /// re-normalised across components.
    pub fn attainment_level(self, levels: &[AttainmentLevel], weights: &[f64]) -> f64 {
        let nonzero = levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level > AttainmentLevel::Unattained);
        match self {
            AggregationPolicy::Weighted => {
                let (num, den) = nonzero.fold((0.0, 0.0), |(num, den), (i, level)| {
                    let w = finite_or_zero(weights.get(i).copied().unwrap_or(0.0)) / 100.0;
                    (num + level.as_f64() * w, den + w)
                });
                if den == 0.0 {
                    0.0
                } else {
                    finite_or_zero(num / den)
                }
            }
            AggregationPolicy::Unweighted => {
                let picked: Vec<f64> = nonzero.map(|(_, level)| level.as_f64()).collect();
                crate::util::average(&picked)
            }
        }
    }
}

impl fmt::Display for AggregationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationPolicy::Weighted => f.write_str("weighted"),
            AggregationPolicy::Unweighted => f.write_str("unweighted"),
        }
    }
}

impl FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "weighted" => Ok(AggregationPolicy::Weighted),
            "unweighted" => Ok(AggregationPolicy::Unweighted),
            other => Err(format!(
                "unknown aggregation policy {other:?} (expected weighted or unweighted)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoAggregate {
    /// Folded direct level, 0-3 and possibly fractional.
    pub attainment_level: f64,
    pub indirect_score: f64,
    /// `0.8 * attainment_level + 0.2 * indirect_score`.
    pub overall_attainment: f64,
    pub overall_percentage: f64,
}

/// Aggregate one CO. Inputs are not range-checked: out-of-range values pass
/// through unchanged and only NaN/infinite inputs are zeroed.
pub fn aggregate_co(
    component_levels: &[AttainmentLevel],
    weights: &[f64],
    indirect_score: f64,
    policy: AggregationPolicy,
) -> CoAggregate {
    let attainment_level = policy.attainment_level(component_levels, weights);
    let indirect_score = finite_or_zero(indirect_score);
    let overall_attainment = blend(attainment_level, indirect_score);
    CoAggregate {
        attainment_level,
        indirect_score,
        overall_attainment,
        overall_percentage: (overall_attainment / MAX_LEVEL) * 100.0,
    }
}

pub fn blend(direct_level: f64, indirect_score: f64) -> f64 {
    DIRECT_SHARE * direct_level + INDIRECT_SHARE * indirect_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use AttainmentLevel::*;

    #[test]
    fn weighted_mean_skips_zero_levels() {
        let level = AggregationPolicy::Weighted
            .attainment_level(&[High, Moderate, Unattained], &[50.0, 30.0, 20.0]);
        assert!((level - 2.625).abs() < 1e-12);
    }

    #[test]
    fn unweighted_mean_ignores_weights() {
        let level = AggregationPolicy::Unweighted
            .attainment_level(&[High, Low, Unattained], &[90.0, 10.0, 0.0]);
        assert!((level - 2.0).abs() < 1e-12);
    }

    #[test]
    fn all_zero_levels_give_zero() {
        for policy in [AggregationPolicy::Weighted, AggregationPolicy::Unweighted] {
            assert_eq!(policy.attainment_level(&[Unattained, Unattained], &[50.0, 50.0]), 0.0);
            assert_eq!(policy.attainment_level(&[], &[]), 0.0);
        }
    }

    #[test]
    fn missing_or_zero_weights_do_not_divide_by_zero() {
        let level = AggregationPolicy::Weighted.attainment_level(&[High, Moderate], &[0.0]);
        assert_eq!(level, 0.0);
        let level = AggregationPolicy::Weighted.attainment_level(&[High, Moderate], &[40.0]);
        assert!((level - 3.0).abs() < 1e-12);
    }

    #[test]
    fn weights_are_not_renormalised() {
        // 3 * 0.6 + 1 * 0.6 over 1.2: scale-free within the nonzero set.
        let level = AggregationPolicy::Weighted.attainment_level(&[High, Low], &[60.0, 60.0]);
        assert!((level - 2.0).abs() < 1e-12);
    }

    #[test]
    fn blend_is_eighty_twenty() {
        let agg = aggregate_co(
            &[High, Moderate, Unattained],
            &[50.0, 30.0, 20.0],
            2.0,
            AggregationPolicy::Weighted,
        );
        assert!((agg.attainment_level - 2.625).abs() < 1e-12);
        assert!((agg.overall_attainment - 2.5).abs() < 1e-12);
        assert!((agg.overall_percentage - 83.333_333_333).abs() < 1e-6);
    }

    #[test]
    fn non_finite_indirect_is_zeroed() {
        let agg = aggregate_co(&[High], &[100.0], f64::NAN, AggregationPolicy::Weighted);
        assert!((agg.overall_attainment - 2.4).abs() < 1e-12);
    }

    #[test]
    fn policy_parses_from_text() {
        assert_eq!("Weighted".parse(), Ok(AggregationPolicy::Weighted));
        assert_eq!(" unweighted ".parse(), Ok(AggregationPolicy::Unweighted));
        assert!("median".parse::<AggregationPolicy>().is_err());
    }
}
