// CO -> PO propagation.
//
// Each CO's overall attainment is scaled by the strength of its mapping to
// every program outcome; PO attainment is the mean of the nonzero cells.
use serde::Serialize;
use std::collections::BTreeMap;

use crate::aggregate::MAX_LEVEL;
use crate::types::{CoLabel, PoLabel};

/// Strongest CO-PO correlation.
pub const MAX_STRENGTH: u8 = 3;
pub const PO_COUNT: usize = PoLabel::ALL.len();

/// Sparse, user-edited CO x PO correlation strengths (0-3). Unset pairs are 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CoPoMapping(BTreeMap<CoLabel, BTreeMap<PoLabel, u8>>);

impl CoPoMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, co: CoLabel, po: PoLabel) -> u8 {
        self.0
            .get(&co)
            .and_then(|row| row.get(&po))
            .copied()
            .unwrap_or(0)
    }

    /// Values above 3 are stored as 3; setting 0 clears the pair.
    pub fn set(&mut self, co: CoLabel, po: PoLabel, strength: u8) {
        let strength = strength.min(MAX_STRENGTH);
        if strength == 0 {
            if let Some(row) = self.0.get_mut(&co) {
                row.remove(&po);
                if row.is_empty() {
                    self.0.remove(&co);
                }
            }
            return;
        }
        self.0.entry(co).or_default().insert(po, strength);
    }

    pub fn row(&self, co: CoLabel) -> [u8; PO_COUNT] {
        let mut out = [0u8; PO_COUNT];
        for (i, po) in PoLabel::ALL.iter().enumerate() {
            out[i] = self.get(co, *po);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// COs that have at least one nonzero mapping.
    pub fn cos(&self) -> impl Iterator<Item = CoLabel> + '_ {
        self.0.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoPoRow {
    pub co: CoLabel,
    pub overall_attainment: f64,
    /// One cell per label in [`PoLabel::ALL`] order.
    pub cells: [f64; PO_COUNT],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoPoResult {
    pub rows: Vec<CoPoRow>,
    /// `None` when no CO contributes a nonzero cell to that PO. That state is
    /// distinct from an average of 0.
    pub po_averages: [Option<f64>; PO_COUNT],
}

impl CoPoResult {
    pub fn average(&self, po: PoLabel) -> Option<f64> {
        self.po_averages.get(po.index()).copied().flatten()
    }
}

/// `cell = overall / 3 * strength`; PO averages take only cells > 0.
pub fn propagate(co_overall: &[(CoLabel, f64)], mapping: &CoPoMapping) -> CoPoResult {
    let rows: Vec<CoPoRow> = co_overall
        .iter()
        .map(|(co, overall)| {
            let strengths = mapping.row(*co);
            let mut cells = [0.0; PO_COUNT];
            for (cell, strength) in cells.iter_mut().zip(strengths) {
                *cell = (overall / MAX_LEVEL) * strength as f64;
            }
            CoPoRow {
                co: *co,
                overall_attainment: *overall,
                cells,
            }
        })
        .collect();

    let mut po_averages = [None; PO_COUNT];
    for (i, avg) in po_averages.iter_mut().enumerate() {
        let contributing: Vec<f64> = rows
            .iter()
            .map(|r| r.cells[i])
            .filter(|c| *c > 0.0)
            .collect();
        if !contributing.is_empty() {
            *avg = Some(crate::util::average(&contributing));
        }
    }

    for co in mapping.cos() {
        if !co_overall.iter().any(|(c, _)| *c == co) {
            tracing::warn!(co = %co, "mapping references a CO with no attainment data");
        }
    }

    CoPoResult { rows, po_averages }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_scales_overall_by_strength() {
        let mut mapping = CoPoMapping::new();
        mapping.set(CoLabel(1), PoLabel::Po(2), 3);
        let result = propagate(&[(CoLabel(1), 2.5)], &mapping);
        let row = &result.rows[0];
        assert!((row.cells[PoLabel::Po(2).index()] - 2.5).abs() < 1e-12);
        assert_eq!(row.cells[PoLabel::Po(1).index()], 0.0);
        assert_eq!(result.average(PoLabel::Po(1)), None);
        assert!((result.average(PoLabel::Po(2)).unwrap() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn zero_cells_are_left_out_of_averages() {
        let mut mapping = CoPoMapping::new();
        mapping.set(CoLabel(1), PoLabel::Po(1), 3);
        mapping.set(CoLabel(2), PoLabel::Po(1), 1);
        mapping.set(CoLabel(3), PoLabel::Pso(1), 2);
        let result = propagate(
            &[(CoLabel(1), 2.4), (CoLabel(2), 1.5), (CoLabel(3), 0.0)],
            &mapping,
        );
        // (2.4 + 0.5) / 2; CO3 maps nothing to PO1.
        assert!((result.average(PoLabel::Po(1)).unwrap() - 1.45).abs() < 1e-12);
        // CO3's only mapping yields a zero cell since its attainment is 0.
        assert_eq!(result.average(PoLabel::Pso(1)), None);
    }

    #[test]
    fn set_clamps_and_clears() {
        let mut mapping = CoPoMapping::new();
        mapping.set(CoLabel(1), PoLabel::Pso(3), 9);
        assert_eq!(mapping.get(CoLabel(1), PoLabel::Pso(3)), 3);
        mapping.set(CoLabel(1), PoLabel::Pso(3), 0);
        assert!(mapping.is_empty());
        assert_eq!(mapping.get(CoLabel(4), PoLabel::Po(7)), 0);
    }

    #[test]
    fn empty_inputs_are_total() {
        let result = propagate(&[], &CoPoMapping::new());
        assert!(result.rows.is_empty());
        assert!(result.po_averages.iter().all(Option::is_none));
    }
}
