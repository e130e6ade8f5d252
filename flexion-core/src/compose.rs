//! Score composition
//!
//! Merges a motion's base targets with the resolved deltas of every selected
//! axis row into one [`ScoreTree`], then aggregates totals.
//!
//! # Algorithm
//! 1. Build the working tree from the base targets
//! 2. For each selected row: resolve the motion's effective deltas along its
//!    ancestry and drop non-scorable muscles
//! 3. Per muscle, sum the collected deltas in ascending value order and add the
//!    sum to the muscle's explicit score (materialising the path when needed)
//! 4. Aggregate totals over the final tree
//!
//! Step 3 fixes the floating-point summation order, so the order of selections
//! does not change the result, bit for bit. No state survives a call.

use crate::config::EngineConfig;
use crate::delta_rules::{ModifierAxisTable, ModifierRow};
use crate::hierarchy::{MotionHierarchy, MuscleHierarchy};
use crate::model::{finite_or_zero, AxisSelection, FlatScores, MotionId, MuscleId};
use crate::resolver::{InheritanceResolver, Resolution};
use crate::scorability::filter_scorable;
use crate::score_tree::{ScoreTotals, ScoreTree};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One selected axis row, borrowed from its table
#[derive(Debug, Clone, Copy)]
pub struct SelectedRow<'a> {
    pub axis_name: &'a str,
    /// `None` when the named axis does not exist
    pub table: Option<&'a ModifierAxisTable>,
    pub row_id: &'a str,
}

impl<'a> SelectedRow<'a> {
    pub fn new(table: &'a ModifierAxisTable, row_id: &'a str) -> Self {
        Self {
            axis_name: &table.name,
            table: Some(table),
            row_id,
        }
    }

    /// Selection naming an axis that is not in the catalog
    pub fn missing(axis_name: &'a str, row_id: &'a str) -> Self {
        Self {
            axis_name,
            table: None,
            row_id,
        }
    }

    fn selection(&self) -> AxisSelection {
        AxisSelection::new(self.axis_name, self.row_id)
    }

    fn row(&self) -> Option<&'a ModifierRow> {
        self.table?.row(self.row_id)
    }
}

/// What one selection contributed
#[derive(Debug, Clone, PartialEq)]
pub struct AxisResolution {
    pub selection: AxisSelection,
    /// `None` when the axis or row does not exist
    pub resolution: Option<Resolution>,
    /// Deltas actually added (scorable muscles only)
    pub applied: FlatScores,
}

/// Result of one composition call
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub motion_id: MotionId,
    /// Explicit scores after all deltas
    pub tree: ScoreTree,
    pub totals: ScoreTotals,
    /// One entry per selection, in selection order
    pub axes: Vec<AxisResolution>,
}

impl Composition {
    /// Flat export of the explicit scores
    pub fn flat(&self) -> FlatScores {
        self.tree.flatten()
    }

    pub fn total_of(&self, muscle_id: &str) -> Option<f64> {
        self.totals.total_of(muscle_id)
    }
}

/// Composes base targets and axis deltas into final scores
#[derive(Debug, Clone)]
pub struct ScoreCompositionEngine<'a> {
    muscles: &'a MuscleHierarchy,
    motions: &'a MotionHierarchy,
    config: EngineConfig,
}

impl<'a> ScoreCompositionEngine<'a> {
    pub fn new(muscles: &'a MuscleHierarchy, motions: &'a MotionHierarchy) -> Self {
        Self {
            muscles,
            motions,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn resolver(&self) -> InheritanceResolver<'a> {
        InheritanceResolver::new(self.motions).with_absent_entry(self.config.absent_entry)
    }

    /// Resolve one row for a motion without composing
    pub fn resolve(&self, motion_id: &str, selected: SelectedRow<'_>) -> Option<Resolution> {
        let row = selected.row()?;
        Some(self.resolver().resolve(&row.rules, motion_id))
    }

    /// Compose final scores for `motion_id`
    ///
    /// Non-scorable muscles in `base_targets` are ignored.
    pub fn compose(
        &self,
        motion_id: &str,
        base_targets: &FlatScores,
        selections: &[SelectedRow<'_>],
    ) -> Composition {
        let base = filter_scorable(base_targets, self.muscles);
        let mut tree = ScoreTree::build_from_flat(&base, self.muscles);
        let resolver = self.resolver();
        let mut axes = Vec::with_capacity(selections.len());
        let mut pending: BTreeMap<MuscleId, Vec<f64>> = BTreeMap::new();

        for selected in selections {
            let Some(row) = selected.row() else {
                warn!(
                    motion_id = %motion_id,
                    axis = %selected.axis_name,
                    row = %selected.row_id,
                    "Unknown axis row, no contribution"
                );
                axes.push(AxisResolution {
                    selection: selected.selection(),
                    resolution: None,
                    applied: FlatScores::new(),
                });
                continue;
            };

            let resolution = resolver.resolve(&row.rules, motion_id);
            let applied = filter_scorable(&resolution.deltas, self.muscles);
            for (muscle_id, delta) in &applied {
                pending.entry(muscle_id.clone()).or_default().push(*delta);
            }

            debug!(
                motion_id = %motion_id,
                axis = %selected.axis_name,
                row = %selected.row_id,
                provenance = ?resolution.provenance,
                deltas = applied.len(),
                "Applied axis deltas"
            );
            axes.push(AxisResolution {
                selection: selected.selection(),
                resolution: Some(resolution),
                applied,
            });
        }

        // Float addition is not associative: sum each muscle's deltas in
        // value order so the result is independent of selection order
        for (muscle_id, mut deltas) in pending {
            deltas.sort_by(f64::total_cmp);
            let sum: f64 = deltas.into_iter().map(finite_or_zero).sum();
            if !tree.add_to(&muscle_id, sum, self.muscles) {
                debug!(muscle_id = %muscle_id, "Delta for unknown muscle dropped");
            }
        }

        let totals = tree.totals(self.config.total_precision);
        Composition {
            motion_id: motion_id.to_string(),
            tree,
            totals,
            axes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta_rules::DeltaRule;
    use crate::model::{MotionRecord, MuscleRecord};

    fn muscles() -> MuscleHierarchy {
        MuscleHierarchy::new(vec![
            MuscleRecord::new("chest", "Chest", None).non_scorable(),
            MuscleRecord::new("upper_chest", "Upper Chest", Some("chest")),
            MuscleRecord::new("lower_chest", "Lower Chest", Some("chest")),
            MuscleRecord::new("arms", "Arms", None),
            MuscleRecord::new("triceps", "Triceps", Some("arms")),
        ])
    }

    fn motions() -> MotionHierarchy {
        MotionHierarchy::new(vec![
            MotionRecord::new("bench", "Bench Press", None),
            MotionRecord::new("incline", "Incline Bench", Some("bench")),
        ])
    }

    fn axis(name: &str, row: &str, rules: Vec<(&str, DeltaRule)>, catalog: &MuscleHierarchy) -> ModifierAxisTable {
        let mut table = ModifierAxisTable::new(name);
        let mut r = ModifierRow::new(row, row);
        for (motion, rule) in rules {
            r.rules.set_rule(motion, rule, catalog).unwrap();
        }
        table.insert_row(r);
        table
    }

    fn flat(entries: &[(&str, f64)]) -> FlatScores {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_base_only() {
        let (m, mo) = (muscles(), motions());
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("upper_chest", 3.0), ("triceps", 1.0)]);
        let c = engine.compose("bench", &base, &[]);
        assert_eq!(c.flat(), base);
        assert_eq!(c.total_of("chest"), Some(3.0));
        assert_eq!(c.total_of("arms"), Some(1.0));
        assert!(c.axes.is_empty());
    }

    #[test]
    fn test_inherited_delta_applied_to_variation() {
        let (m, mo) = (muscles(), motions());
        let grip = axis(
            "grip",
            "close",
            vec![
                ("bench", DeltaRule::explicit([("triceps", 2.0), ("upper_chest", -1.0)])),
                ("incline", DeltaRule::Inherit),
            ],
            &m,
        );
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("upper_chest", 3.0), ("lower_chest", 1.0)]);
        let c = engine.compose("incline", &base, &[SelectedRow::new(&grip, "close")]);

        assert_eq!(
            c.flat(),
            flat(&[("lower_chest", 1.0), ("triceps", 2.0), ("upper_chest", 2.0)])
        );
        assert_eq!(c.total_of("chest"), Some(3.0));
        assert_eq!(c.total_of("arms"), Some(2.0));

        let resolution = c.axes[0].resolution.as_ref().unwrap();
        assert_eq!(resolution.provenance, vec!["incline", "bench"]);
    }

    #[test]
    fn test_stale_non_scorable_delta_never_contributes() {
        let (m, mo) = (muscles(), motions());
        // Bypass the write boundary to simulate stale stored data
        let mut raw = crate::delta_rules::DeltaRuleStore::new();
        raw.set_rule(
            "bench",
            DeltaRule::explicit([("chest", 10.0), ("upper_chest", 1.0)]),
            &std::collections::HashMap::<String, MuscleRecord>::new(),
        )
        .unwrap();
        let mut row = ModifierRow::new("flat", "Flat");
        row.rules = raw;
        let mut path = ModifierAxisTable::new("path");
        path.insert_row(row);

        let engine = ScoreCompositionEngine::new(&m, &mo);
        let c = engine.compose("bench", &FlatScores::new(), &[SelectedRow::new(&path, "flat")]);
        assert_eq!(c.tree.score_of("chest"), None);
        assert_eq!(c.total_of("chest"), Some(1.0));
        assert_eq!(c.axes[0].applied, flat(&[("upper_chest", 1.0)]));
    }

    #[test]
    fn test_axis_order_does_not_matter() {
        let (m, mo) = (muscles(), motions());
        let grip = axis(
            "grip",
            "close",
            vec![("bench", DeltaRule::explicit([("triceps", 1.5), ("upper_chest", 0.25)]))],
            &m,
        );
        let stance = axis(
            "stance",
            "arched",
            vec![("bench", DeltaRule::explicit([("lower_chest", 2.0), ("upper_chest", -0.5)]))],
            &m,
        );
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("upper_chest", 3.0)]);

        let ab = engine.compose(
            "bench",
            &base,
            &[SelectedRow::new(&grip, "close"), SelectedRow::new(&stance, "arched")],
        );
        let ba = engine.compose(
            "bench",
            &base,
            &[SelectedRow::new(&stance, "arched"), SelectedRow::new(&grip, "close")],
        );
        assert_eq!(ab.totals, ba.totals);
        assert_eq!(ab.flat(), ba.flat());
        assert_eq!(ab.total_of("chest"), Some(4.75));
    }

    #[test]
    fn test_shuffled_axis_order_is_bit_identical() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let (m, mo) = (muscles(), motions());
        let tables: Vec<ModifierAxisTable> = [0.1, 1.1, 0.7, 0.3, 2.9]
            .iter()
            .enumerate()
            .map(|(i, delta)| {
                axis(
                    &format!("axis{}", i),
                    "row",
                    vec![(
                        "bench",
                        DeltaRule::explicit([("upper_chest", *delta), ("triceps", delta / 3.0)]),
                    )],
                    &m,
                )
            })
            .collect();
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("upper_chest", 0.1), ("lower_chest", 0.2), ("triceps", 0.1)]);

        let mut rows: Vec<SelectedRow> = tables.iter().map(|t| SelectedRow::new(t, "row")).collect();
        let expected = engine.compose("bench", &base, &rows);

        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            rows.shuffle(&mut rng);
            let c = engine.compose("bench", &base, &rows);
            assert_eq!(c.totals, expected.totals);
            assert_eq!(c.flat(), expected.flat());
        }
    }

    #[test]
    fn test_two_axes_with_inexact_deltas() {
        let (m, mo) = (muscles(), motions());
        let a = axis("a", "row", vec![("bench", DeltaRule::explicit([("triceps", 0.1)]))], &m);
        let b = axis("b", "row", vec![("bench", DeltaRule::explicit([("triceps", 1.1)]))], &m);
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("triceps", 0.1)]);

        let ab = engine.compose("bench", &base, &[SelectedRow::new(&a, "row"), SelectedRow::new(&b, "row")]);
        let ba = engine.compose("bench", &base, &[SelectedRow::new(&b, "row"), SelectedRow::new(&a, "row")]);
        assert_eq!(ab.tree.score_of("triceps"), ba.tree.score_of("triceps"));
        assert_eq!(ab.flat(), ba.flat());
        assert_eq!(ab.totals, ba.totals);
    }

    #[test]
    fn test_non_scorable_base_target_ignored() {
        let (m, mo) = (muscles(), motions());
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let c = engine.compose("bench", &flat(&[("chest", 10.0), ("upper_chest", 1.0)]), &[]);
        assert_eq!(c.tree.score_of("chest"), None);
        assert_eq!(c.flat(), flat(&[("upper_chest", 1.0)]));
        assert_eq!(c.total_of("chest"), Some(1.0));
    }

    #[test]
    fn test_unknown_row_contributes_nothing() {
        let (m, mo) = (muscles(), motions());
        let grip = axis("grip", "close", vec![], &m);
        let engine = ScoreCompositionEngine::new(&m, &mo);
        let base = flat(&[("triceps", 1.0)]);
        let c = engine.compose(
            "bench",
            &base,
            &[
                SelectedRow::new(&grip, "missing"),
                SelectedRow::missing("tempo", "slow"),
            ],
        );
        assert_eq!(c.flat(), base);
        assert!(c.axes[0].resolution.is_none());
        assert_eq!(c.axes[1].selection, AxisSelection::new("tempo", "slow"));
        assert!(c.axes[1].resolution.is_none());
        assert!(engine.resolve("bench", SelectedRow::new(&grip, "missing")).is_none());
    }

    #[test]
    fn test_precision_from_config() {
        let (m, mo) = (muscles(), motions());
        let engine = ScoreCompositionEngine::new(&m, &mo).with_config(EngineConfig {
            total_precision: 0,
            ..EngineConfig::default()
        });
        let c = engine.compose("bench", &flat(&[("upper_chest", 1.2), ("lower_chest", 1.2)]), &[]);
        assert_eq!(c.total_of("chest"), Some(2.0));
        assert_eq!(c.total_of("upper_chest"), Some(1.2));
    }
}
