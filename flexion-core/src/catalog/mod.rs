//! Loaded catalog: indexes plus axis tables for one snapshot
//!
//! Building a [`Catalog`] is the write boundary for everything the engine
//! reads. Values that are not finite numbers and unknown sentinels are
//! rejected entry by entry (with a warning), and non-scorable muscles are
//! stripped from base targets and delta maps before storage.

pub mod source;
pub mod wire;

pub use source::*;
pub use wire::*;

use crate::compose::{Composition, ScoreCompositionEngine, SelectedRow};
use crate::config::EngineConfig;
use crate::delta_rules::{ModifierAxisTable, ModifierRow};
use crate::error::{Error, Result};
use crate::hierarchy::{MotionHierarchy, MuscleHierarchy};
use crate::model::{AxisSelection, FlatScores, MotionRecord};
use crate::resolver::Resolution;
use crate::scorability::filter_scorable;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Read-only, fully indexed catalog
#[derive(Debug, Clone)]
pub struct Catalog {
    muscles: MuscleHierarchy,
    motions: MotionHierarchy,
    axes: BTreeMap<String, ModifierAxisTable>,
    version: String,
    rejected: usize,
}

impl Catalog {
    /// Decode and index a snapshot
    pub fn from_snapshot(snapshot: &CatalogSnapshot) -> Self {
        let version = snapshot.fingerprint();
        let muscles = MuscleHierarchy::new(snapshot.muscles.iter().cloned());
        let mut rejected = 0;

        let motions = MotionHierarchy::new(snapshot.motions.iter().map(|entry| {
            let decoded = decode_flat_lossy(&entry.id, &entry.base_targets);
            rejected += entry.base_targets.len() - decoded.len();
            MotionRecord {
                id: entry.id.clone(),
                label: entry.label.clone(),
                parent_id: entry.parent_id.clone(),
                base_targets: filter_scorable(&decoded, &muscles),
            }
        }));

        let mut axes: BTreeMap<String, ModifierAxisTable> = BTreeMap::new();
        for axis_entry in &snapshot.axes {
            let table = axes
                .entry(axis_entry.name.clone())
                .or_insert_with(|| ModifierAxisTable::new(axis_entry.name.as_str()));

            for row_entry in &axis_entry.rows {
                let mut row = ModifierRow::new(row_entry.id.as_str(), row_entry.label.as_str());
                for (motion_id, wire_rule) in &row_entry.delta_rules {
                    let stored = wire_rule
                        .decode()
                        .and_then(|rule| row.rules.set_rule(motion_id, rule, &muscles));
                    if let Err(e) = stored {
                        warn!(
                            axis = %axis_entry.name,
                            row = %row_entry.id,
                            motion_id = %motion_id,
                            "Rejected delta rule: {}",
                            e
                        );
                        rejected += 1;
                    }
                }
                table.insert_row(row);
            }
        }

        info!(
            muscles = muscles.len(),
            motions = motions.len(),
            axes = axes.len(),
            rejected,
            version = %&version[..12],
            "Catalog loaded"
        );

        Self {
            muscles,
            motions,
            axes,
            version,
            rejected,
        }
    }

    /// Load through a [`CatalogSource`]
    pub fn load<S: CatalogSource + ?Sized>(source: &S) -> Result<Self> {
        Ok(Self::from_snapshot(&source.load_snapshot()?))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(Self::from_snapshot(&CatalogSnapshot::from_json_str(json)?))
    }

    pub fn muscles(&self) -> &MuscleHierarchy {
        &self.muscles
    }

    pub fn motions(&self) -> &MotionHierarchy {
        &self.motions
    }

    pub fn axis(&self, name: &str) -> Option<&ModifierAxisTable> {
        self.axes.get(name)
    }

    /// Axis tables in name order
    pub fn axes(&self) -> impl Iterator<Item = &ModifierAxisTable> {
        self.axes.values()
    }

    /// Content fingerprint of the snapshot this catalog was built from
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Entries dropped at load time (bad scores, bad rules)
    pub fn rejected_entries(&self) -> usize {
        self.rejected
    }

    pub fn engine(&self, config: &EngineConfig) -> ScoreCompositionEngine<'_> {
        ScoreCompositionEngine::new(&self.muscles, &self.motions).with_config(config.clone())
    }

    fn selected_rows<'a>(&'a self, selections: &'a [AxisSelection]) -> Vec<SelectedRow<'a>> {
        selections
            .iter()
            .map(|s| match self.axes.get(&s.axis) {
                Some(table) => SelectedRow::new(table, &s.row),
                None => SelectedRow::missing(&s.axis, &s.row),
            })
            .collect()
    }

    /// Effective deltas of one axis row for a motion
    ///
    /// `None` when the axis or row does not exist.
    pub fn resolve(
        &self,
        motion_id: &str,
        selection: &AxisSelection,
        config: &EngineConfig,
    ) -> Option<Resolution> {
        let rows = self.selected_rows(std::slice::from_ref(selection));
        rows.first()
            .and_then(|row| self.engine(config).resolve(motion_id, *row))
    }

    /// Compose a motion's stored base targets with the selected rows
    pub fn compose(
        &self,
        motion_id: &str,
        selections: &[AxisSelection],
        config: &EngineConfig,
    ) -> Result<Composition> {
        let motion = self
            .motions
            .get(motion_id)
            .ok_or_else(|| Error::NotFound(format!("motion '{}'", motion_id)))?;
        Ok(self.compose_with_base(motion_id, &motion.base_targets, selections, config))
    }

    /// Compose caller-supplied base targets with the selected rows
    pub fn compose_with_base(
        &self,
        motion_id: &str,
        base_targets: &FlatScores,
        selections: &[AxisSelection],
        config: &EngineConfig,
    ) -> Composition {
        let rows = self.selected_rows(selections);
        self.engine(config).compose(motion_id, base_targets, &rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta_rules::DeltaRule;

    const SNAPSHOT: &str = r#"{
        "muscles": [
            {"id": "legs", "label": "Legs", "parentIds": [], "isScorable": false},
            {"id": "quads", "label": "Quadriceps", "parentIds": ["legs"]},
            {"id": "glutes", "label": "Glutes", "parentIds": ["legs"]}
        ],
        "motions": [
            {"id": "squat", "label": "Squat", "baseTargets": {"quads": 3, "glutes": 2, "legs": 9}},
            {"id": "front_squat", "label": "Front Squat", "parentId": "squat",
             "baseTargets": {"quads": 4, "glutes": "lots"}}
        ],
        "axes": [
            {"name": "stance", "rows": [
                {"id": "wide", "label": "Wide", "deltaRules": {
                    "squat": {"glutes": 1.5, "quads": -0.5, "legs": 4},
                    "front_squat": "INHERIT"
                }},
                {"id": "narrow", "label": "Narrow", "deltaRules": {
                    "squat": "sometimes"
                }}
            ]}
        ]
    }"#;

    #[test]
    fn test_snapshot_decoding() {
        let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
        assert_eq!(catalog.muscles().len(), 3);
        assert_eq!(catalog.motions().len(), 2);
        assert_eq!(catalog.version().len(), 64);
        // "lots" base target and "sometimes" rule
        assert_eq!(catalog.rejected_entries(), 2);

        let squat = catalog.motions().get("squat").unwrap();
        assert!(!squat.base_targets.contains_key("legs"));

        let wide = catalog.axis("stance").unwrap().row("wide").unwrap();
        assert_eq!(
            wide.rules.rule("squat"),
            &DeltaRule::explicit([("glutes", 1.5), ("quads", -0.5)])
        );
        assert!(wide.rules.rule("front_squat").is_inherit());

        let narrow = catalog.axis("stance").unwrap().row("narrow").unwrap();
        assert!(narrow.rules.is_empty());
    }

    #[test]
    fn test_compose_variation_through_catalog() {
        let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
        let config = EngineConfig::default();
        let c = catalog
            .compose("front_squat", &[AxisSelection::new("stance", "wide")], &config)
            .unwrap();

        assert_eq!(c.total_of("quads"), Some(3.5));
        assert_eq!(c.total_of("glutes"), Some(1.5));
        assert_eq!(c.total_of("legs"), Some(5.0));
        let provenance = &c.axes[0].resolution.as_ref().unwrap().provenance;
        assert_eq!(provenance, &vec!["front_squat".to_string(), "squat".to_string()]);
    }

    #[test]
    fn test_compose_with_base_drops_non_scorable_targets() {
        let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
        let base: FlatScores = [("legs".to_string(), 10.0), ("quads".to_string(), 1.0)]
            .into_iter()
            .collect();
        let c = catalog.compose_with_base("squat", &base, &[], &EngineConfig::default());

        assert_eq!(c.tree.score_of("legs"), None);
        assert_eq!(c.total_of("legs"), Some(1.0));
        assert!(!c.flat().contains_key("legs"));
    }

    #[test]
    fn test_compose_unknown_motion_is_not_found() {
        let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
        let err = catalog
            .compose("deadlift", &[], &EngineConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_resolve_through_catalog() {
        let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
        let config = EngineConfig::default();
        let r = catalog
            .resolve("front_squat", &AxisSelection::new("stance", "wide"), &config)
            .unwrap();
        assert_eq!(r.provenance, vec!["front_squat", "squat"]);
        assert!(catalog
            .resolve("squat", &AxisSelection::new("grip", "wide"), &config)
            .is_none());
    }

    #[test]
    fn test_load_from_source() {
        let snapshot = CatalogSnapshot::from_json_str(SNAPSHOT).unwrap();
        let catalog = Catalog::load(&snapshot).unwrap();
        assert_eq!(catalog.version(), snapshot.fingerprint());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            Catalog::from_json_str("{ not json").unwrap_err(),
            Error::Json(_)
        ));
    }
}
