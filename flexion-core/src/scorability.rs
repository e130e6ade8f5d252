//! Scorability filter
//!
//! Non-scorable muscles are organisational only: they may appear in the tree
//! as ancestors but never carry a persisted or computed score of their own.
//! Unknown ids are scorable so muscles added before a catalog sync are not
//! silently hidden.

use crate::hierarchy::MuscleHierarchy;
use crate::model::{FlatScores, MuscleId, MuscleRecord};
use std::collections::HashMap;
use tracing::debug;

/// Lookup of muscle records by id
pub trait MuscleCatalog {
    fn muscle(&self, id: &str) -> Option<&MuscleRecord>;
}

impl MuscleCatalog for MuscleHierarchy {
    fn muscle(&self, id: &str) -> Option<&MuscleRecord> {
        self.get(id)
    }
}

impl MuscleCatalog for HashMap<MuscleId, MuscleRecord> {
    fn muscle(&self, id: &str) -> Option<&MuscleRecord> {
        self.get(id)
    }
}

/// True unless the catalog knows the muscle and marks it non-scorable
pub fn is_scorable<C: MuscleCatalog + ?Sized>(catalog: &C, id: &str) -> bool {
    catalog.muscle(id).map(|m| m.is_scorable).unwrap_or(true)
}

/// Copy of `flat` without non-scorable entries
pub fn filter_scorable<C: MuscleCatalog + ?Sized>(flat: &FlatScores, catalog: &C) -> FlatScores {
    let filtered: FlatScores = flat
        .iter()
        .filter(|(id, _)| is_scorable(catalog, id))
        .map(|(id, score)| (id.clone(), *score))
        .collect();

    if filtered.len() != flat.len() {
        debug!(
            removed = flat.len() - filtered.len(),
            "Stripped non-scorable muscles from flat map"
        );
    }
    filtered
}

/// Keep only scorable ids from a candidate list, preserving order
pub fn retain_scorable_ids<C: MuscleCatalog + ?Sized>(ids: &mut Vec<MuscleId>, catalog: &C) {
    ids.retain(|id| is_scorable(catalog, id));
}
