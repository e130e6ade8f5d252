//! Motion hierarchy index (primary motions and their variations)

use crate::model::{MotionId, MotionRecord};
use std::collections::HashMap;
use tracing::warn;

/// Parent/variation index over the motion catalog
#[derive(Debug, Clone, Default)]
pub struct MotionHierarchy {
    records: HashMap<MotionId, MotionRecord>,
    variations: HashMap<MotionId, Vec<MotionId>>,
}

impl MotionHierarchy {
    pub fn new(records: impl IntoIterator<Item = MotionRecord>) -> Self {
        let mut by_id: HashMap<MotionId, MotionRecord> = HashMap::new();
        for record in records {
            if by_id.contains_key(&record.id) {
                warn!(motion_id = %record.id, "Duplicate motion id, later record wins");
            }
            by_id.insert(record.id.clone(), record);
        }

        let mut variations: HashMap<MotionId, Vec<MotionId>> = HashMap::new();
        for record in by_id.values() {
            if let Some(parent) = record.parent() {
                variations
                    .entry(parent.to_string())
                    .or_default()
                    .push(record.id.clone());
            }
        }
        for list in variations.values_mut() {
            list.sort_by(|a, b| {
                let label = |id: &MotionId| by_id.get(id).map(|r| r.label.as_str()).unwrap_or("");
                label(a).cmp(label(b)).then_with(|| a.cmp(b))
            });
        }

        Self {
            records: by_id,
            variations,
        }
    }

    pub fn get(&self, id: &str) -> Option<&MotionRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &MotionRecord> {
        self.records.values()
    }

    /// Parent of a motion, if it has one that exists in the catalog
    ///
    /// A dangling parent reference is reported as `None` so resolution treats
    /// the motion as primary.
    pub fn parent_of(&self, id: &str) -> Option<&str> {
        let parent = self.records.get(id)?.parent()?;
        if self.records.contains_key(parent) {
            Some(parent)
        } else {
            None
        }
    }

    /// True for primary motions and for unknown ids
    pub fn is_primary(&self, id: &str) -> bool {
        self.parent_of(id).is_none()
    }

    /// Variations declared under a motion, sorted by label
    pub fn variations_of(&self, id: &str) -> &[MotionId] {
        self.variations.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Motions whose declared parent is missing from the catalog, sorted by id
    pub fn dangling_ids(&self) -> Vec<MotionId> {
        let mut ids: Vec<MotionId> = self
            .records
            .values()
            .filter(|r| r.parent().is_some() && self.parent_of(&r.id).is_none())
            .map(|r| r.id.clone())
            .collect();
        ids.sort();
        ids
    }
}
