//! Per-motion delta rules for modifier axis rows
//!
//! Each row of a modifier axis table (one grip, one stance, ...) stores, per
//! motion, one of three rules. Only [`DeltaRuleStore::set_rule`] writes rules,
//! and it enforces the storage invariants: every delta is finite and no delta
//! map carries a non-scorable muscle.

use crate::error::{Error, Result};
use crate::model::{FlatScores, MotionId, RowId};
use crate::scorability::{filter_scorable, MuscleCatalog};
use std::collections::BTreeMap;
use tracing::debug;

/// What a row says about one motion
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DeltaRule {
    /// No entry for the motion
    #[default]
    NoOverride,
    /// Custom deltas (an empty map is an explicit "no effect")
    Explicit(FlatScores),
    /// Defer to the parent motion's rule
    Inherit,
}

impl DeltaRule {
    pub fn explicit<I, K>(deltas: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        DeltaRule::Explicit(deltas.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_inherit(&self) -> bool {
        matches!(self, DeltaRule::Inherit)
    }

    /// Short label for display
    pub fn kind(&self) -> &'static str {
        match self {
            DeltaRule::NoOverride => "none",
            DeltaRule::Explicit(_) => "custom",
            DeltaRule::Inherit => "inherit",
        }
    }
}

static NO_OVERRIDE: DeltaRule = DeltaRule::NoOverride;

/// Motion id → rule map for one axis row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaRuleStore {
    rules: BTreeMap<MotionId, DeltaRule>,
}

impl DeltaRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rule for a motion; absent entries read as [`DeltaRule::NoOverride`]
    pub fn rule(&self, motion_id: &str) -> &DeltaRule {
        self.rules.get(motion_id).unwrap_or(&NO_OVERRIDE)
    }

    /// Store a rule for a motion
    ///
    /// Rejects the whole rule (store unchanged) if any delta is non-finite.
    /// Non-scorable muscles are stripped from explicit maps. Storing
    /// `NoOverride` removes the entry.
    pub fn set_rule<C: MuscleCatalog + ?Sized>(
        &mut self,
        motion_id: &str,
        rule: DeltaRule,
        catalog: &C,
    ) -> Result<()> {
        let rule = match rule {
            DeltaRule::Explicit(deltas) => {
                if let Some((muscle_id, value)) = deltas.iter().find(|(_, v)| !v.is_finite()) {
                    return Err(Error::InvalidScore {
                        muscle_id: muscle_id.clone(),
                        value: *value,
                    });
                }
                DeltaRule::Explicit(filter_scorable(&deltas, catalog))
            }
            other => other,
        };

        debug!(motion_id = %motion_id, kind = rule.kind(), "Storing delta rule");
        match rule {
            DeltaRule::NoOverride => {
                self.rules.remove(motion_id);
            }
            rule => {
                self.rules.insert(motion_id.to_string(), rule);
            }
        }
        Ok(())
    }

    /// Entries in motion id order
    pub fn iter(&self) -> impl Iterator<Item = (&MotionId, &DeltaRule)> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// One selectable row of an axis (e.g. "neutral grip")
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierRow {
    pub id: RowId,
    pub label: String,
    pub rules: DeltaRuleStore,
}

impl ModifierRow {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            rules: DeltaRuleStore::new(),
        }
    }
}

/// A named modifier axis (motion path, grip, stance, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct ModifierAxisTable {
    pub name: String,
    rows: BTreeMap<RowId, ModifierRow>,
}

impl ModifierAxisTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: BTreeMap::new(),
        }
    }

    /// Add or replace a row
    pub fn insert_row(&mut self, row: ModifierRow) {
        self.rows.insert(row.id.clone(), row);
    }

    pub fn row(&self, row_id: &str) -> Option<&ModifierRow> {
        self.rows.get(row_id)
    }

    pub fn row_mut(&mut self, row_id: &str) -> Option<&mut ModifierRow> {
        self.rows.get_mut(row_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &ModifierRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
