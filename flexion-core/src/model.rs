//! Core data model
//!
//! Records as the engine sees them after the wire boundary has decoded and
//! validated them. See [`crate::catalog`] for the JSON shapes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Muscle identifier
pub type MuscleId = String;

/// Motion identifier
pub type MotionId = String;

/// Modifier axis row identifier
pub type RowId = String;

/// Flat muscle→score map
///
/// Ordered so that iteration, equality and rendering are deterministic.
pub type FlatScores = BTreeMap<MuscleId, f64>;

/// A muscle in the hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MuscleRecord {
    pub id: MuscleId,
    pub label: String,
    /// Only the first entry is the primary parent. Further entries are kept
    /// as authored and ignored by every traversal.
    #[serde(default)]
    pub parent_ids: Vec<MuscleId>,
    #[serde(default = "default_scorable")]
    pub is_scorable: bool,
}

fn default_scorable() -> bool {
    true
}

impl MuscleRecord {
    /// Create a scorable muscle with at most one parent
    pub fn new(id: impl Into<String>, label: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            parent_ids: parent.map(|p| vec![p.to_string()]).unwrap_or_default(),
            is_scorable: true,
        }
    }

    /// Mark this muscle as organisational only
    pub fn non_scorable(mut self) -> Self {
        self.is_scorable = false;
        self
    }

    /// Primary parent (`parent_ids[0]`), ignoring empty ids
    pub fn primary_parent(&self) -> Option<&str> {
        self.parent_ids
            .first()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
    }
}

/// An exercise motion (primary or variation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionRecord {
    pub id: MotionId,
    pub label: String,
    #[serde(default)]
    pub parent_id: Option<MotionId>,
    #[serde(default)]
    pub base_targets: FlatScores,
}

impl MotionRecord {
    /// Create a motion with no base targets
    pub fn new(id: impl Into<String>, label: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            parent_id: parent.map(str::to_string),
            base_targets: FlatScores::new(),
        }
    }

    /// Builder-style base target assignment
    pub fn with_targets<I, K>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.base_targets = targets.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }

    /// Parent id, ignoring empty strings
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }

    /// A motion with no parent is a primary motion
    pub fn is_primary(&self) -> bool {
        self.parent().is_none()
    }
}

/// One selected row of one modifier axis table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AxisSelection {
    pub axis: String,
    pub row: RowId,
}

impl AxisSelection {
    pub fn new(axis: impl Into<String>, row: impl Into<String>) -> Self {
        Self {
            axis: axis.into(),
            row: row.into(),
        }
    }

    /// Parse `axis=row` (as typed on the command line)
    pub fn parse(s: &str) -> Option<Self> {
        let (axis, row) = s.split_once('=')?;
        let (axis, row) = (axis.trim(), row.trim());
        if axis.is_empty() || row.is_empty() {
            return None;
        }
        Some(Self::new(axis, row))
    }
}

impl std::fmt::Display for AxisSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.axis, self.row)
    }
}

/// Treat non-finite values as 0 during summation
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_parent_uses_first_entry_only() {
        let mut muscle = MuscleRecord::new("biceps_long", "Biceps (long head)", Some("biceps"));
        muscle.parent_ids.push("forearm".to_string());
        assert_eq!(muscle.primary_parent(), Some("biceps"));
    }

    #[test]
    fn test_empty_parent_id_is_no_parent() {
        let muscle = MuscleRecord {
            id: "chest".into(),
            label: "Chest".into(),
            parent_ids: vec![String::new()],
            is_scorable: true,
        };
        assert_eq!(muscle.primary_parent(), None);

        let motion = MotionRecord {
            parent_id: Some(String::new()),
            ..MotionRecord::new("squat", "Squat", None)
        };
        assert!(motion.is_primary());
    }

    #[test]
    fn test_muscle_defaults_from_json() {
        let muscle: MuscleRecord =
            serde_json::from_str(r#"{"id":"quads","label":"Quadriceps"}"#).unwrap();
        assert!(muscle.is_scorable);
        assert!(muscle.parent_ids.is_empty());
    }

    #[test]
    fn test_axis_selection_parse() {
        assert_eq!(
            AxisSelection::parse("grip = neutral"),
            Some(AxisSelection::new("grip", "neutral"))
        );
        assert_eq!(AxisSelection::parse("grip"), None);
        assert_eq!(AxisSelection::parse("=neutral"), None);
        assert_eq!(AxisSelection::parse("grip="), None);
        assert_eq!(AxisSelection::new("stance", "wide").to_string(), "stance=wide");
    }

    #[test]
    fn test_finite_or_zero() {
        assert_eq!(finite_or_zero(1.5), 1.5);
        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(f64::INFINITY), 0.0);
    }
}
