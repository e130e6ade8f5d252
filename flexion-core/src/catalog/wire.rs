//! JSON shapes exchanged with the persistence layer
//!
//! These types mirror the stored records field for field. Values are kept as
//! raw `serde_json::Value`s where the engine needs to reject bad data itself
//! (non-numeric scores, unknown sentinels) instead of failing the whole
//! snapshot.

use crate::delta_rules::DeltaRule;
use crate::error::{Error, Result};
use crate::model::{FlatScores, MuscleRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tracing::warn;

/// Sentinel meaning "defer to the parent motion"
pub const INHERIT_SENTINEL: &str = "inherit";

/// Whole catalog as loaded from storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub muscles: Vec<MuscleRecord>,
    #[serde(default)]
    pub motions: Vec<MotionEntry>,
    #[serde(default)]
    pub axes: Vec<AxisEntry>,
}

/// Stored motion row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MotionEntry {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub base_targets: BTreeMap<String, Value>,
}

/// Stored modifier axis table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisEntry {
    pub name: String,
    #[serde(default)]
    pub rows: Vec<AxisRowEntry>,
}

/// Stored modifier axis row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisRowEntry {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub delta_rules: BTreeMap<String, WireDeltaRule>,
}

/// Stored per-motion rule: a delta map or the `"inherit"` sentinel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireDeltaRule {
    Sentinel(String),
    Deltas(BTreeMap<String, Value>),
    Other(Value),
}

impl WireDeltaRule {
    /// Decode into the engine's tagged rule
    ///
    /// The sentinel is matched case-insensitively. `null` reads as no entry.
    /// Any other string, or any non-numeric delta, is an error.
    pub fn decode(&self) -> Result<DeltaRule> {
        match self {
            WireDeltaRule::Sentinel(s) if s.trim().eq_ignore_ascii_case(INHERIT_SENTINEL) => {
                Ok(DeltaRule::Inherit)
            }
            WireDeltaRule::Sentinel(s) => Err(Error::InvalidInput(format!(
                "unknown delta rule sentinel '{}'",
                s
            ))),
            WireDeltaRule::Deltas(raw) => {
                let mut deltas = FlatScores::new();
                for (muscle_id, value) in raw {
                    deltas.insert(muscle_id.clone(), numeric(muscle_id, value)?);
                }
                Ok(DeltaRule::Explicit(deltas))
            }
            WireDeltaRule::Other(Value::Null) => Ok(DeltaRule::NoOverride),
            WireDeltaRule::Other(other) => Err(Error::InvalidInput(format!(
                "delta rule must be a map or \"{}\", got {}",
                INHERIT_SENTINEL, other
            ))),
        }
    }
}

impl From<&DeltaRule> for WireDeltaRule {
    fn from(rule: &DeltaRule) -> Self {
        match rule {
            DeltaRule::NoOverride => WireDeltaRule::Other(Value::Null),
            DeltaRule::Inherit => WireDeltaRule::Sentinel(INHERIT_SENTINEL.to_string()),
            DeltaRule::Explicit(deltas) => WireDeltaRule::Deltas(
                deltas
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from(*v)))
                    .collect(),
            ),
        }
    }
}

/// Decode a stored flat score map, skipping entries that are not finite numbers
pub fn decode_flat_lossy(owner: &str, raw: &BTreeMap<String, Value>) -> FlatScores {
    raw.iter()
        .filter_map(|(muscle_id, value)| match numeric(muscle_id, value) {
            Ok(score) => Some((muscle_id.clone(), score)),
            Err(e) => {
                warn!(owner = %owner, "Rejected score: {}", e);
                None
            }
        })
        .collect()
}

fn numeric(muscle_id: &str, value: &Value) -> Result<f64> {
    let score = value.as_f64().ok_or_else(|| {
        Error::InvalidInput(format!("score for '{}' is not a number: {}", muscle_id, value))
    })?;
    if !score.is_finite() {
        return Err(Error::InvalidScore {
            muscle_id: muscle_id.to_string(),
            value: score,
        });
    }
    Ok(score)
}

impl CatalogSnapshot {
    /// Parse a snapshot from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// SHA-256 hex digest of the snapshot content
    ///
    /// Record order does not affect the digest.
    pub fn fingerprint(&self) -> String {
        let mut canonical = self.clone();
        canonical.muscles.sort_by(|a, b| a.id.cmp(&b.id));
        canonical.motions.sort_by(|a, b| a.id.cmp(&b.id));
        canonical.axes.sort_by(|a, b| a.name.cmp(&b.name));
        for axis in &mut canonical.axes {
            axis.rows.sort_by(|a, b| a.id.cmp(&b.id));
        }

        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&canonical).unwrap_or_default());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}
