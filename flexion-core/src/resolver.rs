//! Inheritance resolution of delta rules along the motion ancestry
//!
//! For one axis row and one motion, walks from the motion up through its
//! parents, one level at a time, until a custom delta map is found or the walk
//! reaches a primary motion. The motion ids visited form the provenance chain,
//! which is for display and audit only and never affects scoring.

use crate::config::AbsentEntryPolicy;
use crate::delta_rules::{DeltaRule, DeltaRuleStore};
use crate::hierarchy::MotionHierarchy;
use crate::model::{FlatScores, MotionId};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, warn};

/// How a resolution ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolutionSource {
    /// A custom delta map stored on `motion`
    Explicit { motion: MotionId },
    /// Reached primary `motion` without a custom map
    PrimaryFallback { motion: MotionId },
    /// `motion` had no entry and absent entries do not inherit
    NoOverride { motion: MotionId },
    /// Parentage looped back to `motion`
    CycleDetected { motion: MotionId },
}

impl ResolutionSource {
    /// Motion where the walk stopped
    pub fn motion(&self) -> &str {
        match self {
            ResolutionSource::Explicit { motion }
            | ResolutionSource::PrimaryFallback { motion }
            | ResolutionSource::NoOverride { motion }
            | ResolutionSource::CycleDetected { motion } => motion,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, ResolutionSource::Explicit { .. })
    }
}

/// Effective delta map for one motion on one axis row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub deltas: FlatScores,
    /// Motion ids walked, starting at the requested motion
    pub provenance: Vec<MotionId>,
    pub source: ResolutionSource,
}

impl Resolution {
    fn empty(provenance: Vec<MotionId>, source: ResolutionSource) -> Self {
        Self {
            deltas: FlatScores::new(),
            provenance,
            source,
        }
    }
}

/// Walks motion parentage against a [`DeltaRuleStore`]
#[derive(Debug, Clone, Copy)]
pub struct InheritanceResolver<'a> {
    motions: &'a MotionHierarchy,
    absent_entry: AbsentEntryPolicy,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(motions: &'a MotionHierarchy) -> Self {
        Self {
            motions,
            absent_entry: AbsentEntryPolicy::default(),
        }
    }

    pub fn with_absent_entry(mut self, policy: AbsentEntryPolicy) -> Self {
        self.absent_entry = policy;
        self
    }

    /// Resolve the effective delta map for `motion_id`
    ///
    /// Unknown motions and motions whose parent is missing resolve as
    /// primaries. Cyclic parentage stops at the first repeated id with an
    /// empty map.
    pub fn resolve(&self, rules: &DeltaRuleStore, motion_id: &str) -> Resolution {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut provenance: Vec<MotionId> = Vec::new();
        let mut current = motion_id;

        loop {
            if !visited.insert(current) {
                warn!(
                    motion_id = %motion_id,
                    repeated = %current,
                    "Cyclic motion parentage, resolving to empty deltas"
                );
                return Resolution::empty(
                    provenance,
                    ResolutionSource::CycleDetected {
                        motion: current.to_string(),
                    },
                );
            }
            provenance.push(current.to_string());

            match rules.rule(current) {
                DeltaRule::Explicit(deltas) => {
                    debug!(
                        motion_id = %motion_id,
                        source = %current,
                        depth = provenance.len() - 1,
                        "Resolved custom deltas"
                    );
                    return Resolution {
                        deltas: deltas.clone(),
                        provenance,
                        source: ResolutionSource::Explicit {
                            motion: current.to_string(),
                        },
                    };
                }
                DeltaRule::NoOverride if self.absent_entry == AbsentEntryPolicy::NoContribution => {
                    return Resolution::empty(
                        provenance,
                        ResolutionSource::NoOverride {
                            motion: current.to_string(),
                        },
                    );
                }
                DeltaRule::NoOverride | DeltaRule::Inherit => {}
            }

            match self.motions.parent_of(current) {
                Some(parent) => current = parent,
                None => {
                    return Resolution::empty(
                        provenance,
                        ResolutionSource::PrimaryFallback {
                            motion: current.to_string(),
                        },
                    );
                }
            }
        }
    }
}
