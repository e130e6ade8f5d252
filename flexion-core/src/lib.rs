//! # Flexion Core
//!
//! Hierarchical muscle activation scoring:
//! - Muscle and motion hierarchies (indexed catalog records)
//! - Persistent score trees with aggregated totals
//! - Per-axis delta rules with inheritance along motion ancestry
//! - Composition of base targets and selected axis rows
//! - Catalog loading, memoised compositions and configuration

pub mod cache;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod delta_rules;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod resolver;
pub mod scorability;
pub mod score_tree;

pub use cache::{CacheStats, CompositionCache};
pub use catalog::{Catalog, CatalogSnapshot, CatalogSource, JsonFileSource};
pub use compose::{AxisResolution, Composition, ScoreCompositionEngine, SelectedRow};
pub use config::{AbsentEntryPolicy, EngineConfig, FlexionToml};
pub use delta_rules::{DeltaRule, DeltaRuleStore, ModifierAxisTable, ModifierRow};
pub use error::{Error, Result};
pub use hierarchy::{MotionHierarchy, MuscleHierarchy};
pub use model::{AxisSelection, FlatScores, MotionId, MotionRecord, MuscleId, MuscleRecord, RowId};
pub use resolver::{InheritanceResolver, Resolution, ResolutionSource};
pub use score_tree::{ScoreNode, ScoreTotals, ScoreTree, TotalRow};
