//! Memoised compositions
//!
//! Composition is pure for a fixed catalog, so results can be shared between
//! callers. Entries are keyed by catalog version, motion, the selection set
//! (order-insensitive) and the engine knobs that change the result. A new
//! catalog version never hits entries from an older one.

use crate::catalog::Catalog;
use crate::compose::Composition;
use crate::config::{AbsentEntryPolicy, EngineConfig};
use crate::error::Result;
use crate::model::{AxisSelection, MotionId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CompositionKey {
    version: String,
    motion_id: MotionId,
    selections: Vec<AxisSelection>,
    total_precision: u32,
    absent_entry: AbsentEntryPolicy,
}

/// Hit and miss counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe, bounded composition cache
///
/// When the bound is reached the whole cache is cleared before inserting.
#[derive(Debug)]
pub struct CompositionCache {
    capacity: usize,
    entries: RwLock<HashMap<CompositionKey, Arc<Composition>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CompositionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cache_capacity)
    }

    /// Cached composition, computed on first request
    ///
    /// Errors from composition (unknown motion) are returned and not cached.
    pub fn get_or_compose(
        &self,
        catalog: &Catalog,
        motion_id: &str,
        selections: &[AxisSelection],
        config: &EngineConfig,
    ) -> Result<Arc<Composition>> {
        let mut sorted = selections.to_vec();
        sorted.sort();
        let key = CompositionKey {
            version: catalog.version().to_string(),
            motion_id: motion_id.to_string(),
            selections: sorted,
            total_precision: config.total_precision,
            absent_entry: config.absent_entry,
        };

        // A poisoned lock is treated as a miss
        if let Ok(entries) = self.entries.read() {
            if let Some(hit) = entries.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                trace!(motion_id = %motion_id, "Composition cache hit");
                return Ok(Arc::clone(hit));
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let composed = Arc::new(catalog.compose(motion_id, &key.selections, config)?);

        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.capacity && !entries.contains_key(&key) {
                debug!(capacity = self.capacity, "Composition cache full, clearing");
                entries.clear();
            }
            entries.insert(key, Arc::clone(&composed));
        }
        Ok(composed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for CompositionCache {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
