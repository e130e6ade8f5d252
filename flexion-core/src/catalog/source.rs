//! Catalog sources
//!
//! The persistence layer owns reading and writing records. The engine only
//! needs a snapshot, obtained through [`CatalogSource`].

use super::wire::CatalogSnapshot;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Supplies catalog snapshots to the engine
pub trait CatalogSource {
    fn load_snapshot(&self) -> Result<CatalogSnapshot>;
}

/// Snapshot stored as a single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CatalogSource for JsonFileSource {
    fn load_snapshot(&self) -> Result<CatalogSnapshot> {
        debug!("Reading catalog snapshot from {}", self.path.display());
        let content = std::fs::read_to_string(&self.path)?;
        CatalogSnapshot::from_json_str(&content)
    }
}

/// Snapshot already held in memory
impl CatalogSource for CatalogSnapshot {
    fn load_snapshot(&self) -> Result<CatalogSnapshot> {
        Ok(self.clone())
    }
}
