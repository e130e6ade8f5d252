//! Configuration loading and catalog path resolution
//!
//! Catalog path priority:
//! 1. Command-line argument (highest priority)
//! 2. `FLEXION_CATALOG` environment variable
//! 3. `catalog_path` in the TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unusable config file is never fatal: defaults are used and
//! the [`ConfigOutcome`] is logged once tracing is up.

use crate::score_tree::{DEFAULT_TOTAL_PRECISION, MAX_TOTAL_PRECISION};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the catalog snapshot file
pub const CATALOG_ENV_VAR: &str = "FLEXION_CATALOG";

/// Environment variable naming the TOML config file
pub const CONFIG_ENV_VAR: &str = "FLEXION_CONFIG";

/// Default bound on memoised compositions
pub const DEFAULT_CACHE_CAPACITY: usize = 256;

/// How a motion with no entry on an axis row resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AbsentEntryPolicy {
    /// Walk up to the parent motion, exactly like an explicit `inherit`
    #[default]
    Inherit,
    /// Stop with an empty delta map
    NoContribution,
}

/// Engine knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Decimal places for aggregated totals
    pub total_precision: u32,
    pub absent_entry: AbsentEntryPolicy,
    /// Maximum memoised compositions before the cache is cleared
    pub cache_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_precision: DEFAULT_TOTAL_PRECISION,
            absent_entry: AbsentEntryPolicy::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.total_precision > MAX_TOTAL_PRECISION {
            return Err(Error::Config(format!(
                "total_precision must be at most {}, got {}",
                MAX_TOTAL_PRECISION, self.total_precision
            )));
        }
        Ok(())
    }
}

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `info` or `flexion_core=debug`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlexionToml {
    pub catalog_path: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub engine: EngineConfig,
}

impl FlexionToml {
    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.engine.validate()?;
        Ok(config)
    }

    /// Parse a config file, falling back to defaults on any failure
    ///
    /// Nothing is logged here; the caller reports the outcome with
    /// [`ConfigOutcome::log`] once a subscriber is installed.
    pub fn load_or_default(path: &Path) -> (Self, ConfigOutcome) {
        match Self::load(path) {
            Ok(config) => (config, ConfigOutcome::Loaded),
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                (Self::default(), ConfigOutcome::Missing)
            }
            Err(e) => (Self::default(), ConfigOutcome::Unusable(e)),
        }
    }
}

/// Result of [`FlexionToml::load_or_default`]
#[derive(Debug)]
pub enum ConfigOutcome {
    Loaded,
    Missing,
    /// Present but unreadable, malformed or invalid
    Unusable(Error),
}

impl ConfigOutcome {
    /// A missing file is only a warning when it was explicitly requested
    pub fn log(&self, path: &Path, requested: bool) {
        match self {
            ConfigOutcome::Loaded => debug!("Config: {}", path.display()),
            ConfigOutcome::Missing if requested => {
                warn!("Config file {} not found, using defaults", path.display())
            }
            ConfigOutcome::Missing => {
                debug!("No config at {}, using defaults", path.display())
            }
            ConfigOutcome::Unusable(e) => {
                warn!("Config file {} unusable ({}), using defaults", path.display(), e)
            }
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &FlexionToml, target: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;

    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp = target.with_extension("toml.tmp");
    std::fs::write(&temp, content)?;
    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }
    Ok(())
}

/// Config file location: explicit path, else `FLEXION_CONFIG`, else the
/// platform config directory
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path(CONFIG_ENV_VAR) {
        return Some(path);
    }
    default_config_path()
}

/// Platform config file path (`<config dir>/flexion/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flexion").join("config.toml"))
}

/// Resolves the catalog snapshot path using the 4-tier priority order
#[derive(Debug, Clone)]
pub struct CatalogPathResolver<'a> {
    cli_arg: Option<&'a Path>,
    toml: Option<&'a FlexionToml>,
}

impl<'a> CatalogPathResolver<'a> {
    pub fn new() -> Self {
        Self {
            cli_arg: None,
            toml: None,
        }
    }

    pub fn with_cli_arg(mut self, path: Option<&'a Path>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn with_toml(mut self, toml: &'a FlexionToml) -> Self {
        self.toml = Some(toml);
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = self.cli_arg {
            return path.to_path_buf();
        }

        // Priority 2: Environment variable
        if let Some(path) = env_path(CATALOG_ENV_VAR) {
            return path;
        }

        // Priority 3: TOML config file
        if let Some(path) = self.toml.and_then(|t| t.catalog_path.clone()) {
            return path;
        }

        // Priority 4: OS-dependent compiled default
        default_catalog_path()
    }
}

impl Default for CatalogPathResolver<'_> {
    fn default() -> Self {
        Self::new()
    }
}

/// OS-dependent default catalog location
pub fn default_catalog_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("flexion").join("catalog.json"))
        .unwrap_or_else(|| PathBuf::from("./flexion_data/catalog.json"))
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
