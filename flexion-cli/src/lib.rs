//! flexion - command-line host for the scoring engine
//!
//! Loads one catalog snapshot, runs a single composition, resolution or
//! hierarchy query against it and renders the result as text or JSON.
//! Results go to stdout; logs go to stderr.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use flexion_core::config::LoggingConfig;
use flexion_core::{AxisSelection, Catalog, EngineConfig};
use std::path::PathBuf;

pub mod report;

pub use report::{CheckReport, PathReport};

/// Muscle activation scoring over a catalog snapshot
#[derive(Parser, Debug)]
#[command(name = "flexion")]
#[command(about = "Compose hierarchical muscle activation scores")]
#[command(version)]
pub struct Cli {
    /// Catalog snapshot (JSON); overrides FLEXION_CATALOG and the config file
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Config file (TOML); overrides FLEXION_CONFIG
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `flexion_core=trace`
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Compose final scores for a motion
    Compose {
        motion: String,

        /// Axis row to apply, as `axis=row` (repeatable)
        #[arg(short, long = "select", value_parser = parse_selection)]
        select: Vec<AxisSelection>,

        /// Print the flat explicit scores instead of the totals tree
        #[arg(long)]
        flat: bool,
    },
    /// Show the effective deltas of one axis row for a motion
    Resolve {
        motion: String,

        /// Axis row, as `axis=row`
        #[arg(short, long = "select", value_parser = parse_selection)]
        select: AxisSelection,
    },
    /// Show a muscle's path to its root
    Path { muscle: String },
    /// Report catalog counts and hierarchy anomalies
    Check,
}

fn parse_selection(s: &str) -> std::result::Result<AxisSelection, String> {
    AxisSelection::parse(s).ok_or_else(|| format!("expected axis=row, got '{}'", s))
}

/// Output style for every subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Cli {
    pub fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Log filter directive, highest priority first:
/// `--log-level`, `RUST_LOG`, `[logging] level`, then `info`
pub fn log_directive(cli_level: Option<&str>, logging: &LoggingConfig) -> String {
    if let Some(level) = cli_level.filter(|l| !l.trim().is_empty()) {
        return level.to_string();
    }
    if let Ok(level) = std::env::var("RUST_LOG") {
        if !level.trim().is_empty() {
            return level;
        }
    }
    if !logging.level.trim().is_empty() {
        return logging.level.clone();
    }
    "info".to_string()
}

/// Run one subcommand and return the rendered output
pub fn run(
    command: &Command,
    catalog: &Catalog,
    config: &EngineConfig,
    format: OutputFormat,
) -> Result<String> {
    match command {
        Command::Compose {
            motion,
            select,
            flat,
        } => {
            let composition = catalog.compose(motion, select, config)?;
            report::render_composition(catalog, &composition, *flat, config, format)
        }
        Command::Resolve { motion, select } => {
            if !catalog.motions().contains(motion) {
                bail!("unknown motion '{}'", motion);
            }
            let Some(resolution) = catalog.resolve(motion, select, config) else {
                bail!("no row '{}' on axis '{}'", select.row, select.axis);
            };
            report::render_resolution(motion, select, &resolution, format)
        }
        Command::Path { muscle } => {
            let Some(path) = PathReport::new(catalog, muscle) else {
                bail!("unknown muscle '{}'", muscle);
            };
            path.render(format)
        }
        Command::Check => CheckReport::from_catalog(catalog).render(format),
    }
}
