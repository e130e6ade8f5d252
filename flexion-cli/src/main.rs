//! flexion - compose muscle activation scores from a catalog snapshot
//!
//! Startup order:
//! 1. Parse arguments
//! 2. Read the config file (the outcome is logged once tracing is up)
//! 3. Initialise tracing on stderr
//! 4. Resolve and load the catalog, run the subcommand, print to stdout

use anyhow::{Context, Result};
use clap::Parser;
use flexion_cli::{log_directive, run, Cli};
use flexion_core::config::{resolve_config_path, CatalogPathResolver, FlexionToml, CONFIG_ENV_VAR};
use flexion_core::{Catalog, JsonFileSource};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let (toml, outcome) = match config_path.as_deref() {
        Some(path) => {
            let (toml, outcome) = FlexionToml::load_or_default(path);
            (toml, Some(outcome))
        }
        None => (FlexionToml::default(), None),
    };

    let directive = log_directive(cli.log_level.as_deref(), &toml.logging);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    debug!("flexion v{} (log filter '{}')", env!("CARGO_PKG_VERSION"), directive);

    let requested = cli.config.is_some() || std::env::var_os(CONFIG_ENV_VAR).is_some();
    match (config_path.as_deref(), outcome) {
        (Some(path), Some(outcome)) => outcome.log(path, requested),
        _ => debug!("No config directory on this platform, using defaults"),
    }

    let catalog_path = CatalogPathResolver::new()
        .with_cli_arg(cli.catalog.as_deref())
        .with_toml(&toml)
        .resolve();
    info!("Catalog: {}", catalog_path.display());

    let catalog = Catalog::load(&JsonFileSource::new(&catalog_path))
        .with_context(|| format!("Failed to load catalog from {}", catalog_path.display()))?;

    let output = run(&cli.command, &catalog, &toml.engine, cli.format())?;
    if output.ends_with('\n') {
        print!("{}", output);
    } else {
        println!("{}", output);
    }
    Ok(())
}
