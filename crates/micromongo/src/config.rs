//! Configuration loading

use anyhow::{Context, Result};
use micromongo_common::Config;

use crate::cli::Cli;

/// Defaults, then the file named by `--config`, then command line flags
pub async fn resolve(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .await
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    cli.apply(&mut config);
    config.validate()?;
    Ok(config)
}
