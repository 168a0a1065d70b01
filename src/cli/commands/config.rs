//! Configuration command implementation
//!
//! Prints the configuration the engine would run with after every layer
//! (defaults, files, environment) has been applied.

use anyhow::{Context, Result};
use clap::Args;

use crate::cli::Output;
use crate::config::EngineConfig;

#[derive(Args, Debug, Default)]
pub struct ConfigArgs {
    /// Print as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: ConfigArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = EngineConfig::load_with_custom_config(config_path)?;

    let rendered = if args.json {
        serde_json::to_string_pretty(&config).context("Failed to render configuration as JSON")?
    } else {
        toml::to_string_pretty(&config).context("Failed to render configuration as TOML")?
    };

    output.raw(rendered.trim_end());
    output.verbose(&format!("Effective pool size: {} workers", config.worker_count()));
    Ok(())
}
