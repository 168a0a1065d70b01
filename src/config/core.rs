use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use std::path::Path;

use super::{EngineConfig, smart_load};

// Embed the default config at compile time
pub(crate) const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Environment variables with this prefix override file settings
pub const ENV_PREFIX: &str = "SHARD_EXEC_";

impl EngineConfig {
    pub fn load_with_custom_config(custom_config: Option<&str>) -> Result<Self> {
        if let Some(path) = custom_config
            && !Path::new(path).exists()
        {
            bail!("Config file not found: {}", path);
        }

        let config: EngineConfig = Self::figment(custom_config)
            .extract()
            .context("Failed to parse executor configuration")?;
        config.validate()?;

        tracing::debug!("Loaded executor configuration: {:?}", config);
        Ok(config)
    }

    /// The layered provider stack, lowest priority first
    pub fn figment(custom_config: Option<&str>) -> Figment {
        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG));

        // A custom config replaces the user and project files
        if let Some(custom_path) = custom_config {
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            figment = figment
                .merge(smart_load::auto(Self::user_config_path()))
                .merge(Toml::file("shard-executor.toml"));
        }

        // Environment variables always have highest priority
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    fn user_config_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{}/.config/shard-executor/config.toml", home),
            Err(_) => "~/.config/shard-executor/config.toml".to_string(),
        }
    }
}
