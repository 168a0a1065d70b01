//! Configuration management for the executor engine
//!
//! Settings are layered with figment: embedded defaults, then a user or
//! project config file, then `SHARD_EXEC_*` environment variables.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::parallel::optimal_workers;

pub mod core;
pub mod smart_load;

pub use self::core::ENV_PREFIX;

/// Engine sizing and lifecycle settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on pool threads (0 = no limit)
    pub max_threads: usize,

    /// Percentage of CPU cores to use (1-100)
    pub thread_percentage: u8,

    /// Pool threads are named `<prefix>-<index>`
    pub thread_name_prefix: String,

    /// Grace period for `close()` (milliseconds)
    pub close_timeout_ms: u64,

    /// Drain period for an engine dropped without `close()` (milliseconds)
    pub exit_grace_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_threads: 0,
            thread_percentage: 75,
            thread_name_prefix: "shard-exec".to_string(),
            close_timeout_ms: 5_000,
            exit_grace_ms: 60_000,
        }
    }
}

impl EngineConfig {
    /// Pool size derived from available cores and the configured limits
    pub fn worker_count(&self) -> usize {
        optimal_workers(self.max_threads, self.thread_percentage)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn exit_grace(&self) -> Duration {
        Duration::from_millis(self.exit_grace_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.thread_percentage == 0 || self.thread_percentage > 100 {
            bail!(
                "thread_percentage must be between 1 and 100, got {}",
                self.thread_percentage
            );
        }

        if self.thread_name_prefix.trim().is_empty() {
            bail!("thread_name_prefix cannot be empty");
        }

        if self.close_timeout_ms == 0 {
            bail!("close_timeout_ms cannot be 0");
        }

        Ok(())
    }
}
