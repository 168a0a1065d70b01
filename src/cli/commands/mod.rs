//! Command implementations for the shard-executor CLI
//!
//! Each command is organized into its own module.

pub mod config;
pub mod run;
