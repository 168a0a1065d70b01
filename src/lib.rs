//! # shard-executor - parallel fan-out/fan-in for independent work items
//!
//! Runs one unit of work over a collection of inputs: the first input on the
//! calling thread, the rest on a fixed pool of worker threads, with results
//! returned in input order and optionally merged into a single value.
//!
//! ## Quick Start
//!
//! ```rust
//! use shard_executor::parallel::ExecutorEngine;
//!
//! let engine = ExecutorEngine::new(4).unwrap();
//! let lengths = engine
//!     .execute(vec!["orders", "users"], |table: &'static str| -> anyhow::Result<usize> {
//!         Ok(table.len())
//!     })
//!     .unwrap();
//! assert_eq!(lengths, vec![6, 5]);
//! engine.close().unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod parallel;

pub use cli::{Cli, Output};
pub use config::EngineConfig;
pub use parallel::{ExecuteUnit, ExecutorEngine, FailureHandler, MergeUnit};

/// Result type alias for shard-executor operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
