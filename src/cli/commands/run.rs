//! Run a simulated per-shard workload through the executor engine

use anyhow::{Context, Result, bail};
use clap::Args;
use std::time::{Duration, Instant};

use crate::cli::Output;
use crate::config::EngineConfig;
use crate::parallel::ExecutorEngine;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of shards to query
    #[arg(short = 'n', long, default_value_t = 8)]
    pub items: usize,

    /// Simulated latency of each shard query in milliseconds
    #[arg(long, default_value_t = 10)]
    pub delay_ms: u64,

    /// Make the query against this shard fail
    #[arg(long, value_name = "SHARD")]
    pub fail_at: Option<usize>,

    /// Override the configured pool size
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Result of querying one shard
#[derive(Debug, Clone)]
struct ShardRows {
    shard: usize,
    rows: u64,
    thread: String,
}

/// Ordered per-shard results plus their total
#[derive(Debug)]
struct ShardSummary {
    shards: Vec<ShardRows>,
    total_rows: u64,
}

pub fn execute(args: RunArgs, config_path: Option<&str>, output: &Output) -> Result<()> {
    let config = EngineConfig::load_with_custom_config(config_path)?;
    let engine = match args.workers {
        Some(workers) => ExecutorEngine::with_workers(workers, &config)?,
        None => ExecutorEngine::from_config(&config)?,
    };

    output.header("Shard execution");
    output.table_row("Shards", &args.items.to_string());
    output.table_row("Pool workers", &engine.workers().to_string());
    output.verbose(&format!("Simulated latency: {}ms per shard", args.delay_ms));

    let delay = Duration::from_millis(args.delay_ms);
    let fail_at = args.fail_at;
    let started = Instant::now();

    let outcome = engine.execute_and_merge(
        0..args.items,
        move |shard: usize| query_shard(shard, delay, fail_at),
        |shards: Vec<ShardRows>| -> Result<ShardSummary> {
            let total_rows: u64 = shards.iter().map(|s| s.rows).sum();
            Ok(ShardSummary { shards, total_rows })
        },
    );
    let elapsed = started.elapsed();

    // Release the pool before reporting; a stuck worker is a hard failure
    let summary = match settle(outcome, engine.close()) {
        Ok(summary) => summary,
        Err(error) => {
            output.error(&format!("Execution failed after {:.2?}", elapsed));
            return Err(error);
        }
    };

    if summary.shards.is_empty() {
        output.info("No shards to query");
    }

    output.blank_line();
    for shard in &summary.shards {
        output.key_value(
            &format!("shard-{:<4}", shard.shard),
            &format!("rows={:<6} thread={}", shard.rows, shard.thread),
            false,
        );
    }
    output.blank_line();
    output.success(&format!(
        "Merged {} shards: total rows = {} in {:.2?}",
        summary.shards.len(),
        summary.total_rows,
        elapsed
    ));

    Ok(())
}

/// Combine the execution outcome with the pool shutdown result.
///
/// An execution failure wins; a close failure on top of it is attached as
/// context instead of replacing it.
fn settle<T>(outcome: Result<T>, closed: Result<()>) -> Result<T> {
    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(error), Ok(())) => Err(error),
        (Err(error), Err(close_error)) => {
            Err(error.context(format!("engine also failed to close: {close_error:#}")))
        }
    }
}

fn query_shard(shard: usize, delay: Duration, fail_at: Option<usize>) -> Result<ShardRows> {
    std::thread::sleep(delay);

    if fail_at == Some(shard) {
        bail!("shard-{} is unavailable", shard);
    }

    let thread = std::thread::current()
        .name()
        .map(str::to_string)
        .context("Unnamed thread executed shard query")?;

    Ok(ShardRows {
        shard,
        rows: (shard as u64 + 1) * 10,
        thread,
    })
}
