//! Generic parallel execution framework
//!
//! This module runs one unit of work over many independent inputs, using the
//! calling thread plus a fixed pool of worker threads.
//!
//! # Architecture Responsibilities
//!
//! ## What This Module Does:
//! - **Fan-out/fan-in**: The first input runs on the calling thread, the rest on the pool
//! - **Ordering**: Results come back in input order, whatever order the threads finish in
//! - **Failure routing**: Failures go to a [`FailureHandler`] and come back as `Err`
//! - **Lifecycle**: Graceful or forced shutdown with a bounded wait for the workers
//!
//! ## What This Module Does NOT Do:
//! - **Domain Logic**: The work itself is an opaque [`ExecuteUnit`]
//! - **Scheduling Policy**: No priorities, work stealing, retries or per-task cancellation
//! - **Backpressure**: The pending-work queue is unbounded; overload grows memory
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────────────┐    ┌─────────────────┐
//! │   Caller        │    │   ExecutorEngine     │    │   WorkerPool    │
//! │                 │───▶│                      │───▶│                 │
//! │ • inputs        │    │ • input #0 inline    │    │ • n threads     │
//! │ • ExecuteUnit   │    │ • inputs #1.. queued │    │ • unbounded     │
//! │ • MergeUnit     │◀───│ • ordered join       │◀───│   job queue     │
//! └─────────────────┘    └──────────────────────┘    └─────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use shard_executor::parallel::ExecutorEngine;
//!
//! let engine = ExecutorEngine::new(2).unwrap();
//!
//! let total = engine
//!     .execute_and_merge(
//!         vec![2u64, 3, 4],
//!         |shard: u64| -> anyhow::Result<u64> { Ok(shard) },
//!         |rows: Vec<u64>| -> anyhow::Result<u64> { Ok(rows.into_iter().sum()) },
//!     )
//!     .unwrap();
//! assert_eq!(total, 9);
//!
//! engine.close().unwrap();
//! ```

pub mod engine;
pub mod handler;
pub mod pool;
pub mod unit;

// Re-export main types for easier access
pub use engine::ExecutorEngine;
pub use handler::{FailureHandler, LoggingFailureHandler};
pub use pool::WorkerPool;
pub use unit::{ExecuteUnit, MergeUnit};

/// Calculate optimal workers based on available system resources and configuration limits
///
/// # Algorithm
/// ```text
/// 1. Detect available CPU cores: num_cpus::get()
/// 2. Apply percentage: cores * thread_percentage / 100
/// 3. Apply config limit: min(max_threads_config, percentage_result) if max_threads_config > 0
/// 4. Ensure minimum: max(1, final_result)
/// ```
///
/// # Examples
/// ```rust
/// use shard_executor::parallel::optimal_workers;
///
/// let workers = optimal_workers(0, 75);
/// assert!(workers >= 1); // Always at least 1 worker
///
/// let workers = optimal_workers(8, 75);
/// assert!(workers <= 8); // Respects max limit
/// ```
pub fn optimal_workers(max_threads_config: usize, thread_percentage: u8) -> usize {
    let available_cores = num_cpus::get();

    // Calculate workers based on percentage of available cores
    let workers_by_percentage =
        std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

    // Apply config limit if specified (0 means use percentage calculation only)
    if max_threads_config > 0 {
        std::cmp::min(max_threads_config, workers_by_percentage)
    } else {
        workers_by_percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optimal_workers_calculation() {
        assert!(optimal_workers(0, 75) >= 1);
        assert_eq!(optimal_workers(1, 100), 1);
        assert!(optimal_workers(4, 100) <= 4);

        // Tiny percentages still yield one worker
        assert_eq!(optimal_workers(0, 1), std::cmp::max(1, num_cpus::get() / 100));
    }
}
