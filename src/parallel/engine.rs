use anyhow::{Context, Result, anyhow, bail};
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use super::handler::{FailureHandler, LoggingFailureHandler};
use super::pool::WorkerPool;
use super::unit::{ExecuteUnit, MergeUnit};
use crate::config::EngineConfig;

/// Multi-threaded execution engine.
///
/// Every execution runs its first input on the calling thread and fans the
/// remaining inputs out to a fixed pool of worker threads. Results always
/// come back in input order.
///
/// ```rust
/// use shard_executor::parallel::ExecutorEngine;
///
/// let engine = ExecutorEngine::new(4).unwrap();
/// let squares = engine
///     .execute(vec![1, 2, 3], |x: i32| -> anyhow::Result<i32> { Ok(x * x) })
///     .unwrap();
/// assert_eq!(squares, vec![1, 4, 9]);
/// engine.close().unwrap();
/// ```
pub struct ExecutorEngine {
    pool: WorkerPool,
    handler: Arc<dyn FailureHandler>,
    close_timeout: Duration,
    exit_grace: Duration,
    closed: bool,
}

/// One input bound to the unit that will process it on a pool thread
struct ExecutionTask<I, O, U> {
    index: usize,
    input: I,
    unit: Arc<U>,
    result_tx: Sender<(usize, Result<O>)>,
}

impl<I, O, U> ExecutionTask<I, O, U>
where
    U: ExecuteUnit<I, O>,
{
    fn run(self) {
        let result = run_unit(self.unit.as_ref(), self.input);
        // The caller may have bailed out already; nobody is listening then
        let _ = self.result_tx.send((self.index, result));
    }
}

/// Outputs of the pooled part of one execution, slotted by input position
struct PendingResults<O> {
    result_rx: Receiver<(usize, Result<O>)>,
    slots: Vec<Option<O>>,
}

impl<O> PendingResults<O> {
    /// Block until every pooled task has reported, failing on the first error.
    fn wait(mut self) -> Result<Vec<O>> {
        let mut outstanding = self.slots.len();

        while outstanding > 0 {
            let (index, result) = self
                .result_rx
                .recv()
                .map_err(|_| anyhow!("Pending task was abandoned by engine shutdown"))?;
            let output = result.with_context(|| format!("Task for input #{} failed", index))?;
            self.slots[index - 1] = Some(output);
            outstanding -= 1;
        }

        self.slots
            .into_iter()
            .enumerate()
            .map(|(offset, slot)| {
                slot.ok_or_else(|| anyhow!("Missing result for input #{}", offset + 1))
            })
            .collect()
    }
}

impl ExecutorEngine {
    /// Build an engine with `workers` pool threads and default timeouts.
    pub fn new(workers: usize) -> Result<Self> {
        Self::with_workers(workers, &EngineConfig::default())
    }

    /// Build an engine sized and tuned from configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::with_workers(config.worker_count(), config)
    }

    /// Build an engine with an explicit worker count, taking thread naming
    /// and timeouts from configuration.
    pub fn with_workers(workers: usize, config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        if workers == 0 {
            bail!("Executor engine needs a positive worker count");
        }
        let pool = WorkerPool::new(workers, &config.thread_name_prefix)?;
        tracing::info!("Executor engine started with {} workers", workers);

        Ok(Self {
            pool,
            handler: Arc::new(LoggingFailureHandler),
            close_timeout: config.close_timeout(),
            exit_grace: config.exit_grace(),
            closed: false,
        })
    }

    /// Replace the failure hook invoked before a failed execution returns.
    pub fn with_failure_handler<H>(mut self, handler: H) -> Self
    where
        H: FailureHandler + 'static,
    {
        self.handler = Arc::new(handler);
        self
    }

    pub fn workers(&self) -> usize {
        self.pool.size()
    }

    /// Execute `unit` once per input and return the outputs in input order.
    ///
    /// The first input runs on the calling thread while the rest run on the
    /// pool. An empty input yields `Ok` with an empty list. Any failure is
    /// passed to the failure hook and returned; partial results are never
    /// returned.
    pub fn execute<I, O, U, C>(&self, inputs: C, unit: U) -> Result<Vec<O>>
    where
        C: IntoIterator<Item = I>,
        I: Send + 'static,
        O: Send + 'static,
        U: ExecuteUnit<I, O> + 'static,
    {
        let mut inputs = inputs.into_iter();
        let Some(first) = inputs.next() else {
            return Ok(Vec::new());
        };

        let outcome = self.execute_split(first, inputs, Arc::new(unit));
        if let Err(ref error) = outcome {
            self.handler.handle(error);
        }
        outcome
    }

    /// Execute `unit` over the inputs, then fold the ordered outputs with
    /// `merge`.
    ///
    /// `merge` runs exactly once on success, including for empty input. A
    /// failed execution short-circuits before `merge` is called.
    pub fn execute_and_merge<I, M, O, U, G, C>(&self, inputs: C, unit: U, merge: G) -> Result<O>
    where
        C: IntoIterator<Item = I>,
        I: Send + 'static,
        M: Send + 'static,
        U: ExecuteUnit<I, M> + 'static,
        G: MergeUnit<M, O>,
    {
        let results = self.execute(inputs, unit)?;
        merge.merge(results).context("Merge of execution results failed")
    }

    fn execute_split<I, O, U>(
        &self,
        first: I,
        rest: impl Iterator<Item = I>,
        unit: Arc<U>,
    ) -> Result<Vec<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        U: ExecuteUnit<I, O> + 'static,
    {
        let pending = self.dispatch(rest, &unit)?;

        let first_output =
            run_unit(unit.as_ref(), first).context("Task for input #0 failed on calling thread")?;
        let rest_outputs = pending.wait()?;

        let mut results = Vec::with_capacity(rest_outputs.len() + 1);
        results.push(first_output);
        results.extend(rest_outputs);
        Ok(results)
    }

    fn dispatch<I, O, U>(
        &self,
        rest: impl Iterator<Item = I>,
        unit: &Arc<U>,
    ) -> Result<PendingResults<O>>
    where
        I: Send + 'static,
        O: Send + 'static,
        U: ExecuteUnit<I, O> + 'static,
    {
        let (result_tx, result_rx) = unbounded();
        let mut submitted = 0;

        for (offset, input) in rest.enumerate() {
            let task = ExecutionTask {
                index: offset + 1,
                input,
                unit: unit.clone(),
                result_tx: result_tx.clone(),
            };
            self.pool
                .submit(Box::new(move || task.run()))
                .context("Failed to submit task to executor engine")?;
            submitted += 1;
        }

        if submitted > 0 {
            tracing::debug!("Dispatched {} tasks to {} workers", submitted, self.pool.size());
        }

        let mut slots = Vec::with_capacity(submitted);
        slots.resize_with(submitted, || None);
        Ok(PendingResults { result_rx, slots })
    }

    /// Shut the engine down immediately.
    ///
    /// Tasks that have not started are discarded and workers exit after
    /// their current task. Fails if the workers have not all exited within
    /// the close timeout, which means a unit of work is stuck.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.pool.shutdown_now();

        if !self.pool.await_termination(self.close_timeout) {
            bail!(
                "Executor engine could not be terminated within {:?}",
                self.close_timeout
            );
        }
        tracing::info!("Executor engine closed");
        Ok(())
    }
}

impl Drop for ExecutorEngine {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        // Never closed: let queued work drain for a while, then force it
        self.pool.shutdown();
        if self.pool.await_termination(self.exit_grace) {
            return;
        }

        let abandoned = self.pool.shutdown_now();
        tracing::warn!(
            "Executor engine dropped without close; forced shutdown after {:?} \
             ({} tasks discarded)",
            self.exit_grace,
            abandoned
        );
        if !self.pool.await_termination(self.close_timeout) {
            tracing::error!(
                "Executor engine could not be terminated; leaving worker threads detached"
            );
        }
    }
}

fn run_unit<I, O, U>(unit: &U, input: I) -> Result<O>
where
    U: ExecuteUnit<I, O> + ?Sized,
{
    catch_unwind(AssertUnwindSafe(|| unit.execute(input))).unwrap_or_else(|payload| {
        Err(anyhow!(
            "Unit of work panicked: {}",
            panic_message(payload.as_ref())
        ))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
