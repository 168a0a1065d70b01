use anyhow::{Context, Result, bail};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// A boxed task ready to run on any pool thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size set of worker threads fed from an unbounded queue.
///
/// Submission never blocks while the pool is open. Shutdown comes in two
/// flavours: [`WorkerPool::shutdown`] lets queued jobs drain,
/// [`WorkerPool::shutdown_now`] discards them. Either way
/// [`WorkerPool::await_termination`] waits, with a deadline, for every
/// worker thread to exit.
pub struct WorkerPool {
    size: usize,
    job_tx: RwLock<Option<Sender<Job>>>,
    job_rx: Receiver<Job>,
    stopped: Arc<AtomicBool>,
    exit_rx: Receiver<usize>,
    exited: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Context for worker threads to avoid too many function parameters
struct WorkerContext {
    worker_id: usize,
    job_rx: Receiver<Job>,
    stopped: Arc<AtomicBool>,
    exit_tx: Sender<usize>,
}

/// Reports a worker's exit even when it unwinds
struct ExitSignal {
    worker_id: usize,
    exit_tx: Sender<usize>,
}

impl Drop for ExitSignal {
    fn drop(&mut self) {
        let _ = self.exit_tx.send(self.worker_id);
    }
}

impl WorkerPool {
    /// Spawn `size` worker threads named `<name_prefix>-<index>`.
    pub fn new(size: usize, name_prefix: &str) -> Result<Self> {
        if size == 0 {
            bail!("Worker pool needs at least one thread");
        }

        let (job_tx, job_rx) = unbounded::<Job>();
        let (exit_tx, exit_rx) = unbounded();
        let stopped = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(size);

        for worker_id in 0..size {
            let ctx = WorkerContext {
                worker_id,
                job_rx: job_rx.clone(),
                stopped: stopped.clone(),
                exit_tx: exit_tx.clone(),
            };
            let handle = std::thread::Builder::new()
                .name(format!("{name_prefix}-{worker_id}"))
                .spawn(move || worker_thread(ctx))
                .with_context(|| {
                    format!("Failed to spawn worker thread {name_prefix}-{worker_id}")
                })?;
            handles.push(handle);
        }

        tracing::debug!("Started worker pool with {} threads", size);

        Ok(Self {
            size,
            job_tx: RwLock::new(Some(job_tx)),
            job_rx,
            stopped,
            exit_rx,
            exited: AtomicUsize::new(0),
            handles: Mutex::new(handles),
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job. Fails only once the pool has been shut down.
    pub fn submit(&self, job: Job) -> Result<()> {
        let guard = self
            .job_tx
            .read()
            .map_err(|_| anyhow::anyhow!("Worker pool state lock poisoned"))?;
        match guard.as_ref() {
            Some(tx) => tx
                .send(job)
                .map_err(|_| anyhow::anyhow!("Worker pool has no live workers")),
            None => bail!("Worker pool is shut down"),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.job_tx.read().map(|tx| tx.is_none()).unwrap_or(true)
    }

    /// Stop accepting jobs; queued jobs still run before the workers exit.
    pub fn shutdown(&self) {
        self.close_queue();
    }

    /// Stop accepting jobs and drop every job that has not started yet.
    ///
    /// Returns the number of discarded jobs. Jobs already running finish
    /// their current unit; threads cannot be interrupted mid-task.
    pub fn shutdown_now(&self) -> usize {
        self.stopped.store(true, Ordering::Release);
        self.close_queue();

        let abandoned = self.job_rx.try_iter().count();
        if abandoned > 0 {
            tracing::warn!("Discarded {} queued tasks on shutdown", abandoned);
        }
        abandoned
    }

    /// Wait up to `timeout` for every worker thread to exit.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        while self.exited.load(Ordering::Acquire) < self.size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.exit_rx.recv_timeout(remaining) {
                Ok(worker_id) => {
                    tracing::trace!("Worker {} exited", worker_id);
                    self.exited.fetch_add(1, Ordering::AcqRel);
                }
                Err(RecvTimeoutError::Timeout) => return false,
                // All exit senders dropped: every worker is gone
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.reap();
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.exited.load(Ordering::Acquire) >= self.size
    }

    fn close_queue(&self) {
        match self.job_tx.write() {
            Ok(mut tx) => {
                if tx.take().is_some() {
                    tracing::debug!("Worker pool queue closed");
                }
            }
            Err(poisoned) => {
                poisoned.into_inner().take();
            }
        }
    }

    fn reap(&self) {
        if let Ok(mut handles) = self.handles.lock() {
            for handle in handles.drain(..) {
                if handle.join().is_err() {
                    tracing::warn!("Worker thread terminated by panic");
                }
            }
        }
        self.exited.store(self.size, Ordering::Release);
    }
}

fn worker_thread(ctx: WorkerContext) {
    let _signal = ExitSignal {
        worker_id: ctx.worker_id,
        exit_tx: ctx.exit_tx,
    };

    while let Ok(job) = ctx.job_rx.recv() {
        if ctx.stopped.load(Ordering::Acquire) {
            break;
        }
        job();
    }
}
