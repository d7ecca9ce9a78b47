//! Bounded concurrency executor.
//!
//! [`WorkerPool`] is the low-level primitive: `submit` spawns a task that
//! waits for one of K semaphore permits before it starts, and `next` yields
//! finished results in completion order. [`Executor`] builds on it to run a
//! whole item list, optionally split into batches separated by a barrier
//! and a fixed pause.
//!
//! Results are never reordered back into submission order. A task's own
//! failure is part of its output value; the executor never aborts siblings
//! or later batches.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::loadtest::config::Settings;

/// Concurrency ceiling and batching parameters for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Maximum number of tasks in flight at any instant.
    pub concurrency: usize,
    /// Optional batch size. `None` runs every item in a single batch.
    pub batch_size: Option<usize>,
    /// Pause between consecutive batches.
    pub batch_delay: Duration,
}

impl ExecutorSettings {
    /// Unbatched settings with the given ceiling (clamped to at least 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            batch_size: None,
            batch_delay: Duration::ZERO,
        }
    }

    /// Splits the run into batches of `size` with `delay` between them.
    pub fn with_batches(mut self, size: usize, delay: Duration) -> Self {
        self.batch_size = Some(size.max(1));
        self.batch_delay = delay;
        self
    }

    /// Derives executor settings from the harness settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let base = Self::new(settings.concurrency);
        match settings.batch_size {
            Some(size) => base.with_batches(size, settings.batch_delay_as_duration()),
            None => base,
        }
    }
}

/// Number of batches a run of `total` items is split into.
///
/// `ceil(total / batch_size)` when batching, otherwise one batch for a
/// non-empty run and zero for an empty one.
pub fn batch_count(total: usize, batch_size: Option<usize>) -> usize {
    match batch_size {
        Some(size) if size > 0 => total.div_ceil(size),
        _ => usize::from(total > 0),
    }
}

/// Handle returned by [`WorkerPool::submit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    seq: usize,
}

impl TaskHandle {
    /// Submission sequence number, starting at 0.
    pub fn seq(&self) -> usize {
        self.seq
    }
}

/// Pool of spawned tasks sharing K permits.
///
/// Submission never blocks: each spawned task parks on the semaphore until a
/// slot frees up, so a slow task occupies exactly one slot.
pub struct WorkerPool<T> {
    permits: Arc<Semaphore>,
    tasks: JoinSet<T>,
    concurrency: usize,
    submitted: usize,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Creates a pool with at most `concurrency` tasks running (clamped to 1).
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self {
            permits: Arc::new(Semaphore::new(concurrency)),
            tasks: JoinSet::new(),
            concurrency,
            submitted: 0,
        }
    }

    /// Spawns `task`; it starts once a permit is available.
    pub fn submit<F>(&mut self, task: F) -> TaskHandle
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.tasks.spawn(async move {
            // The semaphore is never closed, so acquisition only waits.
            let _permit = permits.acquire_owned().await;
            task.await
        });
        let handle = TaskHandle {
            seq: self.submitted,
        };
        self.submitted += 1;
        handle
    }

    /// Waits for the next task to finish and returns its output.
    ///
    /// Returns `None` once every submitted task has been collected. A
    /// panicking task re-raises its panic here.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.tasks.join_next().await? {
                Ok(value) => return Some(value),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    tracing::warn!(error = %err, "worker task cancelled before completion");
                },
            }
        }
    }

    /// Collects every remaining result in completion order.
    pub async fn drain(&mut self) -> Vec<T> {
        let mut results = Vec::with_capacity(self.tasks.len());
        while let Some(value) = self.next().await {
            results.push(value);
        }
        results
    }

    /// Tasks submitted but not yet collected.
    pub fn pending(&self) -> usize {
        self.tasks.len()
    }

    /// Tasks submitted over the pool's lifetime.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// Outputs of a completed run, in completion order.
#[derive(Debug)]
pub struct ExecutionReport<T> {
    pub results: Vec<T>,
    /// Number of batches that actually ran.
    pub batches: usize,
    pub elapsed: Duration,
}

/// Runs item lists through a [`WorkerPool`] under [`ExecutorSettings`].
#[derive(Debug, Clone)]
pub struct Executor {
    settings: ExecutorSettings,
}

impl Executor {
    pub fn new(settings: ExecutorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Runs `work` once per item and returns every output.
    ///
    /// `on_result` is called for each output as it completes, before the
    /// next one is awaited. With batching enabled, batch `i + 1` is not
    /// submitted until every task of batch `i` has finished, and the
    /// configured delay is slept between the two.
    pub async fn run<I, W, Fut, T, O>(
        &self,
        items: Vec<I>,
        work: W,
        mut on_result: O,
    ) -> ExecutionReport<T>
    where
        W: Fn(I) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        O: FnMut(&T),
    {
        let start = Instant::now();
        let total = items.len();
        let planned = batch_count(total, self.settings.batch_size);
        let batch_size = self.settings.batch_size.unwrap_or(total).max(1);

        let mut results = Vec::with_capacity(total);
        let mut remaining = items.into_iter().peekable();
        let mut batches = 0;

        while remaining.peek().is_some() {
            if batches > 0 && !self.settings.batch_delay.is_zero() {
                tracing::info!(
                    delay_ms = self.settings.batch_delay.as_millis() as u64,
                    "pausing between batches"
                );
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            batches += 1;

            let mut pool = WorkerPool::new(self.settings.concurrency);
            for item in remaining.by_ref().take(batch_size) {
                pool.submit(work(item));
            }
            tracing::info!(
                batch = batches,
                batches = planned,
                tasks = pool.submitted(),
                concurrency = pool.concurrency(),
                "batch submitted"
            );

            while let Some(result) = pool.next().await {
                on_result(&result);
                results.push(result);
            }
            tracing::debug!(batch = batches, completed = results.len(), "batch drained");
        }

        ExecutionReport {
            results,
            batches,
            elapsed: start.elapsed(),
        }
    }
}
