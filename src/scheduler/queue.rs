//! Render queue controller.
//!
//! One mutex guards the priority heap, the dedup index, the waiter lists
//! and the lifecycle state. Workers sleep on `work_ready`; submitters
//! blocked on capacity and shutdown callers sleep on `progress`, which is
//! signalled whenever a job is dispatched or completes.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::heap::PriorityHeap;
use super::job::{BoxError, Job, RenderFn, ResultRx, Sink, Submission};
use super::pending::{PendingIndex, Waiters};
use super::worker;
use crate::context::{Context, ContextError};
use crate::shutdown::QueueState;
use crate::telemetry::{self, RenderOutcome};

/// Configuration for the render queue.
#[derive(Debug, Clone)]
pub struct RenderQueueConfig {
    /// Number of worker threads (0 = one per CPU).
    pub workers: usize,
    /// Maximum distinct queued keys before `submit` blocks (0 = unbounded).
    pub max_pending: usize,
    /// Worker thread name prefix.
    pub thread_name_prefix: String,
    /// Worker stack size in bytes (0 = platform default).
    pub stack_size: usize,
    /// Drain budget used by [`RenderQueue::close`].
    pub shutdown_timeout: Duration,
}

impl Default for RenderQueueConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            max_pending: 0,
            thread_name_prefix: "render-worker".to_string(),
            stack_size: 0,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl RenderQueueConfig {
    /// Worker count with auto-detection applied.
    pub fn resolved_workers(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.workers
        }
    }
}

/// Counters and gauges describing queue activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub coalesced: u64,
    /// Render invocations finished, whatever the outcome.
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub pending: usize,
    pub active: usize,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("render queue is closed")]
    Closed,
    #[error("job key must not be empty")]
    EmptyKey,
    #[error("gave up waiting for queue capacity: {0}")]
    Backpressure(#[source] ContextError),
    #[error("shutdown {source} with {pending} queued and {active} rendering jobs still draining")]
    DrainIncomplete {
        source: ContextError,
        pending: usize,
        active: usize,
    },
    #[error("shutdown called from one of this queue's render workers; drain continues without waiting")]
    CalledFromWorker,
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl QueueError {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// True when a caller's deadline ran out while blocked in the queue.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(
            self,
            Self::Backpressure(ContextError::DeadlineExceeded)
                | Self::DrainIncomplete { source: ContextError::DeadlineExceeded, .. }
        )
    }
}

/// State mutated only under the controller lock.
#[derive(Debug, Default)]
pub(crate) struct Inner {
    pub(crate) heap: PriorityHeap,
    pub(crate) pending: PendingIndex,
    pub(crate) state: QueueState,
    pub(crate) active: usize,
    pub(crate) stats: QueueStats,
}

/// A job handed to a worker together with every sink of its generation.
pub(crate) struct Dispatch {
    pub(crate) job: Job,
    pub(crate) waiters: Waiters,
}

pub(crate) struct Shared {
    pub(crate) inner: Mutex<Inner>,
    work_ready: Condvar,
    progress: Condvar,
    pub(crate) render: RenderFn,
    max_pending: usize,
}

impl Shared {
    /// Block until a job is available, or return `None` once the queue is
    /// no longer open and nothing is left to dispatch.
    pub(crate) fn next_dispatch(&self) -> Option<Dispatch> {
        let mut inner = self.inner.lock();
        loop {
            if let Some(job) = inner.heap.pop() {
                let Some(entry) = inner.pending.remove(&job.key) else {
                    unreachable!("queued job `{}` has no pending entry", job.key);
                };
                debug_assert!(inner.heap.get(entry.job).is_none());
                inner.active += 1;
                telemetry::record_queue_depth(inner.heap.len());
                drop(inner);
                self.progress.notify_all();
                return Some(Dispatch { job, waiters: entry.waiters });
            }
            if !inner.state.is_accepting() {
                return None;
            }
            self.work_ready.wait(&mut inner);
        }
    }

    /// Account for a finished render and close the queue if it drained.
    pub(crate) fn complete(&self, outcome: RenderOutcome) {
        let mut inner = self.inner.lock();
        inner.active -= 1;
        inner.stats.completed += 1;
        match outcome {
            RenderOutcome::Ok => {}
            RenderOutcome::Error => inner.stats.failed += 1,
            RenderOutcome::Panic => inner.stats.panicked += 1,
        }

        let (queued, active) = (inner.heap.len(), inner.active);
        if inner.state.finish_drain(queued, active) {
            info!("render queue drained");
        }
        drop(inner);
        self.progress.notify_all();
    }

    /// Stop accepting submissions and wake everyone who must observe it.
    fn request_drain(&self) {
        let mut inner = self.inner.lock();
        if inner.state.begin_drain() {
            let (queued, active) = (inner.heap.len(), inner.active);
            info!(queued, active, "render queue draining");
            if inner.state.finish_drain(queued, active) {
                info!("render queue drained");
            }
        }
        drop(inner);
        self.work_ready.notify_all();
        self.progress.notify_all();
    }

    fn has_capacity(&self, inner: &Inner) -> bool {
        self.max_pending == 0 || inner.heap.len() < self.max_pending
    }
}

/// Prioritized, coalescing render queue backed by a fixed worker pool.
pub struct RenderQueue {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    worker_count: usize,
    config: RenderQueueConfig,
}

impl RenderQueue {
    /// Start `workers` render threads (0 = one per CPU) around `render`.
    pub fn new<F, E>(workers: usize, render: F) -> Result<Self, QueueError>
    where
        F: Fn(&str) -> Result<String, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::with_config(RenderQueueConfig { workers, ..Default::default() }, render)
    }

    pub fn with_config<F, E>(config: RenderQueueConfig, render: F) -> Result<Self, QueueError>
    where
        F: Fn(&str) -> Result<String, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let render: RenderFn = Arc::new(move |payload: &str| render(payload).map_err(Into::into));
        let shared = Arc::new(Shared {
            inner: Mutex::new(Inner::default()),
            work_ready: Condvar::new(),
            progress: Condvar::new(),
            render,
            max_pending: config.max_pending,
        });

        let worker_count = config.resolved_workers();
        let handles = match worker::spawn_workers(&shared, &config, worker_count) {
            Ok(handles) => handles,
            Err(e) => {
                shared.request_drain();
                return Err(QueueError::Spawn(e));
            }
        };
        info!(workers = worker_count, max_pending = config.max_pending, "render queue started");

        Ok(Self {
            shared,
            workers: Mutex::new(handles),
            worker_count,
            config,
        })
    }

    /// Submit a job, coalescing with a queued job of the same key.
    ///
    /// `ctx` only bounds waiting for capacity when `max_pending` is set; an
    /// accepted job always runs to completion. `sink` may be `None`.
    pub fn submit(
        &self,
        ctx: &Context,
        job: Job,
        sink: Option<Sink>,
    ) -> Result<Submission, QueueError> {
        if job.key.is_empty() {
            return Err(QueueError::EmptyKey);
        }

        let mut guard = self.shared.inner.lock();
        loop {
            if !guard.state.is_accepting() {
                return Err(QueueError::Closed);
            }

            let inner = &mut *guard;
            if let Some(entry) = inner.pending.get_mut(&job.key) {
                entry.waiters.push(sink);
                let waiters = entry.waiters.len();
                let id = entry.job;
                let tier = job.tier;
                inner.heap.update(id, |queued| {
                    queued.payload = job.payload;
                    queued.version_tag = job.version_tag;
                    queued.tier = job.tier;
                    queued.submitted_at = job.submitted_at;
                });
                inner.stats.submitted += 1;
                inner.stats.coalesced += 1;
                telemetry::record_submitted(tier);
                telemetry::record_coalesced(tier);
                debug!(key = %job.key, %tier, waiters, "render job coalesced");
                return Ok(Submission::Coalesced);
            }

            if self.shared.has_capacity(inner) {
                break;
            }
            debug!(key = %job.key, depth = inner.heap.len(), "render queue full; waiting");
            ctx.wait_on(&self.shared.progress, &mut guard)
                .map_err(QueueError::Backpressure)?;
        }

        let key = job.key.clone();
        let tier = job.tier;
        let inner = &mut *guard;
        let id = inner.heap.push(job);
        inner.pending.insert(key.clone(), id, sink);
        inner.stats.submitted += 1;
        let depth = inner.heap.len();
        drop(guard);

        self.shared.work_ready.notify_one();
        telemetry::record_submitted(tier);
        telemetry::record_queue_depth(depth);
        debug!(key = %key, %tier, depth, "render job queued");
        Ok(Submission::Queued)
    }

    /// Submit and get the receiving half of a fresh sink.
    pub fn submit_with_response(
        &self,
        ctx: &Context,
        job: Job,
    ) -> Result<(Submission, ResultRx), QueueError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let submission = self.submit(ctx, job, Some(tx))?;
        Ok((submission, rx))
    }

    /// Stop accepting work and wait for queued and running jobs to finish.
    ///
    /// If `ctx` expires first the error reports what is still outstanding;
    /// draining carries on in the background and every sink still gets its
    /// result. Calling again waits on the same drain.
    ///
    /// A render callback may start shutdown of its own queue, but cannot wait
    /// for a drain that includes its own render: that call returns
    /// [`QueueError::CalledFromWorker`] once intake has stopped.
    pub fn shutdown(&self, ctx: &Context) -> Result<(), QueueError> {
        self.shared.request_drain();
        if worker::is_worker_of(&self.shared) {
            warn!("shutdown requested from a render worker; not waiting for drain");
            return Err(QueueError::CalledFromWorker);
        }

        let mut inner = self.shared.inner.lock();
        while inner.state != QueueState::Closed {
            if let Err(source) = ctx.wait_on(&self.shared.progress, &mut inner) {
                let (pending, active) = (inner.heap.len(), inner.active);
                warn!(%source, pending, active, "shutdown returned before drain finished");
                return Err(QueueError::DrainIncomplete { source, pending, active });
            }
        }
        drop(inner);

        self.join_workers();
        info!("render queue shut down");
        Ok(())
    }

    /// Shut down within the configured `shutdown_timeout`.
    pub fn close(&self) -> Result<(), QueueError> {
        self.shutdown(&Context::with_timeout(self.config.shutdown_timeout))
    }

    pub fn state(&self) -> QueueState {
        self.shared.inner.lock().state
    }

    pub fn is_accepting(&self) -> bool {
        self.state().is_accepting()
    }

    /// Jobs waiting in the heap.
    pub fn pending(&self) -> usize {
        self.shared.inner.lock().heap.len()
    }

    /// Jobs currently being rendered.
    pub fn active(&self) -> usize {
        self.shared.inner.lock().active
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn config(&self) -> &RenderQueueConfig {
        &self.config
    }

    pub fn stats(&self) -> QueueStats {
        let inner = self.shared.inner.lock();
        QueueStats {
            pending: inner.heap.len(),
            active: inner.active,
            ..inner.stats.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    fn join_workers(&self) {
        let handles = std::mem::take(&mut *self.workers.lock());
        for handle in handles {
            if handle.join().is_err() {
                warn!("render worker exited with a panic");
            }
        }
    }
}

impl Drop for RenderQueue {
    /// Stops intake without blocking; detached workers finish what was
    /// accepted.
    fn drop(&mut self) {
        self.shared.request_drain();
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
