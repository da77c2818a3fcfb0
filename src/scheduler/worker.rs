//! Render worker threads.
//!
//! Each worker pops the highest-priority job, runs the render callback
//! outside the controller lock, and broadcasts one result to every sink of
//! the job's generation. A panicking render is contained to its own job.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};

use super::job::{Job, JobError, JobResult, RenderFn, RenderOutput};
use super::queue::{Dispatch, RenderQueueConfig, Shared};
use crate::telemetry::{self, RenderOutcome, RenderSpan, SpanExt};

thread_local! {
    /// Address of the `Shared` whose worker runs on this thread, 0 elsewhere.
    static WORKER_OF: Cell<usize> = const { Cell::new(0) };
}

fn queue_id(shared: &Shared) -> usize {
    shared as *const Shared as usize
}

/// True when called from a worker thread of the queue owning `shared`.
pub(crate) fn is_worker_of(shared: &Shared) -> bool {
    WORKER_OF.with(|owner| owner.get() == queue_id(shared))
}

/// Spawn `count` named worker threads sharing `shared`.
pub(crate) fn spawn_workers(
    shared: &Arc<Shared>,
    config: &RenderQueueConfig,
    count: usize,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(count);
    for id in 0..count {
        let shared = Arc::clone(shared);
        let mut builder = thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
        if config.stack_size > 0 {
            builder = builder.stack_size(config.stack_size);
        }
        handles.push(builder.spawn(move || worker_loop(id, &shared))?);
    }
    Ok(handles)
}

fn worker_loop(id: usize, shared: &Shared) {
    WORKER_OF.with(|owner| owner.set(queue_id(shared)));
    debug!(worker = id, "render worker started");
    while let Some(dispatch) = shared.next_dispatch() {
        execute(id, shared, dispatch);
    }
    debug!(worker = id, "render worker stopped");
}

fn execute(worker: usize, shared: &Shared, dispatch: Dispatch) {
    let Dispatch { job, waiters } = dispatch;
    let span = RenderSpan::new(worker, &job, waiters.len());
    let _entered = span.enter();

    let start = Instant::now();
    let (result, outcome) = run_render(&shared.render, &job);
    let latency_ms = start.elapsed().as_millis() as u64;

    span.record("latency_ms", latency_ms);
    span.record_result(&result);
    telemetry::record_render_outcome(outcome, latency_ms);

    let delivered = waiters.broadcast(&result);
    debug!(delivered, "render result delivered");
    shared.complete(outcome);
}

/// Invoke the callback once, converting a panic into a job error.
fn run_render(render: &RenderFn, job: &Job) -> (JobResult, RenderOutcome) {
    let payload = job.payload.as_str();
    match panic::catch_unwind(AssertUnwindSafe(|| render.as_ref()(payload))) {
        Ok(Ok(output)) => {
            let output = RenderOutput {
                key: job.key.clone(),
                version_tag: job.version_tag,
                output,
            };
            (Ok(output), RenderOutcome::Ok)
        }
        Ok(Err(err)) => {
            debug!(error = %err, "render returned an error");
            (Err(JobError::from(err)), RenderOutcome::Error)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            warn!(key = %job.key, %message, "render panicked; worker continues");
            (Err(JobError::Panicked { message }), RenderOutcome::Panic)
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
