//! Render spans.

use tracing::{info_span, Span};

use crate::scheduler::{Job, JobResult};

/// Records a render's outcome on its span.
pub trait SpanExt {
    /// Fill in `status`, and `error.kind` plus `error.message` on failure.
    fn record_result(&self, result: &JobResult);
}

impl SpanExt for Span {
    fn record_result(&self, result: &JobResult) {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(err) => {
                self.record("status", "error");
                self.record("error.kind", err.kind());
                self.record("error.message", err.to_string().as_str());
            }
        }
    }
}

/// Factory for render invocation spans.
pub struct RenderSpan;

impl RenderSpan {
    /// Create a span for one render of `job` by `worker`.
    ///
    /// `status`, `error.kind`, `error.message` and `latency_ms` are filled
    /// in on completion.
    pub fn new(worker: usize, job: &Job, waiters: usize) -> Span {
        info_span!(
            "render_job",
            worker,
            key = %job.key,
            tier = %job.tier,
            version_tag = job.version_tag,
            waiters,
            status = tracing::field::Empty,
            error.kind = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
