//! Telemetry for the render queue.
//!
//! Structured logging, render spans, and metrics. Metrics go through the
//! `metrics` facade; install any recorder to export them.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_coalesced, record_queue_depth, record_render_outcome, record_submitted,
    RenderOutcome,
};
pub use spans::{RenderSpan, SpanExt};
