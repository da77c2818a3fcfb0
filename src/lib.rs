//! Render Queue
//!
//! Offloads content rendering from request handlers onto a small, fixed
//! pool of worker threads.
//!
//! - **Prioritized**: interactive edits dispatch ahead of background
//!   rerenders; FIFO by arrival within a tier
//! - **Coalescing**: resubmitting a key that is still queued updates the
//!   queued job in place, and every submitter receives the single result
//! - **Contained**: a panicking render fails only its own job
//! - **Drained**: shutdown stops intake immediately but never abandons
//!   accepted work
//!
//! The render function is supplied by the caller; this crate only
//! schedules it.
//!
//! ```no_run
//! use render_queue::{Context, Job, RenderQueue};
//!
//! let queue = RenderQueue::new(2, |markdown: &str| {
//!     Ok::<_, std::convert::Infallible>(format!("<p>{markdown}</p>"))
//! })?;
//! let (_, rx) = queue.submit_with_response(&Context::background(), Job::interactive("post/42", "hello"))?;
//! let rendered = rx.blocking_recv().expect("queue delivers a result")?;
//! assert_eq!(rendered.output, "<p>hello</p>");
//! queue.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod context;
pub mod scheduler;
pub mod shutdown;
pub mod telemetry;

pub use context::{Context, ContextError};
pub use scheduler::{
    Job, JobError, JobResult, QueueError, QueueStats, RenderOutput, RenderQueue, RenderQueueConfig,
    ResultRx, Sink, Submission, Tier,
};
pub use shutdown::QueueState;
