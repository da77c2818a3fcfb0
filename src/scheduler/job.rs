//! Render job and result types.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type returned by render callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Outcome delivered to every sink of a job generation.
pub type JobResult = Result<RenderOutput, JobError>;

/// Sending half of a result sink. Delivery never blocks.
pub type Sink = tokio::sync::oneshot::Sender<JobResult>;
/// Receiving half for awaiting a job result.
pub type ResultRx = tokio::sync::oneshot::Receiver<JobResult>;

/// Render callback shared by all workers.
pub type RenderFn = Arc<dyn Fn(&str) -> Result<String, BoxError> + Send + Sync>;

/// Priority class of a job. Interactive always dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Editorial requests with a user waiting on the result.
    Interactive = 0,
    /// Bulk or administrative rerendering.
    Background = 1,
}

impl Default for Tier {
    fn default() -> Self {
        Self::Background
    }
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Background => "background",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of render work.
#[derive(Clone)]
pub struct Job {
    /// Content identity used for coalescing. Must be non-empty.
    pub key: String,
    /// Opaque payload version, e.g. a revision number.
    pub version_tag: u64,
    /// Text handed to the render callback.
    pub payload: String,
    pub tier: Tier,
    /// Arrival time; earlier jobs win within a tier.
    pub submitted_at: Instant,
    /// Arrival sequence, breaks exact `submitted_at` ties.
    pub(crate) seq: u64,
    /// Position in the heap's order array, kept current by every swap.
    pub(crate) slot: usize,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("key", &self.key)
            .field("version_tag", &self.version_tag)
            .field("tier", &self.tier)
            .field("payload_len", &self.payload.len())
            .field("slot", &self.slot)
            .finish()
    }
}

impl Job {
    /// Create a job stamped with the current time.
    pub fn new(key: impl Into<String>, payload: impl Into<String>, tier: Tier) -> Self {
        Self {
            key: key.into(),
            version_tag: 0,
            payload: payload.into(),
            tier,
            submitted_at: Instant::now(),
            seq: 0,
            slot: 0,
        }
    }

    pub fn interactive(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(key, payload, Tier::Interactive)
    }

    pub fn background(key: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(key, payload, Tier::Background)
    }

    pub fn with_version(mut self, version_tag: u64) -> Self {
        self.version_tag = version_tag;
        self
    }

    pub fn with_submitted_at(mut self, submitted_at: Instant) -> Self {
        self.submitted_at = submitted_at;
        self
    }

    /// Dispatch order: tier, then arrival time, then arrival sequence.
    pub(crate) fn dispatch_order(&self, other: &Self) -> Ordering {
        self.tier
            .cmp(&other.tier)
            .then_with(|| self.submitted_at.cmp(&other.submitted_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Successful render of one job generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    pub key: String,
    /// Version tag of the payload that was actually rendered.
    pub version_tag: u64,
    pub output: String,
}

/// Per-job failure. Cloned to every sink of the generation.
#[derive(Debug, Clone, Error)]
pub enum JobError {
    /// Error returned by the render callback, unmodified.
    #[error("{0}")]
    Render(Arc<dyn std::error::Error + Send + Sync>),
    #[error("render panicked: {message}")]
    Panicked { message: String },
}

impl JobError {
    /// The callback's own error value, for downcasting.
    pub fn render_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            Self::Render(err) => Some(err.as_ref()),
            Self::Panicked { .. } => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, Self::Panicked { .. })
    }

    /// Short label for logs and spans: `render` or `panic`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Render(_) => "render",
            Self::Panicked { .. } => "panic",
        }
    }
}

impl From<BoxError> for JobError {
    fn from(err: BoxError) -> Self {
        Self::Render(Arc::from(err))
    }
}

/// How a submission was absorbed by the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new pending entry was created and a worker signalled.
    Queued,
    /// Merged into a job with the same key that was still waiting.
    Coalesced,
}
