//! Metric names and recording helpers.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

use crate::scheduler::Tier;

const SUBMITTED: &str = "render_queue_submitted_total";
const COALESCED: &str = "render_queue_coalesced_total";
const COMPLETED: &str = "render_queue_completed_total";
const DEPTH: &str = "render_queue_depth";
const RENDER_MS: &str = "render_queue_render_ms";

/// How a single render invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Ok,
    Error,
    Panic,
}

impl RenderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Panic => "panic",
        }
    }
}

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(SUBMITTED, "Submissions accepted by the render queue");
    describe_counter!(COALESCED, "Submissions merged into an already queued job");
    describe_counter!(COMPLETED, "Render invocations finished, by outcome");
    describe_gauge!(DEPTH, "Jobs waiting in the priority heap");
    describe_histogram!(RENDER_MS, Unit::Milliseconds, "Render callback latency");
}

pub fn record_submitted(tier: Tier) {
    counter!(SUBMITTED, "tier" => tier.as_str()).increment(1);
}

pub fn record_coalesced(tier: Tier) {
    counter!(COALESCED, "tier" => tier.as_str()).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!(DEPTH).set(depth as f64);
}

pub fn record_render_outcome(outcome: RenderOutcome, latency_ms: u64) {
    counter!(COMPLETED, "outcome" => outcome.as_str()).increment(1);
    histogram!(RENDER_MS).record(latency_ms as f64);
}
