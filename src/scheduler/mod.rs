//! Render job scheduling.
//!
//! Priority heap, submission coalescing, the queue controller and its
//! worker pool.

mod heap;
mod job;
mod pending;
mod queue;
mod worker;

pub use heap::{JobId, PriorityHeap};
pub use job::{
    BoxError, Job, JobError, JobResult, RenderFn, RenderOutput, ResultRx, Sink, Submission, Tier,
};
pub use pending::{PendingEntry, PendingIndex, Waiters};
pub use queue::{QueueError, QueueStats, RenderQueue, RenderQueueConfig};

#[cfg(test)]
mod test_support;
