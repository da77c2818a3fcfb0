//! Queue lifecycle state machine.
//!
//! `Open` accepts submissions. `shutdown` moves the queue to `Draining`,
//! where queued and in-flight jobs still complete but nothing new is
//! accepted. The queue becomes `Closed` once the heap is empty and no
//! worker is rendering.

use serde::Serialize;

/// Lifecycle state of a render queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueState {
    Open,
    Draining,
    Closed,
}

impl Default for QueueState {
    fn default() -> Self {
        Self::Open
    }
}

impl QueueState {
    /// Check if accepting new submissions.
    pub fn is_accepting(&self) -> bool {
        *self == Self::Open
    }

    /// Stop accepting work. Returns true on the first call only.
    pub fn begin_drain(&mut self) -> bool {
        if *self != Self::Open {
            return false;
        }
        *self = Self::Draining;
        true
    }

    /// Close once draining has nothing left. Returns true on transition.
    pub fn finish_drain(&mut self, queued: usize, active: usize) -> bool {
        if *self != Self::Draining || queued > 0 || active > 0 {
            return false;
        }
        *self = Self::Closed;
        true
    }
}
