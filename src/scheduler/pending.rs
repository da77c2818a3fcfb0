//! Submission coalescing.
//!
//! Maps each content key to the one job currently waiting in the heap for
//! it, together with every sink collected from the submissions that merged
//! into that job. Entries are removed the moment a worker pops the job, so
//! later submissions for the key start a new generation.

use std::collections::HashMap;

use super::heap::JobId;
use super::job::{JobResult, Sink};

/// Result sinks accumulated for one job generation.
#[derive(Debug, Default)]
pub struct Waiters {
    sinks: Vec<Option<Sink>>,
}

impl Waiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one submission's sink. Absent sinks still count as a waiter.
    pub fn push(&mut self, sink: Option<Sink>) {
        self.sinks.push(sink);
    }

    /// Number of submissions merged into this generation.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Send one copy of `result` to every present sink.
    ///
    /// Never blocks; receivers that were dropped are skipped. Returns the
    /// number of sinks that accepted the result.
    pub fn broadcast(self, result: &JobResult) -> usize {
        self.sinks
            .into_iter()
            .flatten()
            .filter(|sink| !sink.is_closed())
            .map(|sink| sink.send(result.clone()))
            .filter(Result::is_ok)
            .count()
    }
}

/// A key's queued job plus its waiters.
#[derive(Debug)]
pub struct PendingEntry {
    pub job: JobId,
    pub waiters: Waiters,
}

/// Dedup index: content key to its single queued job.
#[derive(Debug, Default)]
pub struct PendingIndex {
    entries: HashMap<String, PendingEntry>,
}

impl PendingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PendingEntry> {
        self.entries.get_mut(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Start a new generation for `key`.
    pub fn insert(&mut self, key: String, job: JobId, sink: Option<Sink>) {
        let mut waiters = Waiters::new();
        waiters.push(sink);
        let previous = self.entries.insert(key, PendingEntry { job, waiters });
        debug_assert!(previous.is_none(), "key already had a queued job");
    }

    /// Detach the entry for `key` once its job leaves the heap.
    pub fn remove(&mut self, key: &str) -> Option<PendingEntry> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
