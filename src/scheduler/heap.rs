//! Job prioritization.
//!
//! A binary min-heap over an arena of jobs. Jobs live in stable arena
//! slots addressed by [`JobId`]; the heap itself only permutes ids. Each job
//! records its own position in the order array, so a job whose ordering
//! fields changed can be re-sifted in place without searching.

use std::cmp::Ordering;

use super::job::Job;

/// Stable handle to a job while it sits in the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(usize);

/// Priority heap ordering jobs by (tier, arrival).
#[derive(Debug, Default)]
pub struct PriorityHeap {
    arena: Vec<Option<Job>>,
    free: Vec<usize>,
    order: Vec<JobId>,
    next_seq: u64,
}

impl PriorityHeap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a job, stamping its arrival sequence. O(log n).
    pub fn push(&mut self, mut job: Job) -> JobId {
        job.seq = self.bump_seq();
        job.slot = self.order.len();

        let id = match self.free.pop() {
            Some(index) => {
                self.arena[index] = Some(job);
                JobId(index)
            }
            None => {
                self.arena.push(Some(job));
                JobId(self.arena.len() - 1)
            }
        };

        self.order.push(id);
        self.sift_up(self.order.len() - 1);
        id
    }

    /// Remove and return the highest-priority job. O(log n).
    pub fn pop(&mut self) -> Option<Job> {
        let last = self.order.len().checked_sub(1)?;
        self.swap(0, last);
        let id = self.order.pop()?;
        if !self.order.is_empty() {
            self.sift_down(0);
        }
        self.free.push(id.0);
        self.arena[id.0].take()
    }

    /// Apply `update` to a queued job and restore heap order. O(log n).
    ///
    /// The job is treated as a fresh arrival for tie-breaking. Returns
    /// `false` if `id` is not in the heap.
    pub fn update<F>(&mut self, id: JobId, update: F) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let seq = self.bump_seq();
        let Some(job) = self.job_mut(id) else {
            return false;
        };
        update(job);
        job.seq = seq;
        let slot = job.slot;
        self.fix(slot);
        true
    }

    /// Re-establish heap order after the job at `slot` changed.
    pub fn fix(&mut self, slot: usize) {
        if slot >= self.order.len() {
            return;
        }
        if !self.sift_down(slot) {
            self.sift_up(slot);
        }
    }

    pub fn peek(&self) -> Option<&Job> {
        self.order.first().and_then(|&id| self.get(id))
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.arena.get(id.0).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queued jobs in heap-array order (not dispatch order).
    pub fn iter(&self) -> impl Iterator<Item = &Job> + '_ {
        self.order.iter().filter_map(|&id| self.get(id))
    }

    fn job_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.arena.get_mut(id.0).and_then(Option::as_mut)
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn job_at(&self, slot: usize) -> &Job {
        let id = self.order[slot];
        self.arena[id.0]
            .as_ref()
            .unwrap_or_else(|| unreachable!("heap slot {slot} points at an empty arena cell"))
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.job_at(a).dispatch_order(self.job_at(b)) == Ordering::Less
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.order.swap(a, b);
        for slot in [a, b] {
            let id = self.order[slot];
            if let Some(job) = self.arena[id.0].as_mut() {
                job.slot = slot;
            }
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.less(slot, parent) {
                break;
            }
            self.swap(slot, parent);
            slot = parent;
        }
    }

    /// Returns true if the job moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let len = self.order.len();
        let mut slot = start;
        loop {
            let left = 2 * slot + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) { right } else { left };
            if !self.less(child, slot) {
                break;
            }
            self.swap(slot, child);
            slot = child;
        }
        slot > start
    }
}
