//! Retry Scheduler
//!
//! Passive holding area for operations waiting out a backoff delay. Nothing
//! here runs on its own; the executor drains due entries inside
//! `process_retries`. Entries are lost if the process exits.

use crate::operation::OperationContext;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::time::Instant;

struct Scheduled {
    due: Option<Instant>,
    seq: u64,
    context: OperationContext,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    /// BinaryHeap is a max-heap: the earliest deadline must compare as Greater.
    /// `None` (eligible now) sorts before any deadline; ties go to the older entry.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.due, other.due) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => b.cmp(&a),
        }
        .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Operations keyed by their next eligible retry time.
#[derive(Default)]
pub struct RetryQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, context: OperationContext) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            due: context.next_retry_at(),
            seq,
            context,
        });
    }

    /// Remove and return every entry due at or before `now`.
    pub fn drain_due(&mut self, now: Instant) -> Vec<OperationContext> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if !top.context.is_due(now) {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                due.push(entry.context);
            }
        }
        due
    }

    /// Earliest pending deadline, if any entry waits.
    pub fn next_due(&self) -> Option<Instant> {
        self.heap
            .peek()
            .map(|top| top.due.unwrap_or_else(Instant::now))
    }

    /// Drop everything still waiting, returning how many entries were lost.
    pub fn abandon(&mut self) -> usize {
        let lost = self.heap.len();
        self.heap.clear();
        lost
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
