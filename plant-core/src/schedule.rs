//! Time-ordered event queue that drives every cell on one timeline.
//!
//! Cells never own timers. Instead each cell enqueues typed events with an
//! absolute due time; a single driver pops them in order. Events due at the
//! same instant run in the order they were scheduled.

use crate::types::{CellId, Millis};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GrowthEvent {
    /// Recurring stem growth tick with its period fixed when first scheduled.
    GrowTick { cell: CellId, interval: Millis },
    /// The one-shot stem reproduction.
    Reproduce { cell: CellId },
    /// Recurring leaf ageing tick.
    LeafTick { cell: CellId, interval: Millis },
    /// Final removal of a fallen leaf.
    RemoveLeaf { cell: CellId },
}

impl GrowthEvent {
    pub fn cell(&self) -> CellId {
        match *self {
            GrowthEvent::GrowTick { cell, .. }
            | GrowthEvent::Reproduce { cell }
            | GrowthEvent::LeafTick { cell, .. }
            | GrowthEvent::RemoveLeaf { cell } => cell,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Scheduled {
    pub due_at: Millis,
    seq: u64,
    pub event: GrowthEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    /// Reversed so that `BinaryHeap` pops the earliest event first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_at
            .total_cmp(&self.due_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
    now: Millis,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time: the due time of the last popped event, or the
    /// target of the last [`EventQueue::set_now`].
    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Schedules `event` to run `delay` milliseconds from now.
    ///
    /// Negative or NaN delays run at the current time.
    pub fn schedule_in(&mut self, delay: Millis, event: GrowthEvent) {
        let delay = if delay.is_nan() { 0.0 } else { delay.max(0.0) };
        self.schedule_at(self.now + delay, event);
    }

    pub fn schedule_at(&mut self, due_at: Millis, event: GrowthEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { due_at, seq, event });
    }

    /// Pending events in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Scheduled> {
        self.heap.iter()
    }

    pub fn peek_due(&self) -> Option<Millis> {
        self.heap.peek().map(|s| s.due_at)
    }

    /// Pops the earliest event if it is due at or before `until`, moving the
    /// clock to its due time.
    pub fn pop_due(&mut self, until: Millis) -> Option<Scheduled> {
        if self.heap.peek()?.due_at > until {
            return None;
        }
        let next = self.heap.pop()?;
        self.now = self.now.max(next.due_at);
        Some(next)
    }

    /// Moves the clock forward to `t`; the clock never runs backwards.
    pub fn set_now(&mut self, t: Millis) {
        self.now = self.now.max(t);
    }
}
