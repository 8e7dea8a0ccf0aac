//! Heterogeneous event queue.
//!
//! The scheduler orders actor actions, the global micro barrier, and
//! per-subvolume mesoscopic events on one priority queue. Ties in time
//! are broken deterministically by event class (actor < micro < meso <
//! progress) and then by key, which makes runs with the same seed
//! reproduce byte-for-byte.
//!
//! Mesoscopic and actor entries are invalidated lazily: each carries the
//! generation of the state it was drawn from, and stale entries are
//! skipped at pop time instead of being removed from the heap.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use log::warn;

/// What happens when an event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// An actor performs its next action or emission.
    Actor(usize),
    /// The global microscopic barrier: every micro region advances one
    /// step.
    Micro,
    /// The putative next event of one mesoscopic subvolume.
    Meso(usize),
    /// Emit a progress report.
    Progress,
}

impl EventKind {
    /// Deterministic tie-break rank: actor < micro < meso < progress.
    #[inline]
    fn class(self) -> (u8, usize) {
        match self {
            EventKind::Actor(i) => (0, i),
            EventKind::Micro => (1, 0),
            EventKind::Meso(i) => (2, i),
            EventKind::Progress => (3, 0),
        }
    }
}

/// One scheduled event.
#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    /// Generation of the issuing state; stale entries are skipped.
    pub generation: u64,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.kind.class().cmp(&other.kind.class()))
            .then_with(|| self.generation.cmp(&other.generation))
    }
}

/// Priority queue over simulation events with a monotonicity check.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Event>>,
    last_time: f64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue {
            heap: BinaryHeap::new(),
            last_time: 0.0,
        }
    }

    pub fn push(&mut self, event: Event) {
        if event.time.is_finite() {
            self.heap.push(Reverse(event));
        }
    }

    /// Pops the earliest event. Event times must never move backwards;
    /// a violation indicates a scheduling bug and is reported once per
    /// occurrence.
    pub fn pop(&mut self) -> Option<Event> {
        let Reverse(event) = self.heap.pop()?;
        if event.time < self.last_time {
            warn!(
                "event time moved backwards: {} after {}",
                event.time, self.last_time
            );
        } else {
            self.last_time = event.time;
        }
        Some(event)
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(time: f64, kind: EventKind) -> Event {
        Event {
            time,
            kind,
            generation: 0,
        }
    }

    #[test]
    fn test_pop_order_is_chronological() {
        let mut q = EventQueue::new();
        q.push(ev(3.0, EventKind::Micro));
        q.push(ev(1.0, EventKind::Meso(4)));
        q.push(ev(2.0, EventKind::Actor(0)));
        assert_eq!(q.pop().unwrap().time, 1.0);
        assert_eq!(q.pop().unwrap().time, 2.0);
        assert_eq!(q.pop().unwrap().time, 3.0);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_tie_break_actor_micro_meso() {
        let mut q = EventQueue::new();
        q.push(ev(1.0, EventKind::Meso(0)));
        q.push(ev(1.0, EventKind::Micro));
        q.push(ev(1.0, EventKind::Actor(2)));
        q.push(ev(1.0, EventKind::Actor(0)));
        assert_eq!(q.pop().unwrap().kind, EventKind::Actor(0));
        assert_eq!(q.pop().unwrap().kind, EventKind::Actor(2));
        assert_eq!(q.pop().unwrap().kind, EventKind::Micro);
        assert_eq!(q.pop().unwrap().kind, EventKind::Meso(0));
    }

    #[test]
    fn test_infinite_times_are_dropped() {
        let mut q = EventQueue::new();
        q.push(ev(f64::INFINITY, EventKind::Meso(1)));
        assert!(q.is_empty());
    }

    #[test]
    fn test_meso_tie_break_by_id() {
        let mut q = EventQueue::new();
        q.push(ev(0.5, EventKind::Meso(7)));
        q.push(ev(0.5, EventKind::Meso(3)));
        assert_eq!(q.pop().unwrap().kind, EventKind::Meso(3));
        assert_eq!(q.pop().unwrap().kind, EventKind::Meso(7));
    }
}
