//! Queue of deterministic future events.
//!
//! Scheduled events carry an outcome that is fixed when they are scheduled, e.g. "entity X moves
//! to state Y at time T". They complement the stochastic, rate driven events of the sampler.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Clone, Debug)]
pub struct ScheduledEvent<E> {
    pub due: f64,
    seq: u64,
    pub event: E,
}

impl<E> ScheduledEvent<E> {
    pub fn into_event(self) -> E {
        self.event
    }
}

impl<E> PartialEq for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<E> Eq for ScheduledEvent<E> {}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by due time, then by insertion.
        other
            .due
            .total_cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug)]
pub struct EventQueue<E> {
    next_seq: u64,
    events: BinaryHeap<ScheduledEvent<E>>,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    pub fn new() -> Self {
        Self {
            next_seq: 0,
            events: BinaryHeap::new(),
        }
    }

    /// Schedule `event` at `due`. Events with equal due times pop in insertion order.
    pub fn insert(&mut self, due: f64, event: E) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.events.push(ScheduledEvent { due, seq, event });
    }

    /// Check whether a pending event is due strictly before `time`.
    pub fn earliest_due_before(&self, time: f64) -> bool {
        self.peek_due().is_some_and(|due| due < time)
    }

    pub fn peek_due(&self) -> Option<f64> {
        self.events.peek().map(|event| event.due)
    }

    pub fn pop_earliest(&mut self) -> Option<ScheduledEvent<E>> {
        self.events.pop()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_pops_events_in_time_order() {
        let mut queue = EventQueue::new();
        queue.insert(10., "c");
        queue.insert(5., "a");
        queue.insert(7.5, "b");

        assert_eq!(queue.peek_due(), Some(5.));
        let order: Vec<&str> = std::iter::from_fn(|| queue.pop_earliest())
            .map(ScheduledEvent::into_event)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn ties_pop_in_insertion_order() {
        let mut queue = EventQueue::new();
        for label in 0..5 {
            queue.insert(1., label);
        }
        let order: Vec<i32> = std::iter::from_fn(|| queue.pop_earliest())
            .map(|event| event.event)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn due_before_is_strict() {
        let mut queue = EventQueue::new();
        assert!(!queue.earliest_due_before(f64::INFINITY));
        queue.insert(2., ());
        assert!(!queue.earliest_due_before(2.));
        assert!(queue.earliest_due_before(2.0001));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn infinite_due_is_never_before_infinity() {
        let mut queue = EventQueue::new();
        queue.insert(f64::INFINITY, ());
        assert!(!queue.earliest_due_before(f64::INFINITY));
        assert!(!queue.earliest_due_before(1e300));
    }
}
