//! Timers registered by a script.
//!
//! A run never advances time, so nothing here ever fires. The queue exists so
//! `clearTimeout` behaves and the leftovers can be counted when the run is
//! discarded.

use super::value::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

struct TimerEntry {
    id: u32,
    fire_at_ms: u64,
    // Kept so the callback and its arguments live as long as the timer.
    #[allow(dead_code)]
    callback: Value,
    #[allow(dead_code)]
    arguments: Vec<Value>,
    #[allow(dead_code)]
    interval_ms: Option<u64>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at_ms == other.fire_at_ms && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on fire time, registration order breaks ties.
        other
            .fire_at_ms
            .cmp(&self.fire_at_ms)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Default)]
pub struct TimerQueue {
    next_id: u32,
    pending: BinaryHeap<TimerEntry>,
}

impl TimerQueue {
    /// Returns the id handed back to the script.
    pub fn register(&mut self, callback: Value, delay_ms: f64, arguments: Vec<Value>, repeat: bool) -> u32 {
        self.next_id += 1;
        let delay_ms = if delay_ms.is_finite() && delay_ms > 0.0 {
            delay_ms as u64
        } else {
            0
        };
        self.pending.push(TimerEntry {
            id: self.next_id,
            fire_at_ms: delay_ms,
            callback,
            arguments,
            interval_ms: repeat.then_some(delay_ms),
        });
        self.next_id
    }

    pub fn clear(&mut self, id: u32) {
        self.pending.retain(|entry| entry.id != id);
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time until the earliest timer would fire.
    pub fn next_delay(&self) -> Option<u64> {
        self.pending.peek().map(|entry| entry.fire_at_ms)
    }

    /// Drops every timer, returning how many there were.
    pub fn discard(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_and_clearable() {
        let mut timers = TimerQueue::default();
        let first = timers.register(Value::Undefined, 100.0, Vec::new(), false);
        let second = timers.register(Value::Undefined, 10.0, Vec::new(), true);
        assert_eq!((first, second), (1, 2));
        assert_eq!(timers.next_delay(), Some(10));
        timers.clear(second);
        assert_eq!(timers.next_delay(), Some(100));
        assert_eq!(timers.discard(), 1);
        assert!(timers.is_empty());
    }

    #[test]
    fn invalid_delays_become_zero() {
        let mut timers = TimerQueue::default();
        timers.register(Value::Undefined, f64::NAN, Vec::new(), false);
        timers.register(Value::Undefined, -5.0, Vec::new(), false);
        assert_eq!(timers.next_delay(), Some(0));
        assert_eq!(timers.len(), 2);
    }
}
