//! The macrotask (timer) queue.

use std::collections::BinaryHeap;
use std::fmt;
use std::time::Duration;

/// Identifier of a queued timer, also its insertion sequence number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    /// Returns the raw sequence number.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timer({})", self.0)
    }
}

/// Callback run when a timer fires.
pub(crate) type TimerCallback = Box<dyn FnOnce() + Send>;

/// A queued timer.
pub(crate) struct TimerEntry {
    /// Virtual time at which the timer becomes runnable
    pub(crate) fire_at: Duration,
    /// Insertion sequence, breaks ties between equal fire times
    pub(crate) id: TimerId,
    pub(crate) callback: TimerCallback,
}

impl fmt::Debug for TimerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEntry")
            .field("fire_at", &self.fire_at)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.id == other.id
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reverse order for min-heap behavior (earliest fire time, then earliest insertion)
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Timers ordered by `(fire_at, insertion sequence)`.
#[derive(Debug, Default)]
pub(crate) struct TimerQueue {
    pending: BinaryHeap<TimerEntry>,
    next_id: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue a callback to fire at `fire_at`.
    pub(crate) fn register(&mut self, fire_at: Duration, callback: TimerCallback) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(TimerEntry {
            fire_at,
            id,
            callback,
        });
        id
    }

    /// Remove a queued timer. Returns `false` if it already fired or never existed.
    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|entry| entry.id != id);
        self.pending.len() != before
    }

    /// Pop the single earliest timer.
    pub(crate) fn pop_earliest(&mut self) -> Option<TimerEntry> {
        self.pending.pop()
    }

    /// Fire time of the earliest timer.
    pub(crate) fn next_fire_at(&self) -> Option<Duration> {
        self.pending.peek().map(|entry| entry.fire_at)
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    /// Removes every queued timer. Ids keep counting from where they were.
    pub(crate) fn clear(&mut self) -> Vec<TimerEntry> {
        std::mem::take(&mut self.pending).into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> TimerCallback {
        Box::new(|| {})
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut queue = TimerQueue::new();
        let id1 = queue.register(Duration::from_millis(10), noop());
        let id2 = queue.register(Duration::from_millis(5), noop());
        let id3 = queue.register(Duration::from_millis(15), noop());

        assert_eq!(id1.as_u64(), 0);
        assert_eq!(id2.as_u64(), 1);
        assert_eq!(id3.as_u64(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_earliest_fire_time_first() {
        let mut queue = TimerQueue::new();
        queue.register(Duration::from_millis(10), noop());
        queue.register(Duration::from_millis(5), noop());
        queue.register(Duration::from_millis(15), noop());

        assert_eq!(queue.next_fire_at(), Some(Duration::from_millis(5)));
        let fired: Vec<_> = std::iter::from_fn(|| queue.pop_earliest())
            .map(|entry| entry.fire_at.as_millis())
            .collect();
        assert_eq!(fired, vec![5, 10, 15]);
    }

    #[test]
    fn test_ties_broken_by_insertion_order() {
        let mut queue = TimerQueue::new();
        let first = queue.register(Duration::from_millis(100), noop());
        let second = queue.register(Duration::from_millis(100), noop());
        let third = queue.register(Duration::from_millis(100), noop());

        assert_eq!(queue.pop_earliest().map(|e| e.id), Some(first));
        assert_eq!(queue.pop_earliest().map(|e| e.id), Some(second));
        assert_eq!(queue.pop_earliest().map(|e| e.id), Some(third));
        assert!(queue.pop_earliest().is_none());
    }

    #[test]
    fn test_cancel() {
        let mut queue = TimerQueue::new();
        let id1 = queue.register(Duration::from_millis(1), noop());
        let id2 = queue.register(Duration::from_millis(2), noop());

        assert!(queue.cancel(id1));
        assert!(!queue.cancel(id1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop_earliest().map(|e| e.id), Some(id2));
    }

    #[test]
    fn test_timer_id_display() {
        let mut queue = TimerQueue::new();
        let id = queue.register(Duration::ZERO, noop());
        assert_eq!(id.to_string(), "Timer(0)");
    }

    #[test]
    fn test_clear_keeps_id_sequence() {
        let mut queue = TimerQueue::new();
        queue.register(Duration::from_millis(10), noop());
        queue.register(Duration::from_millis(20), noop());

        assert_eq!(queue.clear().len(), 2);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.next_fire_at(), None);
        assert_eq!(queue.register(Duration::ZERO, noop()).as_u64(), 2);
    }
}
