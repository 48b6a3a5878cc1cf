//! Deadline-ordered timer queue shared by all nodes of a flow.
//!
//! Cancellation is lazy: cancelled handles are forgotten immediately and
//! their heap entries are skipped when they reach the top. A handle that has
//! been cancelled is never returned by `pop_due`.

use crate::flow::id::{NodeId, TimerHandle};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    node: NodeId,
    deadline: Duration,
}

/// A timer that has come due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    pub handle: TimerHandle,
    pub node: NodeId,
    pub deadline: Duration,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_handle: u64,
    heap: BinaryHeap<Reverse<(Duration, TimerHandle)>>,
    pending: HashMap<TimerHandle, PendingTimer>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a timer for `node` firing at `deadline`.
    pub fn schedule(&mut self, node: NodeId, deadline: Duration) -> TimerHandle {
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.insert(handle, PendingTimer { node, deadline });
        self.heap.push(Reverse((deadline, handle)));
        handle
    }

    /// Cancel a timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    /// Number of live timers owned by `node`.
    pub fn pending_for(&self, node: NodeId) -> usize {
        self.pending.values().filter(|t| t.node == node).count()
    }

    /// Earliest live deadline.
    pub fn next_deadline(&mut self) -> Option<Duration> {
        self.discard_cancelled();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Pop the earliest timer whose deadline is `<= now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<DueTimer> {
        self.discard_cancelled();
        let Reverse((deadline, handle)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        self.heap.pop();
        let timer = self.pending.remove(&handle)?;
        Some(DueTimer {
            handle,
            node: timer.node,
            deadline,
        })
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
    }

    fn discard_cancelled(&mut self) {
        while let Some(Reverse((_, handle))) = self.heap.peek() {
            if self.pending.contains_key(handle) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let mut q = TimerQueue::new();
        let late = q.schedule(NodeId(0), ms(200));
        let early = q.schedule(NodeId(1), ms(100));

        assert_eq!(q.next_deadline(), Some(ms(100)));
        assert!(q.pop_due(ms(50)).is_none());

        let first = q.pop_due(ms(250)).unwrap();
        assert_eq!(first.handle, early);
        assert_eq!(first.node, NodeId(1));
        assert_eq!(q.pop_due(ms(250)).unwrap().handle, late);
        assert!(q.is_empty());
    }

    #[test]
    fn test_equal_deadlines_fire_in_schedule_order() {
        let mut q = TimerQueue::new();
        let a = q.schedule(NodeId(0), ms(10));
        let b = q.schedule(NodeId(0), ms(10));
        assert_eq!(q.pop_due(ms(10)).unwrap().handle, a);
        assert_eq!(q.pop_due(ms(10)).unwrap().handle, b);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut q = TimerQueue::new();
        let h = q.schedule(NodeId(0), ms(10));
        assert!(q.cancel(h));
        assert!(!q.cancel(h));
        assert_eq!(q.next_deadline(), None);
        assert!(q.pop_due(ms(1000)).is_none());
    }
}
