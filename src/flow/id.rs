//! Identity types for the flow system.
//!
//! `NodeId` is a newtype over `u32` that doubles as a direct index into
//! `Flow::nodes`. `TimerHandle` is an opaque, monotonically increasing
//! ticket handed out by the timer queue.

use std::fmt;

/// Index into `Flow::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Handle for a scheduled timer. Never reused within one flow.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u64);

impl fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimerHandle({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id() {
        let id = NodeId(42);
        assert_eq!(id.index(), 42);
        assert_eq!(id.to_string(), "NodeId(42)");
    }

    #[test]
    fn test_timer_handle_ordering() {
        assert!(TimerHandle(1) < TimerHandle(2));
        assert_eq!(format!("{:?}", TimerHandle(7)), "TimerHandle(7)");
    }
}
