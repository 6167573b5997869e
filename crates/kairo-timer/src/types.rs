//! Identity and payload types shared by the engine and its callers.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier handed to game logic for a scheduled timer.
///
/// Allocated from a monotonic counter and never handed out twice while the
/// first holder is still live.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TimerId(pub u32);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T-{}", self.0)
    }
}

/// The object a timer's message is delivered to. Opaque to the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O-{}", self.0)
    }
}

/// The message delivered when a timer fires. Opaque to the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Read-only snapshot of a live timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerInfo {
    pub timer_id: TimerId,
    pub object_id: ObjectId,
    pub message_id: MessageId,
    /// Absolute fire time on the unpaused clock.
    pub fire_time: u64,
    /// Ticks of unpaused time left before the timer is due (0 if overdue).
    pub remaining: u64,
}

/// The payload passed to [`Dispatcher::deliver`](crate::Dispatcher::deliver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    pub timer_id: TimerId,
    pub object_id: ObjectId,
    pub message_id: MessageId,
    pub fire_time: u64,
}

/// A timer as written out by [`Scheduler::save_timers`](crate::Scheduler::save_timers).
///
/// Carries the message *name* rather than its id so a saved game survives
/// message table renumbering between server builds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTimer {
    pub timer_id: TimerId,
    pub object_id: ObjectId,
    pub message: String,
    /// Unpaused ticks left when the timer was saved.
    pub remaining: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(TimerId(3).to_string(), "T-3");
        assert_eq!(ObjectId(4).to_string(), "O-4");
        assert_eq!(MessageId(5).to_string(), "M-5");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&TimerId(9)).unwrap();
        assert_eq!(json, "9");
    }
}
