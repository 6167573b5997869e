//! Error types for the timer engine.

use crate::{MessageId, TimerId};

/// Errors that can occur when creating, loading, or verifying timers.
///
/// A missing timer is deliberately not an error: lookups return `Option`
/// and cancellation returns `bool`, because an event racing its own
/// cancellation is a normal outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerError {
    /// The configured maximum number of outstanding timers is reached.
    #[error("timer capacity exceeded (max {max})")]
    CapacityExceeded { max: usize },

    /// A timer with this id is already live.
    #[error("timer {0} already in use")]
    AlreadyInUse(TimerId),

    /// The dispatcher has no message registered under this name.
    #[error("unknown message name {0:?}")]
    UnknownMessage(String),

    /// The dispatcher has no name for this message id, so it cannot be saved.
    #[error("message {0} has no registered name")]
    UnnamedMessage(MessageId),

    /// A re-arm was requested outside of a dispatch callback.
    #[error("no timer is currently being dispatched")]
    NotDispatching,

    /// Heap or id-table integrity check failed. Never expected in correct
    /// operation.
    #[error("timer invariant violated: {0}")]
    InvariantViolation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_names_limit() {
        let err = TimerError::CapacityExceeded { max: 16 };
        assert_eq!(err.to_string(), "timer capacity exceeded (max 16)");
    }

    #[test]
    fn test_already_in_use_displays_timer_id() {
        let err = TimerError::AlreadyInUse(TimerId(42));
        assert!(err.to_string().contains("T-42"));
    }

    #[test]
    fn test_unknown_message_quotes_name() {
        let err = TimerError::UnknownMessage("Respawn".into());
        assert_eq!(err.to_string(), "unknown message name \"Respawn\"");
    }
}
