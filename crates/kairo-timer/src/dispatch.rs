//! The `Dispatcher` trait and the scoped guards that make delivery
//! reentrancy-safe.

use std::ops::{Deref, DerefMut};

use crate::node::NodeHandle;
use crate::{FiredTimer, MessageId, ObjectId, TimerError, Timers};

/// Why a dispatcher could not deliver a fired timer.
///
/// Reported back to the engine, logged, and counted. Never propagated:
/// a failed delivery does not stop the drain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The receiving object no longer exists.
    #[error("object {0} not found")]
    UnknownObject(ObjectId),

    /// The object exists but refused or failed to handle the message.
    #[error("message rejected: {0}")]
    Rejected(String),

    /// The handler's own timer call failed, e.g. a re-arm hit capacity.
    #[error(transparent)]
    Timer(#[from] TimerError),
}

/// The object/message layer the engine delivers fired timers to.
///
/// Implemented by whatever owns the game's object model. The engine does
/// not interpret object or message ids.
pub trait Dispatcher {
    /// Deliver a fired timer.
    ///
    /// `timers` is the live timer state. The callback may create, delete,
    /// or re-arm timers through it, including the one being delivered,
    /// which is already detached: deleting it returns `false`, looking it
    /// up returns `None`, and [`Timers::current`] still describes it.
    fn deliver(&mut self, timers: &mut Timers, fired: &FiredTimer) -> Result<(), DispatchError>;

    /// Resolve a message name, for loading timers from saved state.
    /// Default: no names known.
    fn message_id(&self, _name: &str) -> Option<MessageId> {
        None
    }

    /// Name a message id, for saving timers. Default: no names known.
    fn message_name(&self, _message_id: MessageId) -> Option<String> {
        None
    }
}

impl<F> Dispatcher for F
where
    F: FnMut(&mut Timers, &FiredTimer) -> Result<(), DispatchError>,
{
    fn deliver(&mut self, timers: &mut Timers, fired: &FiredTimer) -> Result<(), DispatchError> {
        self(timers, fired)
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Marks the timer state as inside a drain for the guard's lifetime.
pub(crate) struct DrainGuard<'a> {
    timers: &'a mut Timers,
}

impl<'a> DrainGuard<'a> {
    pub(crate) fn enter(timers: &'a mut Timers) -> Self {
        timers.in_main_loop = true;
        Self { timers }
    }
}

impl Deref for DrainGuard<'_> {
    type Target = Timers;

    fn deref(&self) -> &Timers {
        self.timers
    }
}

impl DerefMut for DrainGuard<'_> {
    fn deref_mut(&mut self) -> &mut Timers {
        self.timers
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.timers.in_main_loop = false;
    }
}

/// Holds one `garbage_ref` on the node being delivered.
///
/// Dropping the guard (on return or while unwinding out of the
/// dispatcher) releases the reference and frees the node unless the
/// callback re-armed it.
pub(crate) struct DispatchGuard<'a> {
    timers: &'a mut Timers,
    handle: NodeHandle,
    previous: Option<NodeHandle>,
}

impl<'a> DispatchGuard<'a> {
    pub(crate) fn enter(timers: &'a mut Timers, handle: NodeHandle) -> Self {
        timers.retain_node(handle);
        let previous = timers.current.replace(handle);
        Self {
            timers,
            handle,
            previous,
        }
    }
}

impl Deref for DispatchGuard<'_> {
    type Target = Timers;

    fn deref(&self) -> &Timers {
        self.timers
    }
}

impl DerefMut for DispatchGuard<'_> {
    fn deref_mut(&mut self) -> &mut Timers {
        self.timers
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.timers.current = self.previous;
        self.timers.release_node(self.handle);
    }
}
