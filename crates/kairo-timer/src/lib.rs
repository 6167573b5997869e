//! Timer scheduling engine for Kairo.
//!
//! Drives every delayed and periodic in-game event (cooldowns, respawns,
//! AI think-ticks, scripted delays) from inside a single-threaded main loop.
//! Game logic schedules a timer against a logical millisecond clock, the
//! host calls [`Scheduler::service_timers`] once per tick, and every timer
//! whose fire time has arrived is delivered to the injected [`Dispatcher`].
//!
//! # Key types
//!
//! - [`Scheduler`]: owns the timer state and the dispatcher; runs the drain
//! - [`Timers`]: the timer state itself; what a dispatch callback mutates
//! - [`Dispatcher`]: the trait the object/message layer implements
//! - [`TimerConfig`]: capacity and id allocation settings
//! - [`TimerError`]: creation and integrity failures
//!
//! # Reentrancy
//!
//! A dispatch callback receives `&mut Timers` and may create, delete, or
//! re-arm timers, including the one currently firing. The firing node is
//! detached from the heap and the id table before delivery and kept alive
//! by a scoped reference guard until delivery returns (or unwinds).
//!
//! ```
//! use kairo_timer::{DispatchError, FiredTimer, MessageId, ObjectId, Scheduler, TimerConfig, Timers};
//!
//! let mut fired = Vec::new();
//! let mut scheduler = Scheduler::new(
//!     TimerConfig::default(),
//!     |_: &mut Timers, t: &FiredTimer| -> Result<(), DispatchError> {
//!         fired.push(t.object_id);
//!         Ok(())
//!     },
//! );
//! scheduler.create_timer(ObjectId(7), MessageId(1), 50).unwrap();
//! scheduler.service_timers(49);
//! scheduler.service_timers(50);
//! drop(scheduler);
//! assert_eq!(fired, vec![ObjectId(7)]);
//! ```

mod config;
mod dispatch;
mod error;
mod heap;
mod node;
mod pause;
mod scheduler;
mod table;
mod timers;
mod types;

pub use config::TimerConfig;
pub use dispatch::{DispatchError, Dispatcher};
pub use error::TimerError;
pub use scheduler::{Scheduler, ServiceReport};
pub use timers::Timers;
pub use types::{FiredTimer, MessageId, ObjectId, SavedTimer, TimerId, TimerInfo};
