//! # Kairo
//!
//! Timer-driven main loop for single-threaded game servers.
//!
//! Game logic schedules delayed and periodic events (respawns, cooldowns,
//! AI think-ticks) on a [`Scheduler`]; the [`ServerLoop`] advances a
//! logical clock at a fixed tick rate and delivers every due timer to the
//! game's [`Dispatcher`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use kairo::prelude::*;
//!
//! # async fn run() -> Result<(), KairoError> {
//! let dispatcher = |timers: &mut Timers, fired: &FiredTimer| -> Result<(), DispatchError> {
//!     // Look up fired.object_id and send it fired.message_id.
//!     timers.rearm_current(1_000)?;
//!     Ok(())
//! };
//! let mut server = kairo::ServerLoopBuilder::new().tick_rate(20).build(dispatcher);
//! server.scheduler_mut().create_timer(ObjectId(1), MessageId(1), 1_000)?;
//! server.run().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod server;

pub use config::LoopConfig;
pub use error::KairoError;
pub use server::{LoopHandle, LoopSummary, SavedState, ServerLoop, ServerLoopBuilder};

pub use kairo_tick::{LogicalClock, TickConfig, TickInfo, TickPolicy, TickSource, TickStats};
pub use kairo_timer::{
    DispatchError, Dispatcher, FiredTimer, MessageId, ObjectId, SavedTimer, Scheduler,
    ServiceReport, TimerConfig, TimerError, TimerId, TimerInfo, Timers,
};

/// Install a `tracing` subscriber that honours `RUST_LOG`, falling back to
/// `default_filter`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .try_init()
        .is_ok()
}

pub mod prelude {
    pub use crate::{
        DispatchError, Dispatcher, FiredTimer, KairoError, LoopConfig, MessageId, ObjectId,
        LoopHandle, Scheduler, ServerLoop, TickConfig, TimerConfig, TimerError, TimerId, Timers,
    };
}
