//! Fixed-timestep tick source for Kairo.
//!
//! Wakes the host loop at a configured rate (1–128 Hz) and advances a
//! logical millisecond clock, which is the `now` value the timer engine
//! is serviced with. The engine never reads wall-clock time itself.
//!
//! # Integration
//!
//! ```ignore
//! let mut ticks = TickSource::new(TickConfig::with_rate(20));
//! loop {
//!     let tick = ticks.next_tick().await;
//!     scheduler.service_timers(tick.now_ms);
//!     ticks.record_tick_end();
//! }
//! ```

mod clock;
mod config;
mod source;

pub use clock::LogicalClock;
pub use config::{TickConfig, TickPolicy};
pub use source::{TickInfo, TickSource, TickStats};
