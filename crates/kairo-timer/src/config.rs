//! Timer engine configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capacity and id allocation settings for a [`Scheduler`](crate::Scheduler).
///
/// The table is sized for an expected peak and exhaustion is an
/// operational limit: creation fails with
/// [`TimerError::CapacityExceeded`](crate::TimerError::CapacityExceeded)
/// instead of growing without bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Maximum number of live timers.
    pub max_timers: usize,

    /// Node slots reserved up front. The store grows past this on demand,
    /// up to `max_timers`.
    pub initial_capacity: usize,

    /// First id handed out after construction or a reset. The id counter
    /// wraps back to this value on overflow.
    pub first_timer_id: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            max_timers: 100_000,
            initial_capacity: 2_000,
            first_timer_id: 1,
        }
    }
}

impl TimerConfig {
    /// Create a config with a specific capacity and default settings otherwise.
    pub fn with_max_timers(max_timers: usize) -> Self {
        Self {
            max_timers,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`Timers::new`](crate::Timers::new):
    /// - `max_timers` is at least 1.
    /// - `max_timers` never exceeds the number of ids in
    ///   `first_timer_id..=u32::MAX`.
    /// - `initial_capacity` never exceeds `max_timers`.
    pub fn validated(mut self) -> Self {
        if self.max_timers == 0 {
            warn!("max_timers is 0, raising to 1");
            self.max_timers = 1;
        }
        let id_range = u64::from(u32::MAX - self.first_timer_id) + 1;
        let id_range = usize::try_from(id_range).unwrap_or(usize::MAX);
        if self.max_timers > id_range {
            warn!(
                max = self.max_timers,
                first_timer_id = self.first_timer_id,
                id_range,
                "max_timers exceeds the id range, clamping"
            );
            self.max_timers = id_range;
        }
        if self.initial_capacity > self.max_timers {
            warn!(
                initial = self.initial_capacity,
                max = self.max_timers,
                "initial_capacity exceeds max_timers, clamping"
            );
            self.initial_capacity = self.max_timers;
        }
        self
    }
}
