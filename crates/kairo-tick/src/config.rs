//! Tick source configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What to do when the host wakes up later than the tick deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickPolicy {
    /// Fold the missed ticks into this one: the logical clock jumps by
    /// every elapsed tick and the next deadline is measured from now.
    #[default]
    Skip,
    /// Fire up to `max_catchup` missed ticks back to back, then skip the
    /// rest.
    CatchUp { max_catchup: u32 },
    /// Ignore the overrun. The clock advances one tick and the next
    /// deadline stays on the original cadence.
    Drop,
}

/// Configuration for a [`TickSource`](crate::TickSource).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Tick rate in Hz.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick budget (0.0–1.0) past which a drain logs a
    /// warning.
    pub budget_warn_threshold: f64,
    /// Fraction of the tick budget past which a drain is reported critical.
    pub budget_critical_threshold: f64,
    /// Random delay (0–max µs) before the first tick, so worlds started
    /// together do not tick in lockstep.
    pub initial_jitter_us: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: Self::DEFAULT_TICK_RATE_HZ,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            budget_critical_threshold: 1.0,
            initial_jitter_us: 2_000,
        }
    }
}

impl TickConfig {
    pub const DEFAULT_TICK_RATE_HZ: u32 = 20;
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values. Called by [`TickSource::new`](crate::TickSource::new).
    ///
    /// - `tick_rate_hz` is forced into `1..=MAX_TICK_RATE_HZ`; 0 falls back
    ///   to the default rate since the timer clock must keep moving.
    /// - Thresholds are clamped to `0.0..=1.0`, warn never above critical.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz == 0 {
            warn!(
                fallback = Self::DEFAULT_TICK_RATE_HZ,
                "tick_rate_hz is 0, using default rate"
            );
            self.tick_rate_hz = Self::DEFAULT_TICK_RATE_HZ;
        } else if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick_rate_hz exceeds maximum, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self.budget_critical_threshold = self.budget_critical_threshold.clamp(0.0, 1.0);
        self.budget_warn_threshold = self
            .budget_warn_threshold
            .min(self.budget_critical_threshold);
        self
    }

    /// Length of one tick. Assumes a validated, non-zero rate.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate_hz.max(1)
    }
}
