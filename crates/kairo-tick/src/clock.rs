//! Logical millisecond clock.

use std::time::Duration;

/// Monotonic game clock advanced in whole ticks.
///
/// Elapsed time is accumulated as a `Duration` and only truncated to
/// milliseconds when read, so rates that do not divide a second evenly
/// (60 Hz, 128 Hz) do not drift.
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    elapsed: Duration,
}

impl LogicalClock {
    /// Start counting from `now_ms` instead of zero, e.g. after a restore.
    pub fn starting_at(now_ms: u64) -> Self {
        Self {
            elapsed: Duration::from_millis(now_ms),
        }
    }

    pub fn advance(&mut self, ticks: u64, tick: Duration) {
        let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
        self.elapsed = self.elapsed.saturating_add(tick.saturating_mul(ticks));
    }

    /// Milliseconds since the clock started.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sixty_hz_does_not_drift() {
        let mut clock = LogicalClock::default();
        let tick = Duration::from_secs(1) / 60;
        for _ in 0..60 * 60 {
            clock.advance(1, tick);
        }
        // One minute of ticks. 1/60 s truncates to 16_666_666 ns, which
        // loses well under a millisecond over 3600 ticks.
        assert_eq!(clock.elapsed(), Duration::from_nanos(16_666_666 * 3_600));
        assert!((59_999..=60_000).contains(&clock.now_ms()));
    }

    #[test]
    fn test_advance_many_ticks() {
        let mut clock = LogicalClock::starting_at(1_000);
        clock.advance(4, Duration::from_millis(50));
        assert_eq!(clock.now_ms(), 1_200);
    }
}
