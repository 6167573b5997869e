//! The tick source: sleeps until each deadline and advances the logical clock.

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

use crate::{LogicalClock, TickConfig, TickPolicy};

/// One tick, as handed to the host loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Logical clock after this tick, in milliseconds. Feed this to
    /// `service_timers`.
    pub now_ms: u64,
    /// Fixed tick length.
    pub dt: Duration,
    /// The host woke up more than 10% of a tick late.
    pub overrun: bool,
    /// Missed ticks folded into this one. Their time is still added to
    /// the clock.
    pub ticks_skipped: u64,
}

/// Counters updated by [`TickSource::next_tick`] and
/// [`TickSource::record_tick_end`].
#[derive(Debug, Clone, Default)]
pub struct TickStats {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of host work per tick (α = 0.1).
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Last tick's work as a fraction of the tick budget.
    pub budget_utilization: f64,
}

/// Fixed-rate wakeups plus the logical clock they advance.
pub struct TickSource {
    config: TickConfig,
    tick_duration: Duration,
    tick_count: u64,
    next_deadline: TokioInstant,
    work_started: Option<Instant>,
    paused: bool,
    clock: LogicalClock,
    stats: TickStats,
}

impl TickSource {
    pub fn new(config: TickConfig) -> Self {
        Self::with_clock(config, LogicalClock::default())
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Start from an existing clock value instead of zero.
    pub fn with_clock(config: TickConfig, clock: LogicalClock) -> Self {
        let config = config.validated();
        let tick_duration = config.tick_duration();
        let jitter = match config.initial_jitter_us {
            0 => Duration::ZERO,
            max => Duration::from_micros(rand::rng().random_range(0..max)),
        };

        debug!(
            rate_hz = config.tick_rate_hz,
            tick_ms = tick_duration.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            start_ms = clock.now_ms(),
            "tick source created"
        );

        Self {
            next_deadline: TokioInstant::now() + tick_duration + jitter,
            config,
            tick_duration,
            tick_count: 0,
            work_started: None,
            paused: false,
            clock,
            stats: TickStats::default(),
        }
    }

    /// Sleep until the next tick is due, then advance the clock.
    ///
    /// Pends forever while paused, so it is safe to use as one branch of a
    /// `tokio::select!`.
    pub async fn next_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let deadline = self.next_deadline;
        time::sleep_until(deadline).await;

        let woke = TokioInstant::now();
        let dt = self.tick_duration;
        let late_by = woke.saturating_duration_since(deadline);
        let overrun = late_by > dt / 10;
        let behind = if overrun {
            (late_by.as_nanos() / dt.as_nanos()) as u64
        } else {
            0
        };

        let (ticks_skipped, next_deadline) = match self.config.policy {
            TickPolicy::Skip => (behind, woke + dt),
            TickPolicy::CatchUp { max_catchup } if behind <= u64::from(max_catchup) => {
                (0, deadline + dt)
            }
            TickPolicy::CatchUp { max_catchup } => (behind - u64::from(max_catchup), woke + dt),
            TickPolicy::Drop => (0, deadline + dt),
        };
        if behind > 0 {
            warn!(
                tick = self.tick_count + 1,
                behind,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                policy = ?self.config.policy,
                "tick overrun"
            );
        }

        self.next_deadline = next_deadline;
        self.tick_count += 1;
        self.clock.advance(1 + ticks_skipped, dt);
        self.work_started = Some(Instant::now());

        self.stats.total_ticks += 1;
        self.stats.total_skipped += ticks_skipped;
        if overrun {
            self.stats.total_overruns += 1;
        }

        trace!(tick = self.tick_count, now_ms = self.clock.now_ms(), overrun, "tick");

        TickInfo {
            tick: self.tick_count,
            now_ms: self.clock.now_ms(),
            dt,
            overrun,
            ticks_skipped,
        }
    }

    /// Record that the host finished its work for the current tick.
    ///
    /// Feeds budget warnings and the timing stats. A no-op without a
    /// preceding [`next_tick`](Self::next_tick).
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / self.tick_duration.as_secs_f64();
        self.stats.budget_utilization = utilization;

        if utilization >= self.config.budget_critical_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work exceeded budget"
            );
        } else if utilization >= self.config.budget_warn_threshold {
            debug!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work approaching budget"
            );
        }

        self.stats.max_tick_time = self.stats.max_tick_time.max(elapsed);
        let avg = self.stats.avg_tick_time.as_secs_f64();
        self.stats.avg_tick_time =
            Duration::from_secs_f64(avg * 0.9 + elapsed.as_secs_f64() * 0.1);
    }

    /// Stop ticking. The logical clock stands still until
    /// [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, now_ms = self.clock.now_ms(), "tick source paused");
        }
    }

    /// Resume ticking one full tick from now, with no burst of catch-up
    /// ticks for the paused interval. Idempotent.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_deadline = TokioInstant::now() + self.tick_duration;
            debug!(tick = self.tick_count, "tick source resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn stats(&self) -> &TickStats {
        &self.stats
    }
}
