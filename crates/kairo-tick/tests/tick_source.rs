//! Integration tests for the tick source.
//!
//! Uses paused Tokio time so `sleep_until` resolves as soon as the runtime
//! auto-advances the clock.

use std::time::Duration;

use kairo_tick::{LogicalClock, TickConfig, TickPolicy, TickSource};

// =========================================================================
// Helpers
// =========================================================================

fn source_20hz() -> TickSource {
    TickSource::new(TickConfig {
        initial_jitter_us: 0,
        ..TickConfig::with_rate(20)
    })
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_initial_state() {
    let s = source_20hz();
    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.now_ms(), 0);
    assert_eq!(s.tick_rate_hz(), 20);
    assert_eq!(s.tick_duration(), Duration::from_millis(50));
    assert!(!s.is_paused());
}

#[test]
fn test_zero_rate_is_not_event_driven() {
    let s = TickSource::with_rate(0);
    assert_eq!(s.tick_rate_hz(), TickConfig::DEFAULT_TICK_RATE_HZ);
}

// =========================================================================
// Ticking
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_ticks_advance_logical_clock() {
    let mut s = source_20hz();
    for expected in 1..=4u64 {
        let info = s.next_tick().await;
        assert_eq!(info.tick, expected);
        assert_eq!(info.now_ms, expected * 50);
        assert_eq!(info.dt, Duration::from_millis(50));
        assert!(!info.overrun);
    }
    assert_eq!(s.now_ms(), 200);
}

#[tokio::test(start_paused = true)]
async fn test_clock_can_start_from_restored_value() {
    let mut s = TickSource::with_clock(
        TickConfig {
            initial_jitter_us: 0,
            ..TickConfig::with_rate(10)
        },
        LogicalClock::starting_at(5_000),
    );
    assert_eq!(s.next_tick().await.now_ms, 5_100);
}

#[tokio::test(start_paused = true)]
async fn test_skip_policy_folds_missed_ticks_into_clock() {
    let mut s = source_20hz();
    s.next_tick().await;

    // Host stalls for four ticks' worth of time past the next deadline.
    tokio::time::advance(Duration::from_millis(250)).await;
    let info = s.next_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 4);
    assert_eq!(info.now_ms, 50 * 6);
    assert_eq!(s.stats().total_overruns, 1);
    assert_eq!(s.stats().total_skipped, 4);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_advances_one_tick() {
    let mut s = TickSource::new(TickConfig {
        initial_jitter_us: 0,
        policy: TickPolicy::Drop,
        ..TickConfig::with_rate(20)
    });
    s.next_tick().await;
    tokio::time::advance(Duration::from_millis(250)).await;
    let info = s.next_tick().await;

    assert!(info.overrun);
    assert_eq!(info.ticks_skipped, 0);
    assert_eq!(info.now_ms, 100);
}

#[tokio::test(start_paused = true)]
async fn test_catch_up_within_cap_replays_ticks() {
    let mut s = TickSource::new(TickConfig {
        initial_jitter_us: 0,
        policy: TickPolicy::CatchUp { max_catchup: 10 },
        ..TickConfig::with_rate(20)
    });
    s.next_tick().await;
    tokio::time::advance(Duration::from_millis(150)).await;

    let late = s.next_tick().await;
    assert!(late.overrun);
    assert_eq!(late.ticks_skipped, 0);

    // The following deadlines are already in the past and fire at once.
    let start = tokio::time::Instant::now();
    s.next_tick().await;
    s.next_tick().await;
    assert_eq!(tokio::time::Instant::now(), start);
    assert_eq!(s.now_ms(), 200);
}

// =========================================================================
// Pause / resume
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_paused_source_pends_and_clock_stands_still() {
    let mut s = source_20hz();
    s.next_tick().await;
    s.pause();

    let result = tokio::time::timeout(Duration::from_secs(1), s.next_tick()).await;
    assert!(result.is_err(), "paused tick source should pend");
    assert_eq!(s.now_ms(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_without_burst() {
    let mut s = source_20hz();
    s.next_tick().await;
    s.pause();
    tokio::time::advance(Duration::from_secs(10)).await;
    s.resume();

    let info = s.next_tick().await;
    assert_eq!(info.tick, 2);
    assert_eq!(info.now_ms, 100);
    assert!(!info.overrun);
}

#[test]
fn test_pause_resume_idempotent() {
    let mut s = source_20hz();
    s.pause();
    s.pause();
    assert!(s.is_paused());
    s.resume();
    s.resume();
    assert!(!s.is_paused());
}

// =========================================================================
// Stats
// =========================================================================

#[test]
fn test_record_tick_end_without_tick_is_noop() {
    let mut s = source_20hz();
    s.record_tick_end();
    assert_eq!(s.stats().total_ticks, 0);
    assert_eq!(s.stats().max_tick_time, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_tracks_work_time() {
    let mut s = source_20hz();
    s.next_tick().await;
    // Work time is measured on the wall clock, not Tokio's paused clock.
    std::thread::sleep(Duration::from_micros(50));
    s.record_tick_end();

    assert_eq!(s.stats().total_ticks, 1);
    assert!(s.stats().max_tick_time > Duration::ZERO);
    assert!(s.stats().budget_utilization > 0.0);
}
