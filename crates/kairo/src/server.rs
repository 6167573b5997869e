//! `ServerLoop` builder and the host main loop.
//!
//! Ties the tick source to the timer engine: every tick advances the
//! logical clock and drains the timers that came due.

use std::future::Future;

use kairo_tick::{LogicalClock, TickConfig, TickSource};
use kairo_timer::{Dispatcher, SavedTimer, Scheduler, TimerConfig};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{KairoError, LoopConfig};

/// Totals for one [`ServerLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub fired: usize,
    pub failed: usize,
    /// Logical clock when the loop stopped.
    pub now_ms: u64,
}

/// Clock position plus every pending timer, as written by
/// [`ServerLoop::save`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    pub now_ms: u64,
    pub timers: Vec<SavedTimer>,
}

/// Commands a [`LoopHandle`] sends into a running loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopCommand {
    Pause,
    Resume,
    Quit,
}

const COMMAND_CHANNEL_SIZE: usize = 16;

/// Handle to a [`ServerLoop`], usable from other tasks while it runs.
///
/// Cheap to clone. Commands are applied between ticks, never during a
/// drain.
#[derive(Clone)]
pub struct LoopHandle {
    sender: mpsc::Sender<LoopCommand>,
}

impl LoopHandle {
    /// Freeze every timer countdown. See [`ServerLoop::pause`].
    pub async fn pause(&self) -> Result<(), KairoError> {
        self.send(LoopCommand::Pause).await
    }

    /// Resume timer countdowns. See [`ServerLoop::resume`].
    pub async fn resume(&self) -> Result<(), KairoError> {
        self.send(LoopCommand::Resume).await
    }

    /// Stop the loop after the current tick.
    pub async fn quit(&self) -> Result<(), KairoError> {
        self.send(LoopCommand::Quit).await
    }

    async fn send(&self, command: LoopCommand) -> Result<(), KairoError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| KairoError::LoopClosed)
    }
}

/// Builder for a [`ServerLoop`].
///
/// ```rust,ignore
/// let server = ServerLoop::builder()
///     .tick_rate(20)
///     .timer_config(TimerConfig::with_max_timers(10_000))
///     .build(my_dispatcher);
/// ```
pub struct ServerLoopBuilder {
    config: LoopConfig,
}

impl ServerLoopBuilder {
    pub fn new() -> Self {
        Self {
            config: LoopConfig::default(),
        }
    }

    /// Start from a loaded config.
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tick_rate(mut self, tick_rate_hz: u32) -> Self {
        self.config.tick.tick_rate_hz = tick_rate_hz;
        self
    }

    pub fn tick_config(mut self, tick: TickConfig) -> Self {
        self.config.tick = tick;
        self
    }

    pub fn timer_config(mut self, timers: TimerConfig) -> Self {
        self.config.timers = timers;
        self
    }

    /// Build an empty loop around `dispatcher`.
    pub fn build<D: Dispatcher>(self, dispatcher: D) -> ServerLoop<D> {
        ServerLoop::assemble(
            TickSource::new(self.config.tick),
            Scheduler::new(self.config.timers, dispatcher),
        )
    }

    /// Build a loop that resumes from a [`SavedState`]: the clock picks up
    /// where it stopped and every saved timer is reloaded under its id.
    pub fn restore<D: Dispatcher>(
        self,
        dispatcher: D,
        state: &SavedState,
    ) -> Result<ServerLoop<D>, KairoError> {
        let mut scheduler = Scheduler::new(self.config.timers, dispatcher);
        scheduler.timers_mut().set_now(state.now_ms);
        scheduler.restore_timers(&state.timers)?;
        let ticks = TickSource::with_clock(self.config.tick, LogicalClock::starting_at(state.now_ms));
        Ok(ServerLoop::assemble(ticks, scheduler))
    }
}

impl Default for ServerLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The host main loop: one tick source, one timer scheduler.
pub struct ServerLoop<D: Dispatcher> {
    ticks: TickSource,
    scheduler: Scheduler<D>,
    sender: mpsc::Sender<LoopCommand>,
    commands: mpsc::Receiver<LoopCommand>,
}

impl<D: Dispatcher> ServerLoop<D> {
    pub fn builder() -> ServerLoopBuilder {
        ServerLoopBuilder::new()
    }

    fn assemble(ticks: TickSource, scheduler: Scheduler<D>) -> Self {
        let (sender, commands) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        Self {
            ticks,
            scheduler,
            sender,
            commands,
        }
    }

    /// A handle for pausing, resuming, or stopping the loop from another
    /// task.
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            sender: self.sender.clone(),
        }
    }

    pub fn scheduler(&self) -> &Scheduler<D> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler<D> {
        &mut self.scheduler
    }

    pub fn ticks(&self) -> &TickSource {
        &self.ticks
    }

    /// Direct access to the tick source.
    ///
    /// Pausing the tick source freezes the logical clock itself and stalls
    /// [`run`](Self::run) until it resumes. To freeze game timers while the
    /// clock keeps running, use [`pause`](Self::pause).
    pub fn ticks_mut(&mut self) -> &mut TickSource {
        &mut self.ticks
    }

    /// Freeze every timer countdown at the current logical time. The tick
    /// source keeps running, so the loop stays responsive to quit and
    /// shutdown. Idempotent.
    pub fn pause(&mut self) {
        let now = self.ticks.now_ms();
        self.scheduler.pause_timers(now);
    }

    /// Resume timer countdowns. Also resumes the tick source if it was
    /// paused directly. Idempotent.
    pub fn resume(&mut self) {
        self.ticks.resume();
        let now = self.ticks.now_ms();
        self.scheduler.unpause_timers(now);
    }

    pub fn is_paused(&self) -> bool {
        self.scheduler.timers().is_paused()
    }

    /// Ask the loop to stop after the current tick.
    pub fn quit(&mut self) {
        self.scheduler.timers_mut().quit_timer_loop();
    }

    fn apply(&mut self, command: LoopCommand) {
        tracing::debug!(?command, now_ms = self.ticks.now_ms(), "loop command");
        match command {
            LoopCommand::Pause => self.pause(),
            LoopCommand::Resume => self.resume(),
            LoopCommand::Quit => self.quit(),
        }
    }

    /// Run until a timer callback (or [`quit`](Self::quit)) asks to stop,
    /// then tear the timer state down.
    pub async fn run(&mut self) -> LoopSummary {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Like [`run`](Self::run), but also stops when `shutdown` resolves.
    ///
    /// Teardown only happens between drains: a shutdown signal that
    /// arrives while timers are being delivered takes effect after that
    /// tick's drain has returned.
    pub async fn run_until(&mut self, shutdown: impl Future<Output = ()>) -> LoopSummary {
        tokio::pin!(shutdown);
        let mut summary = LoopSummary::default();
        tracing::info!(
            rate_hz = self.ticks.tick_rate_hz(),
            now_ms = self.ticks.now_ms(),
            active = self.scheduler.num_active_timers(),
            "server loop running"
        );

        while !self.scheduler.timers().quit_requested() {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown signal received");
                    self.quit();
                }
                Some(command) = self.commands.recv() => {
                    self.apply(command);
                }
                tick = self.ticks.next_tick() => {
                    let report = self.scheduler.service_timers(tick.now_ms);
                    self.ticks.record_tick_end();
                    summary.ticks += 1;
                    summary.fired += report.fired;
                    summary.failed += report.failed;
                }
            }
        }

        summary.now_ms = self.ticks.now_ms();
        tracing::info!(
            ticks = summary.ticks,
            fired = summary.fired,
            failed = summary.failed,
            pending = self.scheduler.num_active_timers(),
            "server loop stopped"
        );
        self.scheduler.clear();
        summary
    }

    /// Capture the clock and all pending timers.
    pub fn save(&self) -> Result<SavedState, KairoError> {
        Ok(SavedState {
            now_ms: self.ticks.now_ms(),
            timers: self.scheduler.save_timers()?,
        })
    }

    /// [`save`](Self::save), serialized as JSON.
    pub fn save_json(&self) -> Result<String, KairoError> {
        Ok(serde_json::to_string_pretty(&self.save()?)?)
    }
}
