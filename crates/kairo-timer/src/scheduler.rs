//! The scheduler: timer state plus the dispatcher, and the drain loop.

use tracing::{debug, trace, warn};

use crate::dispatch::{DispatchGuard, DrainGuard};
use crate::{
    Dispatcher, MessageId, ObjectId, SavedTimer, TimerConfig, TimerError, TimerId, TimerInfo,
    Timers,
};

/// Outcome of one [`Scheduler::service_timers`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceReport {
    /// Timers delivered (successfully or not).
    pub fired: usize,
    /// Deliveries the dispatcher reported as failed.
    pub failed: usize,
    /// A callback asked the host loop to stop.
    pub quit_requested: bool,
}

/// Owns the timer state and the dispatcher fired timers are delivered to.
///
/// One instance per game world. The host calls
/// [`service_timers`](Self::service_timers) once per main-loop iteration.
pub struct Scheduler<D: Dispatcher> {
    timers: Timers,
    dispatcher: D,
}

impl<D: Dispatcher> Scheduler<D> {
    /// Create an empty scheduler.
    pub fn new(config: TimerConfig, dispatcher: D) -> Self {
        Self {
            timers: Timers::new(config),
            dispatcher,
        }
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    /// Consume the scheduler, handing back the dispatcher.
    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// Advance the clock to `now` and deliver every timer that is due.
    ///
    /// Timers fire in ascending fire-time order, ties in creation order.
    /// A timer a callback creates that is already due fires later in the
    /// same call. Nothing fires while paused. The drain stops early if a
    /// callback calls [`Timers::quit_timer_loop`].
    pub fn service_timers(&mut self, now: u64) -> ServiceReport {
        self.timers.set_now(now);
        let mut report = ServiceReport {
            quit_requested: self.timers.quit_requested(),
            ..Default::default()
        };
        if self.timers.is_paused() {
            return report;
        }

        let mut drain = DrainGuard::enter(&mut self.timers);
        while !drain.quit_requested() {
            let Some((handle, fired)) = drain.pop_due() else {
                break;
            };
            trace!(
                timer_id = %fired.timer_id,
                object_id = %fired.object_id,
                message_id = %fired.message_id,
                fire_time = fired.fire_time,
                "dispatching timer"
            );

            let mut guard = DispatchGuard::enter(&mut drain, handle);
            let result = self.dispatcher.deliver(&mut guard, &fired);
            drop(guard);

            report.fired += 1;
            if let Err(e) = result {
                report.failed += 1;
                warn!(
                    timer_id = %fired.timer_id,
                    object_id = %fired.object_id,
                    message_id = %fired.message_id,
                    error = %e,
                    "timer dispatch failed"
                );
            }
        }
        report.quit_requested = drain.quit_requested();
        report
    }

    // -----------------------------------------------------------------------
    // Creation / cancellation
    // -----------------------------------------------------------------------

    /// See [`Timers::create_timer`].
    pub fn create_timer(
        &mut self,
        object_id: ObjectId,
        message_id: MessageId,
        delay: u64,
    ) -> Result<TimerId, TimerError> {
        self.timers.create_timer(object_id, message_id, delay)
    }

    /// Recreate a timer under a known id, resolving the message by name
    /// through the dispatcher.
    pub fn load_timer(
        &mut self,
        timer_id: TimerId,
        object_id: ObjectId,
        message_name: &str,
        delay: u64,
    ) -> Result<(), TimerError> {
        let message_id = self
            .dispatcher
            .message_id(message_name)
            .ok_or_else(|| TimerError::UnknownMessage(message_name.to_string()))?;
        self.timers
            .load_timer_id(timer_id, object_id, message_id, delay)
    }

    /// See [`Timers::delete_timer`].
    pub fn delete_timer(&mut self, timer_id: TimerId) -> bool {
        self.timers.delete_timer(timer_id)
    }

    /// See [`Timers::get_timer`].
    pub fn get_timer(&self, timer_id: TimerId) -> Option<TimerInfo> {
        self.timers.get_timer(timer_id)
    }

    pub fn num_active_timers(&self) -> usize {
        self.timers.num_active_timers()
    }

    /// See [`Timers::pause_timers`].
    pub fn pause_timers(&mut self, now: u64) {
        self.timers.pause_timers(now);
    }

    /// See [`Timers::unpause_timers`].
    pub fn unpause_timers(&mut self, now: u64) {
        self.timers.unpause_timers(now);
    }

    pub fn in_main_loop(&self) -> bool {
        self.timers.in_main_loop()
    }

    // -----------------------------------------------------------------------
    // Save / restore
    // -----------------------------------------------------------------------

    /// Describe every live timer by message name, earliest first.
    ///
    /// Fails with [`TimerError::UnnamedMessage`] if the dispatcher cannot
    /// name one of the messages.
    pub fn save_timers(&self) -> Result<Vec<SavedTimer>, TimerError> {
        let mut live: Vec<TimerInfo> = self.timers.iter().collect();
        live.sort_by_key(|t| (t.fire_time, t.timer_id));
        live.into_iter()
            .map(|t| -> Result<SavedTimer, TimerError> {
                let message = self
                    .dispatcher
                    .message_name(t.message_id)
                    .ok_or(TimerError::UnnamedMessage(t.message_id))?;
                Ok(SavedTimer {
                    timer_id: t.timer_id,
                    object_id: t.object_id,
                    message,
                    remaining: t.remaining,
                })
            })
            .collect()
    }

    /// Load saved timers under their original ids.
    ///
    /// Stops at the first record that cannot be loaded. Afterwards the id
    /// counter sits past the highest restored id. Returns how many timers
    /// were loaded.
    pub fn restore_timers(&mut self, saved: &[SavedTimer]) -> Result<usize, TimerError> {
        for timer in saved {
            self.load_timer(timer.timer_id, timer.object_id, &timer.message, timer.remaining)?;
        }
        debug!(
            restored = saved.len(),
            next_timer_id = self.timers.next_timer_id(),
            "timers restored"
        );
        Ok(saved.len())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Drop every timer and start over, keeping allocations. A no-op on an
    /// empty scheduler.
    pub fn reset(&mut self) {
        self.timers.reset();
    }

    /// Drop every timer and release memory. Safe to call repeatedly.
    pub fn clear(&mut self) {
        self.timers.clear();
    }
}

impl<D: Dispatcher> std::fmt::Debug for Scheduler<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}
