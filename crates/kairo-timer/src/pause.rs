//! Pause controller.
//!
//! Pausing never touches the heap. Fire times live on an "unpaused" clock,
//! `now - pause_offset`, and unpausing just grows the offset by however
//! long the pause lasted.

#[derive(Debug, Default, Clone)]
pub(crate) struct PauseController {
    paused: bool,
    pause_started_at: u64,
    pause_offset: u64,
}

impl PauseController {
    pub(crate) fn is_paused(&self) -> bool {
        self.paused
    }

    pub(crate) fn offset(&self) -> u64 {
        self.pause_offset
    }

    /// Returns `true` if this call changed the state.
    pub(crate) fn pause(&mut self, now: u64) -> bool {
        if self.paused {
            return false;
        }
        self.paused = true;
        self.pause_started_at = now;
        true
    }

    /// Returns `true` if this call changed the state.
    pub(crate) fn unpause(&mut self, now: u64) -> bool {
        if !self.paused {
            return false;
        }
        self.pause_offset += now.saturating_sub(self.pause_started_at);
        self.paused = false;
        true
    }

    /// The unpaused clock. Frozen at the pause instant while paused.
    pub(crate) fn effective_now(&self, now: u64) -> u64 {
        let base = if self.paused {
            self.pause_started_at
        } else {
            now
        };
        base.saturating_sub(self.pause_offset)
    }

    /// Nothing is ever due while paused.
    pub(crate) fn is_due(&self, fire_time: u64, now: u64) -> bool {
        !self.paused && fire_time <= self.effective_now(now)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
