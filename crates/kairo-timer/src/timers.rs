//! Timer state: node store, id table, heap, and pause controller together.
//!
//! [`Timers`] is what game logic and dispatch callbacks mutate. It holds
//! no dispatcher, so a callback handed `&mut Timers` can create and cancel
//! timers freely but can never start a nested drain.

use tracing::{debug, trace, warn};

use crate::heap::MinHeap;
use crate::node::{NodeHandle, NodeStore, TimerNode};
use crate::pause::PauseController;
use crate::table::IdentifierTable;
use crate::{FiredTimer, MessageId, ObjectId, TimerConfig, TimerError, TimerId, TimerInfo};

/// All scheduled timers plus the logical clock they are measured against.
pub struct Timers {
    config: TimerConfig,
    nodes: NodeStore,
    table: IdentifierTable,
    heap: MinHeap,
    pause: PauseController,
    /// Last clock value supplied by the host.
    now: u64,
    next_seq: u64,
    /// Node being delivered right now, if any. Detached from heap and table
    /// unless the callback re-armed it.
    pub(crate) current: Option<NodeHandle>,
    pub(crate) in_main_loop: bool,
    quit_requested: bool,
}

impl Timers {
    /// Create an empty timer set.
    pub fn new(config: TimerConfig) -> Self {
        let config = config.validated();
        debug!(
            max_timers = config.max_timers,
            initial_capacity = config.initial_capacity,
            "timer engine initialised"
        );
        Self {
            nodes: NodeStore::with_capacity(config.initial_capacity),
            table: IdentifierTable::new(
                config.initial_capacity,
                config.max_timers,
                config.first_timer_id,
            ),
            heap: MinHeap::with_capacity(config.initial_capacity),
            pause: PauseController::default(),
            now: 0,
            next_seq: 0,
            current: None,
            in_main_loop: false,
            quit_requested: false,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// The last clock value supplied by the host.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// The unpaused clock that fire times are measured on.
    pub fn effective_now(&self) -> u64 {
        self.pause.effective_now(self.now)
    }

    /// Advance the logical clock. A value lower than the current one is
    /// ignored: the clock never runs backwards.
    pub fn set_now(&mut self, now: u64) {
        if now < self.now {
            warn!(now, current = self.now, "timer clock moved backwards, ignoring");
            return;
        }
        self.now = now;
    }

    // -----------------------------------------------------------------------
    // Creation / cancellation
    // -----------------------------------------------------------------------

    /// Schedule `message_id` for `object_id`, `delay` ticks of unpaused
    /// time from now.
    pub fn create_timer(
        &mut self,
        object_id: ObjectId,
        message_id: MessageId,
        delay: u64,
    ) -> Result<TimerId, TimerError> {
        let timer_id = self.table.reserve_id().inspect_err(|_| {
            warn!(
                max = self.table.max(),
                %object_id,
                %message_id,
                "timer table full, create rejected"
            );
        })?;
        self.schedule(timer_id, object_id, message_id, delay);
        Ok(timer_id)
    }

    /// Schedule a timer under an externally supplied id, e.g. when
    /// restoring saved state.
    ///
    /// Advances the id counter past `timer_id` so later allocations never
    /// collide with it.
    pub fn load_timer_id(
        &mut self,
        timer_id: TimerId,
        object_id: ObjectId,
        message_id: MessageId,
        delay: u64,
    ) -> Result<(), TimerError> {
        if self.table.contains(timer_id) {
            return Err(TimerError::AlreadyInUse(timer_id));
        }
        self.table.ensure_room()?;
        self.table.advance_past(timer_id);
        self.schedule(timer_id, object_id, message_id, delay);
        Ok(())
    }

    fn schedule(
        &mut self,
        timer_id: TimerId,
        object_id: ObjectId,
        message_id: MessageId,
        delay: u64,
    ) {
        let fire_time = self.effective_now().saturating_add(delay);
        let handle = self
            .nodes
            .insert(TimerNode::new(timer_id, object_id, message_id, fire_time));
        self.table.register(timer_id, handle);
        self.nodes[handle].registered = true;
        self.push(handle);
        trace!(%timer_id, %object_id, %message_id, fire_time, "timer created");
    }

    fn push(&mut self, handle: NodeHandle) {
        self.nodes[handle].seq = self.next_seq;
        self.next_seq += 1;
        self.heap.insert(&mut self.nodes, handle);
    }

    /// Cancel a timer. Returns `false` if it does not exist, which includes
    /// a timer that already fired, was already cancelled, or is the one
    /// being delivered right now.
    pub fn delete_timer(&mut self, timer_id: TimerId) -> bool {
        let Some(handle) = self.table.remove(timer_id) else {
            return false;
        };
        self.nodes[handle].registered = false;
        if let Some(index) = self.nodes[handle].heap_index {
            self.heap.remove_at(&mut self.nodes, index);
        }
        self.nodes.release_if_unreferenced(handle);
        trace!(%timer_id, "timer deleted");
        true
    }

    /// Re-arm the timer currently being delivered, keeping its id.
    ///
    /// Only valid inside a dispatch callback. The node is scheduled `delay`
    /// ticks from now and is not freed when delivery returns.
    pub fn rearm_current(&mut self, delay: u64) -> Result<TimerId, TimerError> {
        let handle = self.current.ok_or(TimerError::NotDispatching)?;
        let timer_id = self.nodes[handle].timer_id;
        if self.table.contains(timer_id) {
            return Err(TimerError::AlreadyInUse(timer_id));
        }
        self.table.ensure_room()?;

        let fire_time = self.effective_now().saturating_add(delay);
        self.table.register(timer_id, handle);
        let node = &mut self.nodes[handle];
        node.fire_time = fire_time;
        node.registered = true;
        self.push(handle);
        trace!(%timer_id, fire_time, "timer re-armed");
        Ok(timer_id)
    }

    // -----------------------------------------------------------------------
    // Lookup / enumeration
    // -----------------------------------------------------------------------

    /// Look up a live timer.
    pub fn get_timer(&self, timer_id: TimerId) -> Option<TimerInfo> {
        let handle = self.table.lookup(timer_id)?;
        Some(self.info(&self.nodes[handle]))
    }

    /// The timer being delivered, while inside a dispatch callback.
    ///
    /// Still readable even though the id table no longer resolves it.
    pub fn current(&self) -> Option<TimerInfo> {
        let handle = self.current?;
        self.nodes.get(handle).map(|node| self.info(node))
    }

    /// Number of live timers.
    pub fn num_active_timers(&self) -> usize {
        self.table.len()
    }

    /// Iterate over live timers in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = TimerInfo> + '_ {
        self.table
            .iter()
            .map(move |(_, handle)| self.info(&self.nodes[handle]))
    }

    /// Visit every live timer, in ascending id order.
    ///
    /// The visitor may create or delete timers. Timers created during the
    /// pass are not visited; timers deleted before their turn are skipped.
    pub fn for_each_timer(&mut self, mut visit: impl FnMut(&mut Timers, TimerInfo)) {
        for timer_id in self.table.ids() {
            if let Some(info) = self.get_timer(timer_id) {
                visit(self, info);
            }
        }
    }

    /// The earliest live timer, if any.
    pub fn next_due(&self) -> Option<TimerInfo> {
        let handle = self.heap.peek_min()?;
        Some(self.info(&self.nodes[handle]))
    }

    fn info(&self, node: &TimerNode) -> TimerInfo {
        TimerInfo {
            timer_id: node.timer_id,
            object_id: node.object_id,
            message_id: node.message_id,
            fire_time: node.fire_time,
            remaining: node.fire_time.saturating_sub(self.effective_now()),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / loop control
    // -----------------------------------------------------------------------

    /// Freeze every countdown as of `now`. Idempotent.
    pub fn pause_timers(&mut self, now: u64) {
        self.set_now(now);
        if self.pause.pause(self.now) {
            debug!(now = self.now, active = self.table.len(), "timers paused");
        }
    }

    /// Resume countdowns as of `now`; the time spent paused does not
    /// count. Idempotent.
    pub fn unpause_timers(&mut self, now: u64) {
        self.set_now(now);
        if self.pause.unpause(self.now) {
            debug!(
                now = self.now,
                offset = self.pause.offset(),
                "timers unpaused"
            );
        }
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Whether a drain is executing.
    pub fn in_main_loop(&self) -> bool {
        self.in_main_loop
    }

    /// Ask the host loop to stop. A drain in progress finishes the current
    /// delivery and then returns; the host tears down afterwards.
    pub fn quit_timer_loop(&mut self) {
        if !self.quit_requested {
            debug!(in_main_loop = self.in_main_loop, "timer loop quit requested");
            self.quit_requested = true;
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    /// Rebase the id counter, e.g. after loading persisted timers.
    pub fn set_num_timers(&mut self, next_timer_id: u32) {
        debug!(next_timer_id, "timer id counter rebased");
        self.table.set_next_id(next_timer_id);
    }

    /// The id the counter will try next.
    pub fn next_timer_id(&self) -> u32 {
        self.table.next_id()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Drain support
    // -----------------------------------------------------------------------

    /// Detach and return the earliest timer if it is due.
    pub(crate) fn pop_due(&mut self) -> Option<(NodeHandle, FiredTimer)> {
        let handle = self.heap.peek_min()?;
        let node = &self.nodes[handle];
        if !self.pause.is_due(node.fire_time, self.now) {
            return None;
        }
        self.heap.extract_min(&mut self.nodes);
        let node = &mut self.nodes[handle];
        let fired = FiredTimer {
            timer_id: node.timer_id,
            object_id: node.object_id,
            message_id: node.message_id,
            fire_time: node.fire_time,
        };
        node.registered = false;
        self.table.remove(fired.timer_id);
        Some((handle, fired))
    }

    pub(crate) fn retain_node(&mut self, handle: NodeHandle) {
        self.nodes[handle].garbage_ref += 1;
    }

    /// Drop one transient reference and free the node if nothing else
    /// reaches it.
    pub(crate) fn release_node(&mut self, handle: NodeHandle) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.garbage_ref = node.garbage_ref.saturating_sub(1);
        }
        self.nodes.release_if_unreferenced(handle);
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Drop every timer, clear pause state and the quit flag, and restart
    /// ids. Keeps allocations and the clock. Idempotent.
    pub(crate) fn reset(&mut self) {
        if self.table.len() > 0 {
            debug!(dropped = self.table.len(), "timers reset");
        }
        self.nodes.clear();
        self.table.clear();
        self.heap.clear();
        self.pause.reset();
        self.next_seq = 0;
        self.current = None;
        self.quit_requested = false;
    }

    /// Reset and give memory back.
    pub(crate) fn clear(&mut self) {
        self.reset();
        self.nodes.shrink_to_fit();
        self.table.shrink_to_fit();
        self.heap.shrink_to_fit();
    }

    // -----------------------------------------------------------------------
    // Integrity
    // -----------------------------------------------------------------------

    /// Full structural check: heap order, cached heap positions, and the
    /// table ↔ heap ↔ store correspondence.
    pub fn check_integrity(&self) -> Result<(), TimerError> {
        if !self.heap.check_invariant(&self.nodes, 0) {
            return Err(TimerError::InvariantViolation(
                "heap order or cached heap index broken".into(),
            ));
        }
        if self.heap.len() != self.table.len() {
            return Err(TimerError::InvariantViolation(format!(
                "heap holds {} nodes but table holds {}",
                self.heap.len(),
                self.table.len()
            )));
        }
        for (timer_id, handle) in self.table.iter() {
            let Some(node) = self.nodes.get(handle) else {
                return Err(TimerError::InvariantViolation(format!(
                    "{timer_id} maps to a freed node"
                )));
            };
            if node.timer_id != timer_id || !node.registered {
                return Err(TimerError::InvariantViolation(format!(
                    "{timer_id} maps to node for {}",
                    node.timer_id
                )));
            }
            match node.heap_index {
                Some(index) if self.heap.get(index) == Some(handle) => {}
                _ => {
                    return Err(TimerError::InvariantViolation(format!(
                        "{timer_id} is registered but not heap-resident"
                    )));
                }
            }
        }
        let detached = self
            .current
            .and_then(|h| self.nodes.get(h))
            .is_some_and(TimerNode::is_detached);
        let expected = self.table.len() + usize::from(detached);
        if self.nodes.len() != expected {
            return Err(TimerError::InvariantViolation(format!(
                "store holds {} nodes, expected {expected}",
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Timers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timers")
            .field("now", &self.now)
            .field("active", &self.table.len())
            .field("paused", &self.pause.is_paused())
            .field("in_main_loop", &self.in_main_loop)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timers() -> Timers {
        Timers::new(TimerConfig::with_max_timers(8))
    }

    #[test]
    fn test_create_sets_fire_time_from_clock() {
        let mut t = timers();
        t.set_now(40);
        let id = t.create_timer(ObjectId(1), MessageId(2), 10).unwrap();
        let info = t.get_timer(id).unwrap();
        assert_eq!(info.fire_time, 50);
        assert_eq!(info.remaining, 10);
        assert_eq!(t.num_active_timers(), 1);
        t.check_integrity().unwrap();
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut t = timers();
        t.set_now(100);
        t.set_now(20);
        assert_eq!(t.now(), 100);
    }

    #[test]
    fn test_delete_twice() {
        let mut t = timers();
        let id = t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        assert!(t.delete_timer(id));
        assert!(!t.delete_timer(id));
        assert!(t.get_timer(id).is_none());
        assert_eq!(t.num_active_timers(), 0);
        t.check_integrity().unwrap();
    }

    #[test]
    fn test_load_timer_id_rejects_live_id() {
        let mut t = timers();
        let id = t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        assert_eq!(
            t.load_timer_id(id, ObjectId(2), MessageId(2), 5),
            Err(TimerError::AlreadyInUse(id))
        );
        assert_eq!(t.get_timer(id).unwrap().object_id, ObjectId(1));
    }

    #[test]
    fn test_load_timer_id_advances_counter() {
        let mut t = timers();
        t.load_timer_id(TimerId(40), ObjectId(1), MessageId(1), 5)
            .unwrap();
        let next = t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        assert_eq!(next, TimerId(41));
    }

    #[test]
    fn test_rearm_outside_dispatch_fails() {
        let mut t = timers();
        assert_eq!(t.rearm_current(10), Err(TimerError::NotDispatching));
    }

    #[test]
    fn test_for_each_skips_timers_deleted_mid_pass() {
        let mut t = timers();
        let a = t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        let b = t.create_timer(ObjectId(2), MessageId(1), 5).unwrap();
        let mut seen = Vec::new();
        t.for_each_timer(|timers, info| {
            seen.push(info.timer_id);
            if info.timer_id == a {
                timers.delete_timer(b);
                timers.create_timer(ObjectId(3), MessageId(1), 5).unwrap();
            }
        });
        assert_eq!(seen, vec![a]);
        assert_eq!(t.num_active_timers(), 2);
        t.check_integrity().unwrap();
    }

    #[test]
    fn test_timer_created_while_paused_counts_from_pause_instant() {
        let mut t = timers();
        t.pause_timers(100);
        t.set_now(400);
        let id = t.create_timer(ObjectId(1), MessageId(1), 50).unwrap();
        assert_eq!(t.get_timer(id).unwrap().remaining, 50);
        t.unpause_timers(400);
        t.set_now(449);
        assert_eq!(t.get_timer(id).unwrap().remaining, 1);
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut t = timers();
        t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        t.create_timer(ObjectId(1), MessageId(1), 5).unwrap();
        t.reset();
        assert_eq!(t.num_active_timers(), 0);
        assert_eq!(
            t.create_timer(ObjectId(1), MessageId(1), 5).unwrap(),
            TimerId(1)
        );
        t.check_integrity().unwrap();
    }

    #[test]
    fn test_next_due_is_earliest() {
        let mut t = timers();
        t.create_timer(ObjectId(1), MessageId(1), 30).unwrap();
        let soon = t.create_timer(ObjectId(2), MessageId(1), 10).unwrap();
        assert_eq!(t.next_due().unwrap().timer_id, soon);
    }
}
