//! Identifier table: `TimerId` → node handle, plus id allocation.

use std::collections::HashMap;

use crate::node::NodeHandle;
use crate::{TimerError, TimerId};

/// Bijective map from live timer ids to their nodes.
///
/// Ids come from a monotonic counter. The counter skips any id that is
/// still live (possible after a rebase or a restore), and wraps back to
/// the configured first id on overflow.
pub(crate) struct IdentifierTable {
    entries: HashMap<TimerId, NodeHandle>,
    next_id: u32,
    first_id: u32,
    max: usize,
}

impl IdentifierTable {
    pub(crate) fn new(capacity: usize, max: usize, first_id: u32) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            next_id: first_id,
            first_id,
            max,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn max(&self) -> usize {
        self.max
    }

    pub(crate) fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Fails with [`TimerError::CapacityExceeded`] when the table is full.
    pub(crate) fn ensure_room(&self) -> Result<(), TimerError> {
        if self.entries.len() >= self.max {
            return Err(TimerError::CapacityExceeded { max: self.max });
        }
        Ok(())
    }

    /// Picks the next unused id. Does not register anything.
    pub(crate) fn reserve_id(&mut self) -> Result<TimerId, TimerError> {
        self.ensure_room()?;
        // Any `len + 1` distinct ids include a free one. Probes only repeat
        // when the id range is smaller than that, which means it is full.
        for _ in 0..=self.entries.len() {
            let id = TimerId(self.next_id);
            self.next_id = self.next_id.checked_add(1).unwrap_or(self.first_id);
            if !self.entries.contains_key(&id) {
                return Ok(id);
            }
        }
        Err(TimerError::CapacityExceeded { max: self.max })
    }

    /// Maps `id` to `handle`. The caller has already checked that `id` is free.
    pub(crate) fn register(&mut self, id: TimerId, handle: NodeHandle) {
        let previous = self.entries.insert(id, handle);
        debug_assert!(previous.is_none(), "timer id {id} registered twice");
    }

    pub(crate) fn lookup(&self, id: TimerId) -> Option<NodeHandle> {
        self.entries.get(&id).copied()
    }

    pub(crate) fn contains(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn remove(&mut self, id: TimerId) -> Option<NodeHandle> {
        self.entries.remove(&id)
    }

    /// Live ids in ascending order, copied out so callers may mutate the
    /// table while walking them.
    pub(crate) fn ids(&self) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TimerId, NodeHandle)> + '_ {
        self.entries.iter().map(|(id, handle)| (*id, *handle))
    }

    /// Rebases the allocation counter.
    pub(crate) fn set_next_id(&mut self, next_id: u32) {
        self.next_id = next_id;
    }

    /// Moves the counter past an externally supplied id.
    pub(crate) fn advance_past(&mut self, id: TimerId) {
        if id.0 >= self.next_id {
            self.next_id = id.0.checked_add(1).unwrap_or(self.first_id);
        }
    }

    /// Forgets every mapping and restarts ids at the first id.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.next_id = self.first_id;
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.entries.shrink_to_fit();
    }
}
