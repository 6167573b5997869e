//! Node store: the slot map owning every timer record.
//!
//! The heap and the id table both hold [`NodeHandle`]s, never the nodes
//! themselves. Slot map keys are versioned, so a stale handle never
//! resolves to whichever node reuses the slot.

use std::ops::{Index, IndexMut};

use slotmap::{new_key_type, SlotMap};

use crate::{MessageId, ObjectId, TimerId};

new_key_type! {
    /// Stable reference to a node in the [`NodeStore`].
    pub(crate) struct NodeHandle;
}

/// One scheduled timer.
#[derive(Debug)]
pub(crate) struct TimerNode {
    pub(crate) timer_id: TimerId,
    pub(crate) object_id: ObjectId,
    pub(crate) message_id: MessageId,
    pub(crate) fire_time: u64,
    /// Insertion sequence; breaks fire-time ties first-in first-out.
    pub(crate) seq: u64,
    /// Position in the heap array, `None` once extracted.
    pub(crate) heap_index: Option<usize>,
    /// Whether the id table still maps `timer_id` to this node.
    pub(crate) registered: bool,
    /// Transient references held by in-flight dispatch.
    pub(crate) garbage_ref: u32,
}

impl TimerNode {
    pub(crate) fn new(
        timer_id: TimerId,
        object_id: ObjectId,
        message_id: MessageId,
        fire_time: u64,
    ) -> Self {
        Self {
            timer_id,
            object_id,
            message_id,
            fire_time,
            seq: 0,
            heap_index: None,
            registered: false,
            garbage_ref: 0,
        }
    }

    /// Heap ordering key.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.fire_time, self.seq)
    }

    /// Neither the heap nor the id table can reach this node any more.
    pub(crate) fn is_detached(&self) -> bool {
        self.heap_index.is_none() && !self.registered
    }
}

/// Owns every live [`TimerNode`].
pub(crate) struct NodeStore {
    slots: SlotMap<NodeHandle, TimerNode>,
}

impl NodeStore {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn insert(&mut self, node: TimerNode) -> NodeHandle {
        self.slots.insert(node)
    }

    pub(crate) fn get(&self, handle: NodeHandle) -> Option<&TimerNode> {
        self.slots.get(handle)
    }

    pub(crate) fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut TimerNode> {
        self.slots.get_mut(handle)
    }

    /// Frees the node if it is detached and nothing holds a reference.
    ///
    /// Returns `true` if the node was removed.
    pub(crate) fn release_if_unreferenced(&mut self, handle: NodeHandle) -> bool {
        match self.slots.get(handle) {
            Some(node) if node.is_detached() && node.garbage_ref == 0 => {
                self.slots.remove(handle);
                true
            }
            _ => false,
        }
    }

    /// Drops every node but keeps the allocation.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Gives the slot allocation back. Only shrinks an empty store, since
    /// live handles must keep resolving.
    pub(crate) fn shrink_to_fit(&mut self) {
        if self.slots.is_empty() {
            self.slots = SlotMap::with_key();
        }
    }
}

impl Index<NodeHandle> for NodeStore {
    type Output = TimerNode;

    fn index(&self, handle: NodeHandle) -> &TimerNode {
        &self.slots[handle]
    }
}

impl IndexMut<NodeHandle> for NodeStore {
    fn index_mut(&mut self, handle: NodeHandle) -> &mut TimerNode {
        &mut self.slots[handle]
    }
}
