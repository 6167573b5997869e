//! Array-backed binary min-heap of node handles.
//!
//! Ordered by `(fire_time, seq)`. Every node caches its own position in
//! `heap_index`, which is what makes removal from an arbitrary position
//! O(log n) instead of a linear search.

use crate::node::{NodeHandle, NodeStore};

#[inline]
fn parent(i: usize) -> usize {
    (i - 1) / 2
}

#[inline]
fn left(i: usize) -> usize {
    2 * i + 1
}

#[derive(Default)]
pub(crate) struct MinHeap {
    items: Vec<NodeHandle>,
}

impl MinHeap {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn get(&self, index: usize) -> Option<NodeHandle> {
        self.items.get(index).copied()
    }

    pub(crate) fn peek_min(&self) -> Option<NodeHandle> {
        self.items.first().copied()
    }

    pub(crate) fn insert(&mut self, nodes: &mut NodeStore, handle: NodeHandle) {
        let index = self.items.len();
        self.items.push(handle);
        nodes[handle].heap_index = Some(index);
        self.sift_up(nodes, index);
        debug_assert!(self.check_invariant(nodes, 0), "timer heap order broken by insert");
    }

    pub(crate) fn extract_min(&mut self, nodes: &mut NodeStore) -> Option<NodeHandle> {
        self.remove_at(nodes, 0)
    }

    /// Removes the node at `index`, returning `None` if the slot is past the end.
    ///
    /// The last element takes the vacated slot and is then sifted in
    /// whichever direction restores order: it may be smaller than its new
    /// parent or larger than its new children.
    pub(crate) fn remove_at(&mut self, nodes: &mut NodeStore, index: usize) -> Option<NodeHandle> {
        if index >= self.items.len() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(index, last);
        let removed = self.items.pop()?;
        nodes[removed].heap_index = None;

        if index < self.items.len() {
            nodes[self.items[index]].heap_index = Some(index);
            if self.sift_up(nodes, index) == index {
                self.sift_down(nodes, index);
            }
        }
        debug_assert!(self.check_invariant(nodes, 0), "timer heap order broken by remove");
        Some(removed)
    }

    /// Verifies heap order and cached positions for the subtree at `index`.
    pub(crate) fn check_invariant(&self, nodes: &NodeStore, index: usize) -> bool {
        let Some(handle) = self.get(index) else {
            return true;
        };
        let Some(node) = nodes.get(handle) else {
            return false;
        };
        if node.heap_index != Some(index) {
            return false;
        }
        let left = left(index);
        for child in [left, left + 1] {
            let Some(child_handle) = self.get(child) else {
                continue;
            };
            match nodes.get(child_handle) {
                Some(child_node) if child_node.key() >= node.key() => {}
                _ => return false,
            }
            if !self.check_invariant(nodes, child) {
                return false;
            }
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn shrink_to_fit(&mut self) {
        self.items.shrink_to_fit();
    }

    fn swap(&mut self, nodes: &mut NodeStore, a: usize, b: usize) {
        self.items.swap(a, b);
        nodes[self.items[a]].heap_index = Some(a);
        nodes[self.items[b]].heap_index = Some(b);
    }

    /// Returns the final position.
    fn sift_up(&mut self, nodes: &mut NodeStore, mut index: usize) -> usize {
        while index > 0 {
            let up = parent(index);
            if nodes[self.items[index]].key() >= nodes[self.items[up]].key() {
                break;
            }
            self.swap(nodes, index, up);
            index = up;
        }
        index
    }

    fn sift_down(&mut self, nodes: &mut NodeStore, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = left(index);
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && nodes[self.items[right]].key() < nodes[self.items[left]].key() {
                smallest = right;
            }
            if nodes[self.items[smallest]].key() >= nodes[self.items[index]].key() {
                break;
            }
            self.swap(nodes, index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TimerNode;
    use crate::{MessageId, ObjectId, TimerId};

    fn push(heap: &mut MinHeap, nodes: &mut NodeStore, fire_time: u64, seq: u64) -> NodeHandle {
        let mut node = TimerNode::new(TimerId(seq as u32), ObjectId(0), MessageId(0), fire_time);
        node.seq = seq;
        let h = nodes.insert(node);
        heap.insert(nodes, h);
        h
    }

    fn drain(heap: &mut MinHeap, nodes: &mut NodeStore) -> Vec<u64> {
        let mut out = Vec::new();
        while let Some(h) = heap.extract_min(nodes) {
            out.push(nodes[h].fire_time);
        }
        out
    }

    #[test]
    fn test_extracts_in_fire_time_order() {
        let mut nodes = NodeStore::with_capacity(8);
        let mut heap = MinHeap::default();
        for (seq, t) in [50, 10, 40, 20, 30].into_iter().enumerate() {
            push(&mut heap, &mut nodes, t, seq as u64);
        }
        assert_eq!(drain(&mut heap, &mut nodes), vec![10, 20, 30, 40, 50]);
    }

    #[test]
    fn test_equal_fire_times_follow_seq() {
        let mut nodes = NodeStore::with_capacity(8);
        let mut heap = MinHeap::default();
        let handles: Vec<_> = (0..5).map(|seq| push(&mut heap, &mut nodes, 7, seq)).collect();

        let mut order = Vec::new();
        while let Some(h) = heap.extract_min(&mut nodes) {
            order.push(h);
        }
        assert_eq!(order, handles);
    }

    #[test]
    fn test_remove_last_element() {
        let mut nodes = NodeStore::with_capacity(2);
        let mut heap = MinHeap::default();
        let h = push(&mut heap, &mut nodes, 1, 0);
        assert_eq!(heap.remove_at(&mut nodes, 0), Some(h));
        assert_eq!(heap.len(), 0);
        assert_eq!(nodes[h].heap_index, None);
        assert_eq!(heap.remove_at(&mut nodes, 0), None);
    }

    #[test]
    fn test_remove_tail_position_does_not_sift() {
        let mut nodes = NodeStore::with_capacity(4);
        let mut heap = MinHeap::default();
        push(&mut heap, &mut nodes, 1, 0);
        push(&mut heap, &mut nodes, 2, 1);
        let tail = push(&mut heap, &mut nodes, 3, 2);
        assert_eq!(heap.remove_at(&mut nodes, 2), Some(tail));
        assert!(heap.check_invariant(&nodes, 0));
        assert_eq!(drain(&mut heap, &mut nodes), vec![1, 2]);
    }

    #[test]
    fn test_remove_at_sifts_replacement_up() {
        // Shape:        0
        //           10     1
        //         11  12  2  3
        // Removing 11 moves 3 under 10, where it must climb.
        let mut nodes = NodeStore::with_capacity(8);
        let mut heap = MinHeap::default();
        let mut handles = Vec::new();
        for (seq, t) in [0, 10, 1, 11, 12, 2, 3].into_iter().enumerate() {
            handles.push(push(&mut heap, &mut nodes, t, seq as u64));
        }
        let eleven = handles[3];
        let index = nodes[eleven].heap_index.unwrap();
        heap.remove_at(&mut nodes, index);
        assert!(heap.check_invariant(&nodes, 0));
        assert_eq!(drain(&mut heap, &mut nodes), vec![0, 1, 2, 3, 10, 12]);
    }

    #[test]
    fn test_remove_at_sifts_replacement_down() {
        let mut nodes = NodeStore::with_capacity(8);
        let mut heap = MinHeap::default();
        for (seq, t) in [1, 2, 3, 4, 5, 6, 100].into_iter().enumerate() {
            push(&mut heap, &mut nodes, t, seq as u64);
        }
        heap.remove_at(&mut nodes, 1);
        assert!(heap.check_invariant(&nodes, 0));
        assert_eq!(drain(&mut heap, &mut nodes), vec![1, 3, 4, 5, 6, 100]);
    }

    #[test]
    fn test_cached_indices_track_every_move() {
        let mut nodes = NodeStore::with_capacity(64);
        let mut heap = MinHeap::default();
        let mut handles = Vec::new();
        for seq in 0..40u64 {
            let t = (seq * 7919) % 61;
            handles.push(push(&mut heap, &mut nodes, t, seq));
        }
        // Remove every third node by its cached position.
        for h in handles.iter().step_by(3) {
            let index = nodes[*h].heap_index.unwrap();
            assert_eq!(heap.get(index), Some(*h));
            heap.remove_at(&mut nodes, index);
            assert!(heap.check_invariant(&nodes, 0));
        }
        for (i, h) in handles.iter().enumerate() {
            if i % 3 != 0 {
                let index = nodes[*h].heap_index.unwrap();
                assert_eq!(heap.get(index), Some(*h));
            }
        }
    }

    #[test]
    fn test_check_invariant_detects_disorder() {
        let mut nodes = NodeStore::with_capacity(4);
        let mut heap = MinHeap::default();
        push(&mut heap, &mut nodes, 1, 0);
        let child = push(&mut heap, &mut nodes, 5, 1);
        nodes[child].fire_time = 0;
        assert!(!heap.check_invariant(&nodes, 0));
        // Subtree rooted at the child is still a valid heap on its own.
        assert!(heap.check_invariant(&nodes, 1));
    }
}
