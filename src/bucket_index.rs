//! Bucket index: one splice anchor per bucket.
//!
//! A thin array abstraction with no knowledge of keys or elements. Each slot
//! is either empty (no element hashes there) or holds the handle of the
//! sequence node immediately *preceding* the bucket's first element; that
//! anchor may be the sequence sentinel when the run sits at the very front.
//! Rehash recreates the whole array; insert and remove touch at most two
//! slots.

use crate::node_list::NodeRef;

#[derive(Debug)]
pub(crate) struct BucketIndex {
    /// Anchor per bucket. May be allocated longer than `table_size`; only
    /// the first `table_size` slots are addressable.
    slots: Vec<Option<NodeRef>>,
    table_size: usize,
}

impl BucketIndex {
    pub(crate) fn with_table_size(table_size: usize) -> Self {
        assert!(table_size > 0, "bucket count must be positive");
        Self {
            slots: vec![None; table_size],
            table_size,
        }
    }

    pub(crate) fn table_size(&self) -> usize {
        self.table_size
    }

    /// Allocated slot capacity; at least `table_size`.
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Bucket for a stored hash under the current table size.
    pub(crate) fn bucket_of(&self, hash: u64) -> usize {
        (hash % self.table_size as u64) as usize
    }

    pub(crate) fn anchor(&self, bucket: usize) -> Option<NodeRef> {
        self.slots[bucket]
    }

    pub(crate) fn set(&mut self, bucket: usize, anchor: NodeRef) {
        self.slots[bucket] = Some(anchor);
    }

    pub(crate) fn clear(&mut self, bucket: usize) {
        self.slots[bucket] = None;
    }

    /// Replace the index with empty slots for `table_size` buckets. Slot
    /// capacity is reserved at twice the bucket count so the next doubling
    /// rehash reuses the allocation less often. Callers rebuild the anchors.
    pub(crate) fn reset(&mut self, table_size: usize) {
        assert!(table_size > 0, "bucket count must be positive");
        self.slots = vec![None; table_size * 2];
        self.table_size = table_size;
    }

    pub(crate) fn clear_all(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}
