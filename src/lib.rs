//! linked-hashmap: a single-threaded hash map whose entries live in one
//! doubly linked sequence, with a bucket index of splice anchors into that
//! sequence. Entries of a bucket are always contiguous, so the map offers
//! O(1) average lookup plus stable bidirectional iteration over everything
//! it stores from a single structure.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: build the bucket-indexed linked table in safe, verifiable layers
//!   so each piece can be reasoned about independently.
//! - Layers:
//!   - NodeList<T>: arena-backed circular doubly linked list. Nodes are
//!     addressed by generational handles from a `SlotMap`, never raw
//!     pointers; one permanently allocated sentinel closes the ring.
//!   - BucketIndex: a plain vector of optional anchors, one per bucket;
//!     an anchor names the node immediately before the bucket's first
//!     entry (possibly the sentinel). No knowledge of keys or hashing
//!     beyond the modulo reduction.
//!   - LinkedHashMap<K, V, S>: public API tying the two together; computes
//!     buckets, maintains the contiguous-run invariant on every mutation,
//!     and grows by doubling when the load factor hits its limit.
//!
//! Constraints
//! - Single-threaded and non-reentrant: `!Send`/`!Sync` by design, with a
//!   debug-only guard that panics on nested entry into one instance.
//! - Average O(1) find/insert/remove; rehash is O(n) and amortized by
//!   doubling.
//! - Unique keys: inserting an existing key physically replaces the old
//!   entry and reports it (`inserted == false`).
//! - `NodeRef` handles are weak views with generational liveness: valid
//!   until their entry is removed, across unrelated inserts, removals and
//!   rehashes; stale handles never resolve or alias.
//!
//! Why this split?
//! - Localize invariants: the list knows nothing about buckets, the index
//!   knows nothing about elements, and only the map layer maintains the
//!   contiguity and anchor invariants.
//! - Minimize unsafe: the one unsafe block is the list's mutable iterator;
//!   everything structural is safe handle indexing.
//! - Clear failure boundaries: candidate entries are fully constructed
//!   before the table is touched, so a panicking key/value constructor or
//!   `Clone` leaves the map exactly as it was.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash at insertion and every later step
//!   (bucket scans, removal repair, rehash) indexes by the stored hash;
//!   `K: Hash` is never invoked again for a stored key. Rehash re-splices
//!   the existing nodes inside the same arena, which is how handles keep
//!   their identity across growth.
//!
//! Notes and non-goals
//! - No thread safety and no open addressing; collisions extend a bucket's
//!   run in the shared sequence.
//! - Iteration order is sequence order: bucket runs are contiguous, but
//!   neighbor order across buckets changes on rehash.
//! - Keys are immutable post-insert; there is no `key_mut`.

mod bucket_index;
mod debug_guard;
mod linked_hash_map;
mod linked_hash_map_proptest;
mod node_list;

// Public surface
pub use linked_hash_map::{
    IntoIter, Iter, IterMut, KeyNotFound, Keys, LinkedHashMap, Values, ValuesMut,
};
pub use node_list::NodeRef;
