//! LinkedHashMap: bucket-indexed linked hash table.
//!
//! Every entry lives in one shared [`NodeList`] ring; the [`BucketIndex`]
//! stores, per bucket, the handle of the node immediately preceding the
//! bucket's run. Lookups read the anchor and scan a short contiguous span;
//! mutations repair at most two anchors. Rehash re-splices the existing
//! nodes into a rebuilt ring inside the same arena, so node handles survive
//! growth.
//!
//! Structure invariants, upheld after every public call:
//! - all entries of one bucket are contiguous in the ring;
//! - a non-empty bucket's anchor precedes the run's first entry and is the
//!   sentinel or an entry of a different bucket;
//! - an empty bucket's slot is empty;
//! - one entry per key; a duplicate insert replaces the old entry
//!   physically;
//! - the stored length always equals the ring's length.
//!
//! Each entry carries its `u64` hash from insertion time, and every
//! operation after insertion (rehash, removal repair, bucket scans) indexes
//! by the stored hash; `K: Hash` is never invoked again for a stored key.

use crate::bucket_index::BucketIndex;
use crate::debug_guard::DebugGuard;
use crate::node_list::{self, NodeList, NodeRef};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use core::ops;
use std::collections::hash_map::RandomState;

/// Bucket count of a default-constructed map.
const DEFAULT_BUCKETS: usize = 128;
const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.8;

/// Error returned by [`LinkedHashMap::at`] and [`LinkedHashMap::at_mut`]
/// for absent keys. The map is left unmodified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyNotFound;

impl fmt::Display for KeyNotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not found")
    }
}

impl std::error::Error for KeyNotFound {}

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
}

/// Hash map with bucket-contiguous, bidirectional iteration order.
///
/// Iteration follows the internal linked sequence, in which all entries of a
/// bucket form one unbroken run. [`NodeRef`] handles act as stable positions:
/// they survive unrelated inserts, removals and rehashes, and go stale only
/// when their own entry is removed.
pub struct LinkedHashMap<K, V, S = RandomState> {
    hasher: S,
    nodes: NodeList<Entry<K, V>>,
    index: BucketIndex,
    max_load_factor: f64,
    guard: DebugGuard,
}

impl<K, V> LinkedHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_buckets_and_hasher(DEFAULT_BUCKETS, RandomState::new())
    }

    /// Map with a chosen initial bucket count (must be positive).
    pub fn with_buckets(buckets: usize) -> Self {
        Self::with_buckets_and_hasher(buckets, RandomState::new())
    }
}

impl<K, V> Default for LinkedHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> LinkedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::with_buckets_and_hasher(DEFAULT_BUCKETS, hasher)
    }

    pub fn with_buckets_and_hasher(buckets: usize, hasher: S) -> Self {
        Self {
            hasher,
            nodes: NodeList::new(),
            index: BucketIndex::with_table_size(buckets),
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            guard: DebugGuard::new(),
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Position of `key`'s entry, if present.
    ///
    /// An empty bucket slot is an immediate miss; otherwise the scan starts
    /// right after the bucket's anchor and stops at the first entry of a
    /// different bucket (contiguity proves absence without a full walk).
    pub fn find<Q>(&self, key: &Q) -> Option<NodeRef>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.guard.enter();
        let hash = self.make_hash(key);
        scan_run(&self.nodes, &self.index, hash, key)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.find(key).is_some()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.find(key)?;
        self.nodes.get(node).map(|e| &e.value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let node = self.find(key)?;
        self.nodes.get_mut(node).map(|e| &mut e.value)
    }

    /// Checked access; `Err(KeyNotFound)` on a miss, map unmodified.
    pub fn at<Q>(&self, key: &Q) -> Result<&V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get(key).ok_or(KeyNotFound)
    }

    pub fn at_mut<Q>(&mut self, key: &Q) -> Result<&mut V, KeyNotFound>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_mut(key).ok_or(KeyNotFound)
    }

    /// Insert a key/value pair.
    ///
    /// The candidate entry is fully built before the map is touched. A
    /// matching key is removed first (physical replacement, which may
    /// transiently vacate its bucket); the table then grows if the incoming
    /// entry would reach the load limit, and the bucket is recomputed for
    /// the post-growth table size. A fresh entry always becomes the first
    /// element of its bucket's run.
    ///
    /// Returns the entry's handle and `true` for a fresh key, `false` when
    /// an existing entry was replaced.
    pub fn insert(&mut self, key: K, value: V) -> (NodeRef, bool) {
        let _g = self.guard.enter();
        let hash = self.make_hash(&key);
        let entry = Entry { key, value, hash };
        let replaced = match scan_run(&self.nodes, &self.index, hash, &entry.key) {
            Some(old) => {
                detach_entry(&mut self.nodes, &mut self.index, old);
                true
            }
            None => false,
        };
        if self.would_hit_load_limit(1) {
            let target = self.index.table_size() * 2;
            rebuild(&mut self.nodes, &mut self.index, target);
        }
        let node = link_entry(&mut self.nodes, &mut self.index, entry);
        (node, !replaced)
    }

    /// Emplace analogue of [`insert`](Self::insert): the value constructor
    /// runs before any mutation, so a panic inside it leaves the map
    /// untouched.
    pub fn insert_with<F>(&mut self, key: K, make: F) -> (NodeRef, bool)
    where
        F: FnOnce() -> V,
    {
        let value = make();
        self.insert(key, value)
    }

    /// Value for `key`, inserting `make()` on a miss. Like
    /// [`insert_with`](Self::insert_with), the constructor runs outside the
    /// guarded scope and before any mutation, so a panic inside it leaves
    /// the map untouched.
    pub fn get_or_insert_with<F>(&mut self, key: K, make: F) -> &mut V
    where
        F: FnOnce() -> V,
    {
        let g = self.guard.enter();
        let hash = self.make_hash(&key);
        let node = match scan_run(&self.nodes, &self.index, hash, &key) {
            Some(node) => node,
            None => {
                drop(g);
                let entry = Entry {
                    key,
                    value: make(),
                    hash,
                };
                let _g = self.guard.enter();
                if self.would_hit_load_limit(1) {
                    let target = self.index.table_size() * 2;
                    rebuild(&mut self.nodes, &mut self.index, target);
                }
                link_entry(&mut self.nodes, &mut self.index, entry)
            }
        };
        match self.nodes.get_mut(node) {
            Some(entry) => &mut entry.value,
            None => unreachable!("entry was just located or inserted"),
        }
    }

    /// Value for `key`, inserting `V::default()` on a miss.
    pub fn get_or_insert_default(&mut self, key: K) -> &mut V
    where
        V: Default,
    {
        self.get_or_insert_with(key, V::default)
    }

    /// Remove by key, returning the value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    /// Remove by key, returning the owned pair.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.guard.enter();
        let hash = self.make_hash(key);
        let node = scan_run(&self.nodes, &self.index, hash, key)?;
        detach_entry(&mut self.nodes, &mut self.index, node).map(|e| (e.key, e.value))
    }

    /// `true` if inserting `additional` more entries would reach the
    /// maximum load factor at the current bucket count.
    fn would_hit_load_limit(&self, additional: usize) -> bool {
        (self.nodes.len() + additional) as f64 / self.index.table_size() as f64
            >= self.max_load_factor
    }
}

impl<K, V, S> LinkedHashMap<K, V, S> {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Current bucket count (distinct from the index's allocated capacity).
    pub fn bucket_count(&self) -> usize {
        self.index.table_size()
    }

    /// Allocated bucket slots; at least [`bucket_count`](Self::bucket_count).
    /// Rehash reserves extra slots so the next doubling can reuse the
    /// allocation.
    pub fn bucket_capacity(&self) -> usize {
        self.index.capacity()
    }

    /// `len() / bucket_count()`.
    pub fn load_factor(&self) -> f64 {
        self.nodes.len() as f64 / self.index.table_size() as f64
    }

    pub fn max_load_factor(&self) -> f64 {
        self.max_load_factor
    }

    /// Set the load-factor ceiling (must be finite and positive). Takes
    /// effect on the next mutation; no immediate rehash.
    pub fn set_max_load_factor(&mut self, limit: f64) {
        assert!(
            limit.is_finite() && limit > 0.0,
            "max load factor must be finite and positive"
        );
        self.max_load_factor = limit;
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Rebuild the bucket index at `buckets` buckets (clamped to 1) and
    /// re-splice every node. Entries are neither copied nor re-hashed, and
    /// surviving handles stay valid; only the neighbor order changes.
    pub fn rehash(&mut self, buckets: usize) {
        let _g = self.guard.enter();
        rebuild(&mut self.nodes, &mut self.index, buckets.max(1));
    }

    /// Grow ahead of `count` expected entries so the insertions will not
    /// trigger a rehash of their own.
    pub fn reserve(&mut self, count: usize) {
        let _g = self.guard.enter();
        if count as f64 / self.index.table_size() as f64 >= self.max_load_factor {
            let target = ((2 * count) as f64 / self.max_load_factor).ceil() as usize;
            rebuild(&mut self.nodes, &mut self.index, target.max(1));
        }
    }

    /// Remove the entry at a handle. Stale handles return `None`.
    ///
    /// Anchor repair touches at most two slots: the bucket of the removed
    /// entry empties when the entry was its run's only member, and when the
    /// successor opens a different bucket's run, that bucket is re-anchored
    /// at the removed entry's predecessor.
    pub fn remove_node(&mut self, node: NodeRef) -> Option<(K, V)> {
        let _g = self.guard.enter();
        detach_entry(&mut self.nodes, &mut self.index, node).map(|e| (e.key, e.value))
    }

    /// Remove `[from, to)` in sequence order; `None` means through the end.
    /// Returns the number of removed entries. Stops early if `from` is stale
    /// or `to` is not reachable.
    pub fn remove_range(&mut self, from: NodeRef, to: Option<NodeRef>) -> usize {
        let mut removed = 0;
        let mut cur = Some(from);
        while let Some(node) = cur {
            if Some(node) == to {
                break;
            }
            cur = self.next(node);
            if self.remove_node(node).is_some() {
                removed += 1;
            } else {
                break;
            }
        }
        removed
    }

    /// Drop every entry, keeping the bucket count. All handles go stale.
    pub fn clear(&mut self) {
        let _g = self.guard.enter();
        self.index.clear_all();
        self.nodes.clear();
    }

    // Handle navigation over the sequence. Handles are weak views: valid
    // until their entry is removed or the map is dropped.

    pub fn first(&self) -> Option<NodeRef> {
        self.nodes.front()
    }

    pub fn last(&self) -> Option<NodeRef> {
        self.nodes.back()
    }

    pub fn next(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.next(node)
    }

    pub fn prev(&self, node: NodeRef) -> Option<NodeRef> {
        self.nodes.prev(node)
    }

    pub fn contains_node(&self, node: NodeRef) -> bool {
        self.nodes.contains(node)
    }

    pub fn node_key(&self, node: NodeRef) -> Option<&K> {
        self.nodes.get(node).map(|e| &e.key)
    }

    pub fn node_value(&self, node: NodeRef) -> Option<&V> {
        self.nodes.get(node).map(|e| &e.value)
    }

    pub fn node_value_mut(&mut self, node: NodeRef) -> Option<&mut V> {
        self.nodes.get_mut(node).map(|e| &mut e.value)
    }

    pub fn node_entry(&self, node: NodeRef) -> Option<(&K, &V)> {
        self.nodes.get(node).map(|e| (&e.key, &e.value))
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.nodes.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            inner: self.nodes.iter_mut(),
        }
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }
}

impl NodeRef {
    /// Key of the entry this handle names, if it is still live in `map`.
    pub fn key<'a, K, V, S>(&self, map: &'a LinkedHashMap<K, V, S>) -> Option<&'a K> {
        map.node_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a LinkedHashMap<K, V, S>) -> Option<&'a V> {
        map.node_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut LinkedHashMap<K, V, S>) -> Option<&'a mut V> {
        map.node_value_mut(*self)
    }
}

// Internal table plumbing. Free functions over the two component fields so
// public methods can hold the entry guard while mutating.

/// Scan the contiguous run of `hash`'s bucket for `key`.
fn scan_run<K, V, Q>(
    nodes: &NodeList<Entry<K, V>>,
    index: &BucketIndex,
    hash: u64,
    key: &Q,
) -> Option<NodeRef>
where
    K: Borrow<Q>,
    Q: ?Sized + Eq,
{
    let bucket = index.bucket_of(hash);
    let anchor = index.anchor(bucket)?;
    let mut cur = nodes.next_link(anchor);
    while let Some(entry) = nodes.get(cur) {
        if index.bucket_of(entry.hash) != bucket {
            return None;
        }
        if entry.key.borrow() == key {
            return Some(cur);
        }
        cur = nodes.next_link(cur);
    }
    None
}

/// Link a fully built entry. Empty bucket: append at the tail and anchor the
/// bucket at the previous tail. Occupied bucket: splice right after the
/// anchor, making the entry the run's new first element.
fn link_entry<K, V>(
    nodes: &mut NodeList<Entry<K, V>>,
    index: &mut BucketIndex,
    entry: Entry<K, V>,
) -> NodeRef {
    let bucket = index.bucket_of(entry.hash);
    match index.anchor(bucket) {
        None => {
            let anchor = nodes.back_link();
            let node = nodes.push_back(entry);
            index.set(bucket, anchor);
            node
        }
        Some(anchor) => nodes.insert_after(anchor, entry),
    }
}

/// Unlink one entry and repair the affected anchors (at most two slots).
fn detach_entry<K, V>(
    nodes: &mut NodeList<Entry<K, V>>,
    index: &mut BucketIndex,
    node: NodeRef,
) -> Option<Entry<K, V>> {
    let hash = nodes.get(node)?.hash;
    let bucket = index.bucket_of(hash);
    let prev = nodes.prev_link(node);
    let next = nodes.next_link(node);
    // `None` when the successor is the sentinel.
    let next_bucket = nodes.get(next).map(|e| index.bucket_of(e.hash));

    if let Some(anchor) = index.anchor(bucket) {
        if nodes.next_link(anchor) == node && next_bucket != Some(bucket) {
            // Sole member of its run: the bucket empties.
            index.clear(bucket);
        }
        // Otherwise the anchor still precedes the run after the unlink:
        // either the removed node was not the first member, or the run
        // continues with the successor.
    }
    if let Some(nb) = next_bucket {
        if nb != bucket {
            // The successor opens another bucket's run; that run's
            // predecessor is now our predecessor.
            index.set(nb, prev);
        }
    }
    nodes.unlink(node)
}

/// Rebuild the index at `buckets` buckets and re-splice every node, in
/// sequence order, into a fresh ring inside the same arena. First touch of a
/// bucket appends at the tail and records the anchor; later touches splice
/// after the anchor, exactly as insertion does.
fn rebuild<K, V>(nodes: &mut NodeList<Entry<K, V>>, index: &mut BucketIndex, buckets: usize) {
    index.reset(buckets);
    for node in nodes.detach_all() {
        let hash = match nodes.get(node) {
            Some(entry) => entry.hash,
            None => continue,
        };
        let bucket = index.bucket_of(hash);
        match index.anchor(bucket) {
            None => {
                let anchor = nodes.back_link();
                nodes.splice_back(node);
                index.set(bucket, anchor);
            }
            Some(anchor) => nodes.splice_after(anchor, node),
        }
    }
}

impl<K, V, S> Clone for LinkedHashMap<K, V, S>
where
    K: Eq + Hash + Clone,
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Deep copy: same hasher, bucket count and load limit, every entry
    /// cloned and reinserted in sequence order. A panicking element `Clone`
    /// drops the half-built copy and leaves `self` untouched.
    fn clone(&self) -> Self {
        let mut copy = Self::with_buckets_and_hasher(self.bucket_count(), self.hasher.clone());
        copy.max_load_factor = self.max_load_factor;
        for (k, v) in self.iter() {
            copy.insert(k.clone(), v.clone());
        }
        copy
    }
}

impl<K, V, S> Extend<(K, V)> for LinkedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for LinkedHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_buckets_and_hasher(DEFAULT_BUCKETS, S::default());
        map.extend(iter);
        map
    }
}

impl<K, V, S, Q> ops::Index<&Q> for LinkedHashMap<K, V, S>
where
    K: Eq + Hash + Borrow<Q>,
    Q: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    type Output = V;

    /// Read-only indexing; panics on a missing key like `std` maps.
    fn index(&self, key: &Q) -> &V {
        self.get(key).expect("no entry found for key")
    }
}

impl<K, V, S> fmt::Debug for LinkedHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Borrowing iterator in sequence order.
pub struct Iter<'a, K, V> {
    inner: node_list::Iter<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| (&e.key, &e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, e)| (&e.key, &e.value))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

/// Mutably borrowing iterator in sequence order. Keys stay shared.
pub struct IterMut<'a, K, V> {
    inner: node_list::IterMut<'a, Entry<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        let (_, entry) = self.inner.next()?;
        let Entry { key, value, .. } = entry;
        let key: &'a K = key;
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a, K, V> DoubleEndedIterator for IterMut<'a, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (_, entry) = self.inner.next_back()?;
        let Entry { key, value, .. } = entry;
        let key: &'a K = key;
        Some((key, value))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// Owning iterator in sequence order.
pub struct IntoIter<K, V> {
    list: NodeList<Entry<K, V>>,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.list.front()?;
        self.list.unlink(node).map(|e| (e.key, e.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.list.len(), Some(self.list.len()))
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node = self.list.back()?;
        self.list.unlink(node).map(|e| (e.key, e.value))
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}

pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for ValuesMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {}

impl<K, V, S> IntoIterator for LinkedHashMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> IntoIter<K, V> {
        IntoIter { list: self.nodes }
    }
}

impl<'a, K, V, S> IntoIterator for &'a LinkedHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut LinkedHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::hash::Hasher;

    /// Hashes a `u64` key to itself, so `bucket = key % bucket_count` and
    /// tests can steer entries into chosen buckets.
    #[derive(Clone, Default)]
    struct IdentityBuildHasher;
    struct IdentityHasher(u64);

    impl BuildHasher for IdentityBuildHasher {
        type Hasher = IdentityHasher;
        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }

    impl Hasher for IdentityHasher {
        fn write(&mut self, _bytes: &[u8]) {
            unimplemented!("identity hasher only supports integer keys")
        }
        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
        fn finish(&self) -> u64 {
            self.0
        }
    }

    type IdMap = LinkedHashMap<u64, &'static str, IdentityBuildHasher>;

    fn id_map(buckets: usize) -> IdMap {
        LinkedHashMap::with_buckets_and_hasher(buckets, IdentityBuildHasher)
    }

    /// Bucket ids of the iteration order must form maximal contiguous runs.
    fn assert_contiguous<K, V, S>(map: &LinkedHashMap<K, V, S>)
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        let buckets: Vec<usize> = map
            .keys()
            .map(|k| (map.hasher().hash_one(k) % map.bucket_count() as u64) as usize)
            .collect();
        let mut seen = std::collections::HashSet::new();
        let mut run = None;
        for b in buckets {
            if run != Some(b) {
                assert!(seen.insert(b), "bucket {b} split into separate runs");
                run = Some(b);
            }
        }
    }

    /// Invariant: a fresh key is inserted, found and counted.
    #[test]
    fn insert_and_find_round_trip() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        let (node, inserted) = m.insert("a".to_string(), 1);
        assert!(inserted);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(node.key(&m), Some(&"a".to_string()));
        assert_eq!(node.value(&m), Some(&1));
        assert!(m.get("b").is_none());
    }

    /// Invariant: duplicate insert replaces the old entry physically, keeps
    /// `len` unchanged and reports `inserted == false`.
    #[test]
    fn duplicate_insert_replaces() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        let (old_node, first) = m.insert("x".to_string(), 1);
        let (new_node, second) = m.insert("x".to_string(), 2);
        assert!(first);
        assert!(!second);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("x"), Some(&2));
        // The old entry is gone, not updated in place.
        assert_ne!(old_node, new_node);
        assert!(old_node.value(&m).is_none());
        assert_eq!(new_node.value(&m), Some(&2));
    }

    /// Invariant: borrowed lookup works (store `String`, query `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert!(m.find("hello").is_some());
    }

    /// Invariant: `at` reports `KeyNotFound` on a miss and leaves the map
    /// unmodified; `at_mut` writes through on a hit.
    #[test]
    fn at_reports_missing_keys() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        m.insert("k".to_string(), 5);
        assert_eq!(m.at("k"), Ok(&5));
        assert_eq!(m.at("missing"), Err(KeyNotFound));
        assert_eq!(m.len(), 1);
        *m.at_mut("k").unwrap() += 1;
        assert_eq!(m["k"], 6);
    }

    /// Invariant: indexing a missing key panics like `std` maps.
    #[test]
    #[should_panic(expected = "no entry found for key")]
    fn index_panics_on_missing_key() {
        let m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        let _ = m[&"nope".to_string()];
    }

    /// Invariant: `get_or_insert_default` is the `operator[]` of the table:
    /// default-construct on miss, plain access on hit.
    #[test]
    fn get_or_insert_default_inserts_once() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        *m.get_or_insert_default("n".to_string()) += 7;
        *m.get_or_insert_default("n".to_string()) += 7;
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("n"), Some(&14));
    }

    /// Invariant: `insert_with` constructs the value exactly once per call,
    /// before the table is mutated.
    #[test]
    fn insert_with_constructs_before_mutation() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        let mut calls = 0;
        let (_, inserted) = m.insert_with("k".to_string(), || {
            calls += 1;
            1
        });
        assert!(inserted);
        let (_, inserted) = m.insert_with("k".to_string(), || {
            calls += 1;
            2
        });
        assert!(!inserted);
        assert_eq!(calls, 2);
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: removal decreases `len` by one each time and an emptied
    /// map has no first element.
    #[test]
    fn remove_all_leaves_empty_sequence() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::new();
        for i in 0..20 {
            m.insert(i, i * 10);
        }
        for i in 0..20 {
            let before = m.len();
            assert_eq!(m.remove(&i), Some(i * 10));
            assert_eq!(m.len(), before - 1);
        }
        assert!(m.is_empty());
        assert!(m.first().is_none());
        assert_eq!(m.iter().count(), 0);
    }

    /// Invariant: a fresh entry heads its bucket's run, and appends go to
    /// the sequence tail when the bucket was empty.
    #[test]
    fn run_order_is_newest_first_within_a_bucket() {
        let mut m = id_map(8);
        m.insert(0, "first");
        m.insert(8, "second"); // same bucket, spliced at the run head
        m.insert(16, "third");
        m.insert(1, "other bucket"); // appended at the tail
        let keys: Vec<u64> = m.keys().copied().collect();
        assert_eq!(keys, vec![16, 8, 0, 1]);
        assert_contiguous(&m);
    }

    /// Invariant: removing a run's last member whose successor opens a
    /// different bucket re-anchors that bucket at the removed entry's
    /// predecessor.
    #[test]
    fn remove_last_of_run_repairs_neighbor_anchor() {
        let mut m = id_map(8);
        m.insert(0, "a");
        m.insert(8, "b");
        m.insert(1, "c");
        // Sequence: [8, 0, 1]; bucket 1 anchored at key 0's node.
        assert_eq!(m.remove(&0), Some("a"));
        // Bucket 1 must now be anchored at key 8's node.
        assert_eq!(m.get(&1), Some(&"c"));
        assert_eq!(m.get(&8), Some(&"b"));
        assert_contiguous(&m);

        // And removing the now-sole member of bucket 0 re-anchors again.
        assert_eq!(m.remove(&8), Some("b"));
        assert_eq!(m.get(&1), Some(&"c"));
        assert!(m.get(&8).is_none());
        assert_contiguous(&m);
    }

    /// Invariant: erasing a bucket's sole occupant empties its slot, so a
    /// later lookup in that bucket misses without touching neighbor runs.
    #[test]
    fn remove_sole_occupant_empties_bucket() {
        let mut m = id_map(8);
        m.insert(1, "one");
        m.insert(9, "nine");
        m.insert(2, "two");
        assert_eq!(m.remove(&2), Some("two"));
        assert!(m.get(&2).is_none());
        assert!(m.get(&10).is_none()); // anything else in bucket 2 misses too
        assert_eq!(m.get(&1), Some(&"one"));
        assert_eq!(m.get(&9), Some(&"nine"));
        assert_contiguous(&m);
    }

    /// Invariant: removing a middle member of a run leaves the anchor and
    /// the rest of the run intact.
    #[test]
    fn remove_middle_of_run_keeps_anchor() {
        let mut m = id_map(4);
        m.insert(0, "a");
        m.insert(4, "b");
        m.insert(8, "c"); // run order: 8, 4, 0
        assert_eq!(m.remove(&4), Some("b"));
        assert_eq!(m.get(&8), Some(&"c"));
        assert_eq!(m.get(&0), Some(&"a"));
        assert_eq!(m.keys().copied().collect::<Vec<_>>(), vec![8, 0]);
        assert_contiguous(&m);
    }

    /// Invariant: after any insert the load factor stays under the limit or
    /// a rehash happened within that call.
    #[test]
    fn load_factor_stays_bounded() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::with_buckets(8);
        for i in 0..1000 {
            m.insert(i, i);
            assert!(
                m.load_factor() < m.max_load_factor(),
                "load factor {} outgrew the limit at {} entries",
                m.load_factor(),
                m.len()
            );
        }
        assert_eq!(m.len(), 1000);
        for i in 0..1000 {
            assert_eq!(m.get(&i), Some(&i));
        }
    }

    /// Invariant: growth doubles the bucket count and every entry is still
    /// reachable in its recomputed bucket.
    #[test]
    fn growth_doubles_buckets() {
        let mut m = id_map(8);
        for i in 0..6 {
            m.insert(i, "v");
        }
        assert_eq!(m.bucket_count(), 8);
        m.insert(6, "v"); // (6 + 1) / 8 >= 0.8 triggers the doubling
        assert_eq!(m.bucket_count(), 16);
        for i in 0..7 {
            assert!(m.contains_key(&i));
        }
        assert_contiguous(&m);
    }

    /// Invariant: handles survive rehash; only neighbor order may change.
    #[test]
    fn rehash_preserves_handles() {
        let mut m = id_map(8);
        let (node, _) = m.insert(3, "three");
        let handles: Vec<NodeRef> = (10..30).map(|i| m.insert(i, "x").0).collect();
        m.rehash(64);
        assert_eq!(m.bucket_count(), 64);
        assert!(m.bucket_capacity() >= 128);
        assert_eq!(node.value(&m), Some(&"three"));
        for h in handles {
            assert!(m.contains_node(h));
        }
        assert_eq!(m.len(), 21);
        assert_contiguous(&m);
    }

    /// Invariant: an explicit rehash regroups entries by their new bucket.
    #[test]
    fn rehash_regroups_runs() {
        let mut m = id_map(4);
        for k in [0u64, 1, 4, 5, 8, 9] {
            m.insert(k, "v");
        }
        assert_contiguous(&m);
        m.rehash(8);
        for k in [0u64, 1, 4, 5, 8, 9] {
            assert!(m.contains_key(&k));
        }
        assert_contiguous(&m);
        // Buckets 0 and 4 now differ: 0 holds {0, 8}, 4 holds {4}.
        assert_eq!(m.len(), 6);
    }

    /// Invariant: `reserve` grows once up front so the following inserts do
    /// not rehash.
    #[test]
    fn reserve_preempts_growth() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::with_buckets(8);
        m.reserve(100);
        let buckets = m.bucket_count();
        assert!(buckets as f64 * m.max_load_factor() > 100.0);
        for i in 0..100 {
            m.insert(i, i);
        }
        assert_eq!(m.bucket_count(), buckets);
    }

    /// Invariant: a lower max load factor takes effect on the next insert.
    #[test]
    fn max_load_factor_is_tunable() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::with_buckets(64);
        m.set_max_load_factor(0.25);
        assert_eq!(m.max_load_factor(), 0.25);
        for i in 0..16 {
            m.insert(i, i);
        }
        // 16/64 == 0.25 would breach the limit, so the table grew.
        assert!(m.bucket_count() > 64);
    }

    #[test]
    #[should_panic(expected = "max load factor")]
    fn non_positive_load_factor_is_rejected() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::new();
        m.set_max_load_factor(0.0);
    }

    /// Invariant: iteration is double-ended and consistent between ends.
    #[test]
    fn iteration_is_double_ended() {
        let mut m = id_map(16);
        for i in 0..8 {
            m.insert(i, "v");
        }
        let fwd: Vec<u64> = m.keys().copied().collect();
        let mut bwd: Vec<u64> = m.keys().rev().copied().collect();
        bwd.reverse();
        assert_eq!(fwd, bwd);
        assert_eq!(m.iter().len(), 8);
    }

    /// Invariant: handle navigation walks the same order as iteration.
    #[test]
    fn handle_navigation_matches_iteration() {
        let mut m = id_map(8);
        for k in [5u64, 13, 2, 7] {
            m.insert(k, "v");
        }
        let mut walked = Vec::new();
        let mut cur = m.first();
        while let Some(node) = cur {
            walked.push(*node.key(&m).unwrap());
            cur = m.next(node);
        }
        let iterated: Vec<u64> = m.keys().copied().collect();
        assert_eq!(walked, iterated);

        // Backward walk agrees too.
        let mut back = Vec::new();
        let mut cur = m.last();
        while let Some(node) = cur {
            back.push(*node.key(&m).unwrap());
            cur = m.prev(node);
        }
        back.reverse();
        assert_eq!(back, iterated);
    }

    /// Invariant: `iter_mut`/`values_mut` updates are observed by lookups.
    #[test]
    fn mutable_iteration_writes_through() {
        let mut m: LinkedHashMap<u64, u64> = LinkedHashMap::new();
        for i in 0..5 {
            m.insert(i, i);
        }
        for (_, v) in m.iter_mut() {
            *v += 100;
        }
        for v in m.values_mut() {
            *v += 1;
        }
        for i in 0..5 {
            assert_eq!(m.get(&i), Some(&(i + 101)));
        }
    }

    /// Invariant: mutable references collected from `values_mut` all stay
    /// usable after the iterator has moved past them.
    #[test]
    fn collected_mut_refs_all_write_through() {
        let mut m: LinkedHashMap<u64, u64, IdentityBuildHasher> =
            LinkedHashMap::with_buckets_and_hasher(16, IdentityBuildHasher);
        for i in 0..8 {
            m.insert(i, 0);
        }
        // Distinct buckets, so sequence order is insertion order.
        let refs: Vec<&mut u64> = m.values_mut().collect();
        for (i, v) in refs.into_iter().enumerate() {
            *v = i as u64 + 1;
        }
        for i in 0..8 {
            assert_eq!(m.get(&i), Some(&(i + 1)));
        }
    }

    /// Invariant: a panic while cloning an element drops the half-built
    /// copy and leaves the original fully intact.
    #[test]
    fn clone_panic_leaves_original_intact() {
        use std::cell::Cell;
        use std::panic::{catch_unwind, AssertUnwindSafe};
        use std::rc::Rc;

        #[derive(Debug)]
        struct Fragile {
            id: i32,
            budget: Rc<Cell<i32>>,
        }
        impl Clone for Fragile {
            fn clone(&self) -> Self {
                let left = self.budget.get();
                assert!(left > 0, "clone budget exhausted");
                self.budget.set(left - 1);
                Fragile {
                    id: self.id,
                    budget: Rc::clone(&self.budget),
                }
            }
        }

        let budget = Rc::new(Cell::new(3));
        let mut m: LinkedHashMap<u64, Fragile, IdentityBuildHasher> =
            LinkedHashMap::with_buckets_and_hasher(8, IdentityBuildHasher);
        for i in 0..6u64 {
            m.insert(
                i,
                Fragile {
                    id: i as i32,
                    budget: Rc::clone(&budget),
                },
            );
        }

        let res = catch_unwind(AssertUnwindSafe(|| m.clone()));
        assert!(res.is_err(), "fourth clone must have panicked");
        assert_eq!(m.len(), 6);
        for i in 0..6u64 {
            assert_eq!(m.get(&i).map(|f| f.id), Some(i as i32));
        }
        assert_contiguous(&m);

        // The map stays fully usable after the unwind.
        m.insert(6, Fragile { id: 6, budget });
        assert_eq!(m.len(), 7);
    }

    /// Invariant: a panicking value constructor in `insert_with` leaves the
    /// map unchanged, for fresh keys and for attempted replacements alike.
    #[test]
    fn insert_with_panic_rolls_back() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut m = id_map(8);
        m.insert(1, "one");

        let res = catch_unwind(AssertUnwindSafe(|| {
            m.insert_with(9, || panic!("constructor failed"))
        }));
        assert!(res.is_err());
        assert_eq!(m.len(), 1);
        assert!(m.get(&9).is_none());

        let res = catch_unwind(AssertUnwindSafe(|| {
            m.insert_with(1, || panic!("constructor failed"))
        }));
        assert!(res.is_err());
        assert_eq!(m.get(&1), Some(&"one"));
        assert_contiguous(&m);
    }

    /// Invariant: a panicking constructor in `get_or_insert_with` leaves
    /// the map unchanged and further calls succeed.
    #[test]
    fn get_or_insert_with_panic_rolls_back() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let mut m = id_map(8);
        m.insert(1, "one");
        let res = catch_unwind(AssertUnwindSafe(|| {
            m.get_or_insert_with(2, || panic!("constructor failed"));
        }));
        assert!(res.is_err());
        assert_eq!(m.len(), 1);
        assert!(m.get(&2).is_none());

        m.insert(2, "two");
        assert_eq!(m.get(&2), Some(&"two"));
        assert_contiguous(&m);
    }

    /// Invariant: `into_iter` drains every entry in sequence order.
    #[test]
    fn into_iter_preserves_sequence_order() {
        let mut m = id_map(8);
        m.insert(0, "a");
        m.insert(8, "b");
        m.insert(3, "c");
        let expect: Vec<u64> = m.keys().copied().collect();
        let drained: Vec<u64> = m.into_iter().map(|(k, _)| k).collect();
        assert_eq!(drained, expect);
    }

    /// Invariant: `remove_range` erases exactly `[from, to)`.
    #[test]
    fn remove_range_is_half_open() {
        let mut m = id_map(32);
        for i in 0..6 {
            m.insert(i, "v");
        }
        let order: Vec<NodeRef> = {
            let mut v = Vec::new();
            let mut cur = m.first();
            while let Some(n) = cur {
                v.push(n);
                cur = m.next(n);
            }
            v
        };
        let removed = m.remove_range(order[1], Some(order[4]));
        assert_eq!(removed, 3);
        assert_eq!(m.len(), 3);
        assert!(m.contains_node(order[0]));
        assert!(m.contains_node(order[4]));
        assert!(!m.contains_node(order[2]));
        assert_contiguous(&m);

        // Open end removes through the tail.
        let removed = m.remove_range(order[4], None);
        assert_eq!(removed, 2);
        assert_eq!(m.len(), 1);
    }

    /// Invariant: `clear` empties the map, stales handles, and the map
    /// remains usable.
    #[test]
    fn clear_then_reuse() {
        let mut m: LinkedHashMap<String, i32> = LinkedHashMap::new();
        let (node, _) = m.insert("a".to_string(), 1);
        m.insert("b".to_string(), 2);
        m.clear();
        assert!(m.is_empty());
        assert!(node.value(&m).is_none());
        assert!(m.get("a").is_none());
        m.insert("c".to_string(), 3);
        assert_eq!(m.get("c"), Some(&3));
    }

    /// Invariant: a clone is deep; mutating it never shows through the
    /// original.
    #[test]
    fn clone_is_independent() {
        let mut original: LinkedHashMap<String, i32> = LinkedHashMap::new();
        for i in 0..50 {
            original.insert(format!("k{i}"), i);
        }
        let mut copy = original.clone();
        assert_eq!(copy.len(), original.len());
        assert_eq!(copy.bucket_count(), original.bucket_count());

        copy.insert("k0".to_string(), -1);
        copy.remove("k1");
        copy.insert("fresh".to_string(), 99);

        assert_eq!(original.get("k0"), Some(&0));
        assert_eq!(original.get("k1"), Some(&1));
        assert!(original.get("fresh").is_none());
        assert_eq!(original.len(), 50);
    }

    /// Invariant: all keys collide into one bucket and remain reachable;
    /// equality resolves within the single run.
    #[test]
    fn single_bucket_collision_pileup() {
        #[derive(Clone, Default)]
        struct ConstBuildHasher;
        struct ConstHasher;
        impl BuildHasher for ConstBuildHasher {
            type Hasher = ConstHasher;
            fn build_hasher(&self) -> ConstHasher {
                ConstHasher
            }
        }
        impl Hasher for ConstHasher {
            fn write(&mut self, _bytes: &[u8]) {}
            fn finish(&self) -> u64 {
                0
            }
        }

        let mut m: LinkedHashMap<String, i32, ConstBuildHasher> =
            LinkedHashMap::with_hasher(ConstBuildHasher);
        for i in 0..40 {
            m.insert(format!("k{i}"), i);
        }
        assert_eq!(m.len(), 40);
        for i in 0..40 {
            assert_eq!(m.get(&format!("k{i}")), Some(&i));
        }
        for i in (0..40).step_by(2) {
            assert_eq!(m.remove(&format!("k{i}")), Some(i));
        }
        for i in 0..40 {
            assert_eq!(m.contains_key(&format!("k{i}")), i % 2 == 1);
        }
    }

    /// Invariant: `Debug` renders as a map without panicking.
    #[test]
    fn debug_output_is_map_shaped() {
        let mut m: LinkedHashMap<u64, u64, IdentityBuildHasher> =
            LinkedHashMap::with_buckets_and_hasher(8, IdentityBuildHasher);
        m.insert(1, 10);
        let s = format!("{m:?}");
        assert_eq!(s, "{1: 10}");
    }

    /// Invariant: `FromIterator`/`Extend` behave like repeated insert,
    /// including replacement of duplicates.
    #[test]
    fn from_iterator_and_extend() {
        let mut m: LinkedHashMap<u64, u64> =
            vec![(1, 10), (2, 20), (1, 11)].into_iter().collect();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&1), Some(&11));
        m.extend(vec![(3, 30), (2, 21)]);
        assert_eq!(m.len(), 3);
        assert_eq!(m.get(&2), Some(&21));
    }
}
