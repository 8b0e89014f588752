//! Arena-backed circular doubly linked list.
//!
//! Nodes live in a `SlotMap` and address each other through generational
//! keys instead of raw pointers, so a freed node's handle never resolves
//! again and never aliases a later insertion. The ring is closed by one
//! permanently allocated sentinel node that carries no value; an empty list
//! is the sentinel linked to itself.
//!
//! Handles to untouched nodes stay valid across unrelated inserts and
//! unlinks. The detach/splice primitives relink existing nodes without
//! moving their values, which is what lets the map rebuild its bucket order
//! during rehash while every outstanding [`NodeRef`] survives.

use core::marker::PhantomData;
use core::ptr::NonNull;
use slotmap::{DefaultKey, SecondaryMap, SlotMap};

/// Stable handle to one list node. Copyable, comparable, hashable; resolves
/// to nothing once the node it named has been unlinked.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeRef(DefaultKey);

#[derive(Debug)]
struct Node<T> {
    /// `None` only for the sentinel.
    value: Option<T>,
    prev: DefaultKey,
    next: DefaultKey,
}

#[derive(Debug)]
pub(crate) struct NodeList<T> {
    arena: SlotMap<DefaultKey, Node<T>>,
    sentinel: DefaultKey,
    len: usize,
}

impl<T> NodeList<T> {
    pub(crate) fn new() -> Self {
        let mut arena = SlotMap::with_key();
        let sentinel = arena.insert_with_key(|k| Node {
            value: None,
            prev: k,
            next: k,
        });
        Self {
            arena,
            sentinel,
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of a live node; `None` for stale handles and the sentinel.
    pub(crate) fn get(&self, node: NodeRef) -> Option<&T> {
        self.arena.get(node.0)?.value.as_ref()
    }

    pub(crate) fn get_mut(&mut self, node: NodeRef) -> Option<&mut T> {
        self.arena.get_mut(node.0)?.value.as_mut()
    }

    pub(crate) fn contains(&self, node: NodeRef) -> bool {
        self.get(node).is_some()
    }

    pub(crate) fn front(&self) -> Option<NodeRef> {
        self.neighbor_of(self.sentinel, Direction::Forward)
    }

    pub(crate) fn back(&self) -> Option<NodeRef> {
        self.neighbor_of(self.sentinel, Direction::Backward)
    }

    /// Node after `node`, skipping the sentinel. `None` for stale handles
    /// and at the back of the list.
    pub(crate) fn next(&self, node: NodeRef) -> Option<NodeRef> {
        self.get(node)?;
        self.neighbor_of(node.0, Direction::Forward)
    }

    /// Node before `node`, mirror of [`next`](Self::next).
    pub(crate) fn prev(&self, node: NodeRef) -> Option<NodeRef> {
        self.get(node)?;
        self.neighbor_of(node.0, Direction::Backward)
    }

    fn neighbor_of(&self, key: DefaultKey, dir: Direction) -> Option<NodeRef> {
        let node = self.arena.get(key)?;
        let neighbor = match dir {
            Direction::Forward => node.next,
            Direction::Backward => node.prev,
        };
        if neighbor == self.sentinel {
            None
        } else {
            Some(NodeRef(neighbor))
        }
    }

    /// Raw successor link; may name the sentinel. Callers must pass a handle
    /// that is live in this list (the sentinel included).
    pub(crate) fn next_link(&self, node: NodeRef) -> NodeRef {
        NodeRef(self.arena[node.0].next)
    }

    /// Raw predecessor link; may name the sentinel.
    pub(crate) fn prev_link(&self, node: NodeRef) -> NodeRef {
        NodeRef(self.arena[node.0].prev)
    }

    /// Current tail, or the sentinel when the list is empty. This is the
    /// splice anchor for an append.
    pub(crate) fn back_link(&self) -> NodeRef {
        NodeRef(self.arena[self.sentinel].prev)
    }

    /// Insert a fully constructed value before `pos` (`pos` may be the
    /// sentinel, which appends). Neighbors are only rewired after the node
    /// exists, so a failed allocation leaves the ring untouched.
    pub(crate) fn insert_before(&mut self, pos: NodeRef, value: T) -> NodeRef {
        let prev = self.arena[pos.0].prev;
        self.link_new(prev, pos.0, value)
    }

    /// Insert a fully constructed value right after `pos`.
    pub(crate) fn insert_after(&mut self, pos: NodeRef, value: T) -> NodeRef {
        let next = self.arena[pos.0].next;
        self.link_new(pos.0, next, value)
    }

    pub(crate) fn push_back(&mut self, value: T) -> NodeRef {
        self.insert_before(NodeRef(self.sentinel), value)
    }

    fn link_new(&mut self, prev: DefaultKey, next: DefaultKey, value: T) -> NodeRef {
        let key = self.arena.insert(Node {
            value: Some(value),
            prev,
            next,
        });
        self.arena[prev].next = key;
        self.arena[next].prev = key;
        self.len += 1;
        NodeRef(key)
    }

    /// Unlink a node and return its value. Stale handles and the sentinel
    /// yield `None` and leave the list unchanged. Only the handle of the
    /// removed node is invalidated.
    pub(crate) fn unlink(&mut self, node: NodeRef) -> Option<T> {
        let slot = self.arena.get(node.0)?;
        slot.value.as_ref()?;
        let (prev, next) = (slot.prev, slot.next);
        let removed = self.arena.remove(node.0)?;
        self.arena[prev].next = next;
        self.arena[next].prev = prev;
        self.len -= 1;
        removed.value
    }

    /// Detach every node from the ring in order, leaving the list logically
    /// empty. The nodes keep their values and handles; their links are stale
    /// until re-spliced via [`splice_back`](Self::splice_back) or
    /// [`splice_after`](Self::splice_after).
    pub(crate) fn detach_all(&mut self) -> Vec<NodeRef> {
        let mut order = Vec::with_capacity(self.len);
        let mut cur = self.arena[self.sentinel].next;
        while cur != self.sentinel {
            order.push(NodeRef(cur));
            cur = self.arena[cur].next;
        }
        let sentinel = &mut self.arena[self.sentinel];
        sentinel.prev = self.sentinel;
        sentinel.next = self.sentinel;
        self.len = 0;
        order
    }

    /// Re-splice a detached node at the tail of the ring.
    pub(crate) fn splice_back(&mut self, node: NodeRef) {
        self.splice_after(self.back_link(), node);
    }

    /// Re-splice a detached node right after `anchor` (possibly the
    /// sentinel). `node` must currently be outside the ring.
    pub(crate) fn splice_after(&mut self, anchor: NodeRef, node: NodeRef) {
        let next = self.arena[anchor.0].next;
        {
            let n = &mut self.arena[node.0];
            n.prev = anchor.0;
            n.next = next;
        }
        self.arena[anchor.0].next = node.0;
        self.arena[next].prev = node.0;
        self.len += 1;
    }

    /// Drop every node and start over with a fresh sentinel. All outstanding
    /// handles become stale.
    pub(crate) fn clear(&mut self) {
        self.arena.clear();
        self.sentinel = self.arena.insert_with_key(|k| Node {
            value: None,
            prev: k,
            next: k,
        });
        self.len = 0;
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            head: self.arena[self.sentinel].next,
            tail: self.arena[self.sentinel].prev,
            remaining: self.len,
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, T> {
        let mut order = Vec::with_capacity(self.len);
        let mut cur = self.arena[self.sentinel].next;
        while cur != self.sentinel {
            order.push(NodeRef(cur));
            cur = self.arena[cur].next;
        }
        // One pointer per live value, harvested through the arena's own
        // streaming iterator. No reference overlapping the arena is created
        // after this point for the iterator's lifetime.
        let mut slots = SecondaryMap::new();
        for (key, node) in self.arena.iter_mut() {
            if let Some(value) = node.value.as_mut() {
                slots.insert(key, NonNull::from(value));
            }
        }
        IterMut {
            order: order.into_iter(),
            slots,
            _borrow: PhantomData,
        }
    }
}

#[derive(Copy, Clone)]
enum Direction {
    Forward,
    Backward,
}

/// Borrowing iterator in ring order.
pub(crate) struct Iter<'a, T> {
    list: &'a NodeList<T>,
    head: DefaultKey,
    tail: DefaultKey,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeRef, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let key = self.head;
        let node = self.list.arena.get(key)?;
        self.head = node.next;
        node.value.as_ref().map(|v| (NodeRef(key), v))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let key = self.tail;
        let node = self.list.arena.get(key)?;
        self.tail = node.prev;
        node.value.as_ref().map(|v| (NodeRef(key), v))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

/// Mutably borrowing iterator in ring order.
///
/// Node pointers are harvested up front, one per live node, so every yielded
/// `&mut T` stands on its own borrow and stays valid after the iterator
/// advances past it or is dropped. Collecting all items before writing
/// through any of them is fine.
pub(crate) struct IterMut<'a, T> {
    order: std::vec::IntoIter<NodeRef>,
    slots: SecondaryMap<DefaultKey, NonNull<T>>,
    _borrow: PhantomData<&'a mut NodeList<T>>,
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = (NodeRef, &'a mut T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.order.next()?;
        let ptr = self.slots.remove(node.0)?;
        // Safety: the pointer was taken from a distinct live slot while the
        // list was exclusively borrowed for 'a, `remove` yields it at most
        // once, and no reference overlapping the arena exists while the
        // iterator is alive.
        Some((node, unsafe { &mut *ptr.as_ptr() }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.order.len(), Some(self.order.len()))
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let node = self.order.next_back()?;
        let ptr = self.slots.remove(node.0)?;
        // Safety: see `next`.
        Some((node, unsafe { &mut *ptr.as_ptr() }))
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
