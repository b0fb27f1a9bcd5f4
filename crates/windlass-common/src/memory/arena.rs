//! Index arena for plan-local trees.
//!
//! An arena owns every node of a tree in one contiguous vector. Children
//! are referenced by [`NodeId`], so parent and child never own each other
//! and the whole tree is freed at once when the arena is dropped.
//!
//! ```text
//!   Arena<Expr>
//!   ┌─────┬─────┬──────────────────┐
//!   │ #0  │ #1  │ #2 Add(#0, #1)   │
//!   └─────┴─────┴──────────────────┘
//! ```
//!
//! # Performance
//!
//! - Allocation: amortized O(1), a vector push
//! - Lookup: O(1) indexing
//! - Deallocation: bulk, when the arena is dropped or cleared

use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Handle to a node stored in an [`Arena`].
///
/// A `NodeId` is only meaningful for the arena that produced it.
pub struct NodeId<T> {
    index: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> NodeId<T> {
    #[inline]
    const fn new(index: u32) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Returns the raw slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

// Manual impls: derives would require `T: Clone` etc.
impl<T> Clone for NodeId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodeId<T> {}

impl<T> PartialEq for NodeId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for NodeId<T> {}

impl<T> std::hash::Hash for NodeId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for NodeId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

/// A typed, append-only node store.
///
/// # Example
///
/// ```rust
/// use windlass_common::memory::Arena;
///
/// let mut arena = Arena::new();
/// let a = arena.alloc("leaf");
/// let b = arena.alloc("root");
/// assert_eq!(arena[a], "leaf");
/// assert_eq!(arena.len(), 2);
/// assert_ne!(a, b);
/// ```
#[derive(Clone)]
pub struct Arena<T> {
    nodes: Vec<T>,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Creates an arena with room for `capacity` nodes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Stores a node and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if the arena already holds `u32::MAX` nodes.
    pub fn alloc(&mut self, node: T) -> NodeId<T> {
        let index = u32::try_from(self.nodes.len()).expect("arena exceeded u32::MAX nodes");
        self.nodes.push(node);
        NodeId::new(index)
    }

    /// Returns the node for a handle, if it belongs to this arena.
    #[inline]
    #[must_use]
    pub fn get(&self, id: NodeId<T>) -> Option<&T> {
        self.nodes.get(id.index())
    }

    /// Returns the number of stored nodes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the arena holds no nodes.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drops every node. Outstanding handles become dangling.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Iterates over `(handle, node)` pairs in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId<T>, &T)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::new(i as u32), node))
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<NodeId<T>> for Arena<T> {
    type Output = T;

    #[inline]
    fn index(&self, id: NodeId<T>) -> &T {
        &self.nodes[id.index()]
    }
}

impl<T> IndexMut<NodeId<T>> for Arena<T> {
    #[inline]
    fn index_mut(&mut self, id: NodeId<T>) -> &mut T {
        &mut self.nodes[id.index()]
    }
}

impl<T: fmt::Debug> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
