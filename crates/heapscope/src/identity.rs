//! Identity extraction and the per-call bookkeeping built on it.
//!
//! An [`Identity`] is the address of a heap slot. It is stable for the life of the
//! heap and is what both walkers key their state on: the size estimator's
//! [`VisitedSet`] and the inspector's [`SeenMap`]. Each walk owns a fresh instance,
//! so nothing carries over between calls.

use std::fmt;

use ahash::AHashSet;
use indexmap::IndexSet;

use crate::{
    error::{HeapError, HeapResult},
    heap::{Heap, HeapId},
    kind::Kind,
};

/// Stable reference-equality key for a heap value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Identity(HeapId);

impl Identity {
    #[must_use]
    pub fn of(id: HeapId) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn heap_id(self) -> HeapId {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0.address())
    }
}

/// Returns the identity string of a value.
#[must_use]
pub fn identity_of(id: HeapId) -> String {
    Identity::of(id).to_string()
}

/// Returns one identity string per element of a character vector or list, or per
/// live binding of an environment.
///
/// Compact wrappers presenting as one of those vectors report their
/// materialized elements.
pub fn identity_of_many(heap: &Heap, id: HeapId) -> HeapResult<Vec<String>> {
    Ok(container_items(heap, id)?.into_iter().map(identity_of).collect())
}

/// Returns the host's approximate sharing count for a value.
#[must_use]
pub fn refs(heap: &Heap, id: HeapId) -> u8 {
    heap.approximate_sharing_count(id)
}

/// Returns sharing counts with the same enumeration rules as [`identity_of_many`].
pub fn refs_of_many(heap: &Heap, id: HeapId) -> HeapResult<Vec<u8>> {
    Ok(container_items(heap, id)?
        .into_iter()
        .map(|item| heap.approximate_sharing_count(item))
        .collect())
}

fn container_items(heap: &Heap, id: HeapId) -> HeapResult<Vec<HeapId>> {
    match heap.kind_of(id) {
        Kind::Character | Kind::List | Kind::Expression => Ok(heap.elements(id).to_vec()),
        Kind::Environment => Ok(heap.bindings(id).into_iter().map(|b| b.value).collect()),
        kind => Err(HeapError::NotAContainer { kind }),
    }
}

/// Identities already charged during one size computation.
///
/// Zero-cost singletons are never inserted: they are free on every occurrence and
/// never reported as shared.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: AHashSet<HeapId>,
}

impl VisitedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id`, returning true if it was not present before.
    pub fn mark_if_new(&mut self, id: HeapId) -> bool {
        self.seen.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: HeapId) -> bool {
        self.seen.contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Sequential ids handed out during one inspection, in first-visit order.
///
/// Ids start at 1. Insertion order doubles as the id, so no separate counter is kept.
#[derive(Debug, Default)]
pub struct SeenMap {
    order: IndexSet<HeapId, ahash::RandomState>,
}

impl SeenMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id already assigned to `id`, if any.
    #[must_use]
    pub fn get(&self, id: HeapId) -> Option<usize> {
        self.order.get_index_of(&id).map(|index| index + 1)
    }

    /// Assigns the next id to `id`, or returns the existing one.
    ///
    /// The flag is true when the id was freshly assigned.
    pub fn assign(&mut self, id: HeapId) -> (usize, bool) {
        let (index, inserted) = self.order.insert_full(id);
        (index + 1, inserted)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
