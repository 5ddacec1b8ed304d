use std::collections::HashSet;
use std::sync::Arc;

use crate::catalog::{Catalog, LinkId};
use crate::storage::{StorageKey, StoreAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    Moved,
    /// Source and target were the same pinned link. Nothing moves, but the
    /// set is still persisted.
    Unchanged,
    /// Source or target is not pinned; nothing happened.
    Rejected,
}

/// The user's pinned links in display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSet {
    ids: Vec<LinkId>,
}

impl PinSet {
    /// Builds a pin set from stored ids, dropping anything the catalog does
    /// not know and repeated ids.
    pub fn from_stored<I, S>(ids: I, catalog: &Catalog) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id| catalog.contains(id))
            .filter(|id| seen.insert(id.clone()))
            .map(LinkId::new)
            .collect();
        Self { ids }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|pinned| pinned.as_str() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkId> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[LinkId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Removes `id` if pinned, otherwise appends it. Returns whether `id` is
    /// pinned afterwards.
    fn toggle(&mut self, id: LinkId) -> bool {
        match self.position(id.as_str()) {
            Some(position) => {
                self.ids.remove(position);
                false
            }
            None => {
                self.ids.push(id);
                true
            }
        }
    }

    fn reorder(&mut self, source: &str, target: &str, placement: Placement) -> ReorderOutcome {
        let (Some(from), Some(to)) = (self.position(source), self.position(target)) else {
            return ReorderOutcome::Rejected;
        };
        if from == to {
            return ReorderOutcome::Unchanged;
        }
        let moving = self.ids.remove(from);
        let anchor = if from < to { to - 1 } else { to };
        let insert_at = match placement {
            Placement::Before => anchor,
            Placement::After => anchor + 1,
        };
        self.ids.insert(insert_at, moving);
        ReorderOutcome::Moved
    }
}

/// Owns the in-memory pin set for a session and mirrors every change to the
/// store. The in-memory copy is authoritative; each save carries the whole
/// list so the last save to land always matches memory.
pub struct PinSetManager {
    catalog: Arc<Catalog>,
    pins: PinSet,
    store: StoreAdapter,
}

impl PinSetManager {
    pub fn new(catalog: Arc<Catalog>, pins: PinSet, store: StoreAdapter) -> Self {
        Self {
            catalog,
            pins,
            store,
        }
    }

    pub fn pins(&self) -> &PinSet {
        &self.pins
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pins.contains(id)
    }

    /// Returns `None` without touching anything when `id` is not in the
    /// catalog.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let Ok(link) = self.catalog.get(id) else {
            tracing::debug!(id, "ignoring pin toggle for unknown link");
            return None;
        };
        let pinned = self.pins.toggle(link.id.clone());
        tracing::debug!(id, pinned, "pin toggled");
        self.persist();
        Some(pinned)
    }

    pub fn reorder(&mut self, source: &str, target: &str, placement: Placement) -> ReorderOutcome {
        let outcome = self.pins.reorder(source, target, placement);
        match outcome {
            ReorderOutcome::Rejected => {
                tracing::debug!(source, target, "ignoring reorder of unpinned link");
            }
            ReorderOutcome::Moved | ReorderOutcome::Unchanged => {
                tracing::debug!(source, target, ?placement, ?outcome, "pins reordered");
                self.persist();
            }
        }
        outcome
    }

    fn persist(&self) {
        let ids: Vec<&str> = self.pins.iter().map(LinkId::as_str).collect();
        self.store.set(StorageKey::Pinned, serde_json::json!(ids));
    }
}
