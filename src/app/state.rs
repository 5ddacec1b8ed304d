use std::sync::Arc;

use time::OffsetDateTime;

use crate::app::actions::TabOpener;
use crate::catalog::{Catalog, LinkDefinition, LinkId};
use crate::compose::{compose, RenderRow};
use crate::config::RecencyOptions;
use crate::drag::{DragEvent, DragOutcome, DragReorder, HoverHint};
use crate::pins::{PinSet, PinSetManager, Placement, ReorderOutcome};
use crate::recency::{RecencyTracker, RecentRecord};
use crate::storage::{id_list, StorageKey, StoreAdapter};

/// Everything one popup session works with: the catalog, the user's pins
/// and recents (loaded once), and the drag in progress.
pub struct PopupState {
    catalog: Arc<Catalog>,
    pins: PinSetManager,
    recency: RecencyTracker,
    drag: DragReorder,
    store: StoreAdapter,
    opener: Box<dyn TabOpener>,
}

impl PopupState {
    pub fn load(
        catalog: Arc<Catalog>,
        store: StoreAdapter,
        recency_options: &RecencyOptions,
        opener: Box<dyn TabOpener>,
        now: OffsetDateTime,
    ) -> Self {
        let (pins, recency) = read_stored(&store, &catalog, recency_options, now);
        Self {
            pins: PinSetManager::new(catalog.clone(), pins, store.clone()),
            catalog,
            recency,
            drag: DragReorder::new(),
            store,
            opener,
        }
    }

    /// Re-reads pins and recents after pending saves land. Any drag in
    /// progress is dropped.
    pub fn reload(&mut self, recency_options: &RecencyOptions, now: OffsetDateTime) {
        self.store.flush();
        let (pins, recency) = read_stored(&self.store, &self.catalog, recency_options, now);
        self.pins = PinSetManager::new(self.catalog.clone(), pins, self.store.clone());
        self.recency = recency;
        self.drag = DragReorder::new();
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pins(&self) -> &PinSet {
        self.pins.pins()
    }

    pub fn recency(&self) -> &RecencyTracker {
        &self.recency
    }

    pub fn store(&self) -> &StoreAdapter {
        &self.store
    }

    pub fn compose(&self, now: OffsetDateTime) -> Vec<RenderRow<'_>> {
        compose(&self.catalog, self.pins.pins(), &self.recency, now)
    }

    pub fn toggle_pin(&mut self, id: &str) -> Option<bool> {
        self.pins.toggle(id)
    }

    pub fn reorder(&mut self, source: &str, target: &str, placement: Placement) -> ReorderOutcome {
        self.pins.reorder(source, target, placement)
    }

    /// Records the open and hands the link to the tab opener. Unknown ids
    /// are ignored and yield `None`.
    pub fn open_link(&mut self, id: &str, now: OffsetDateTime) -> Option<&LinkDefinition> {
        let Ok(link) = self.catalog.get(id) else {
            tracing::debug!(id, "ignoring open for unknown link");
            return None;
        };
        self.recency.record_open(link.id.clone(), now);
        let records = self.recency.to_records();
        match serde_json::to_value(records) {
            Ok(value) => {
                self.store.set(StorageKey::Recent, value);
            }
            Err(err) => tracing::warn!(?err, "failed to encode recent log"),
        }
        self.opener.open_tab(&link.target_uri);
        Some(link)
    }

    /// Feeds one drag event through the state machine. A drop applies its
    /// command and returns how the pin set took it.
    pub fn drag(&mut self, event: DragEvent) -> (DragOutcome, Option<ReorderOutcome>) {
        let outcome = self.drag.handle(event, self.pins.pins());
        let reordered = match &outcome {
            DragOutcome::Dropped(command) => Some(self.pins.reorder(
                command.source.as_str(),
                command.target.as_str(),
                command.placement,
            )),
            _ => None,
        };
        (outcome, reordered)
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_hint(&self) -> Option<&HoverHint> {
        self.drag.hint()
    }

    pub fn drag_source(&self) -> Option<&LinkId> {
        self.drag.source()
    }
}

fn read_stored(
    store: &StoreAdapter,
    catalog: &Catalog,
    recency_options: &RecencyOptions,
    now: OffsetDateTime,
) -> (PinSet, RecencyTracker) {
    let stored = store.get(Some(&[StorageKey::Pinned, StorageKey::Recent]));
    let pins = PinSet::from_stored(id_list(&stored, StorageKey::Pinned), catalog);
    let records = stored
        .get(StorageKey::Recent.as_ref())
        .map(|value| {
            serde_json::from_value::<Vec<RecentRecord>>(value.clone()).unwrap_or_else(|err| {
                tracing::warn!(?err, "ignoring malformed recent log");
                Vec::new()
            })
        })
        .unwrap_or_default();
    let recency = RecencyTracker::from_records(recency_options, records, catalog, now);
    tracing::debug!(
        pinned = pins.len(),
        recent = recency.entries().len(),
        "popup state loaded"
    );
    (pins, recency)
}
