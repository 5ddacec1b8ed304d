use std::collections::HashSet;

use time::OffsetDateTime;

use crate::catalog::{Catalog, LinkDefinition};
use crate::pins::PinSet;
use crate::recency::RecencyTracker;

/// One row of the popup, annotated for rendering. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderRow<'a> {
    pub definition: &'a LinkDefinition,
    pub pinned: bool,
    pub recent: bool,
}

/// Orders the whole catalog for display at `now`.
///
/// Pinned links come first in pin order. The rest follow with links that
/// are recent at `now` ahead (newest first), then everything else in
/// catalog order.
pub fn compose<'a>(
    catalog: &'a Catalog,
    pins: &PinSet,
    recency: &RecencyTracker,
    now: OffsetDateTime,
) -> Vec<RenderRow<'a>> {
    let mut rows = Vec::with_capacity(catalog.len());
    let mut placed: HashSet<&str> = HashSet::with_capacity(catalog.len());

    let pinned = pins.iter().filter_map(|id| catalog.get(id.as_str()).ok());
    let recent = recency
        .most_recent_first()
        .filter(|id| !pins.contains(id.as_str()) && recency.is_recent(id.as_str(), now))
        .filter_map(|id| catalog.get(id.as_str()).ok());
    let remaining = catalog.iter();

    for definition in pinned.chain(recent).chain(remaining) {
        if !placed.insert(definition.id.as_str()) {
            continue;
        }
        rows.push(RenderRow {
            definition,
            pinned: pins.contains(definition.id.as_str()),
            recent: recency.is_recent(definition.id.as_str(), now),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecencyOptions;
    use crate::recency::RecentRecord;
    use time::Duration;

    fn catalog() -> Catalog {
        Catalog::new(
            ["about", "history", "crashes", "apps"]
                .into_iter()
                .map(|id| LinkDefinition::new(id, id, format!("chrome://{id}")))
                .collect(),
        )
        .expect("valid catalog")
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    fn ids<'a>(rows: &[RenderRow<'a>]) -> Vec<&'a str> {
        rows.iter().map(|row| row.definition.id.as_str()).collect()
    }

    #[test]
    fn pinned_rows_lead_then_recent_unpinned() {
        let catalog = catalog();
        let pins = PinSet::from_stored(["about", "history", "crashes"], &catalog);
        let ms = now().unix_timestamp() * 1000;
        let recency = RecencyTracker::from_records(
            &RecencyOptions::default(),
            vec![
                RecentRecord { id: "apps".into(), opened_at_ms: ms },
                RecentRecord { id: "about".into(), opened_at_ms: ms - 500 },
            ],
            &catalog,
            now(),
        );

        let rows = compose(&catalog, &pins, &recency, now());
        assert_eq!(ids(&rows), ["about", "history", "crashes", "apps"]);
        let flags: Vec<_> = rows.iter().map(|row| (row.pinned, row.recent)).collect();
        assert_eq!(
            flags,
            [(true, true), (true, false), (true, false), (false, true)]
        );
    }

    #[test]
    fn empty_state_renders_catalog_in_canonical_order() {
        let catalog = catalog();
        let pins = PinSet::default();
        let recency = RecencyTracker::new(&RecencyOptions::default());

        let rows = compose(&catalog, &pins, &recency, now());
        assert_eq!(ids(&rows), ["about", "history", "crashes", "apps"]);
        assert!(rows.iter().all(|row| !row.pinned && !row.recent));
    }

    #[test]
    fn recent_unpinned_rows_sort_newest_first() {
        let catalog = catalog();
        let pins = PinSet::from_stored(["crashes"], &catalog);
        let mut recency = RecencyTracker::new(&RecencyOptions::default());
        recency.record_open("history".into(), now() - Duration::minutes(2));
        recency.record_open("apps".into(), now() - Duration::minutes(1));

        let rows = compose(&catalog, &pins, &recency, now());
        assert_eq!(ids(&rows), ["crashes", "apps", "history", "about"]);
    }

    #[test]
    fn expired_recency_falls_back_to_catalog_order() {
        let catalog = catalog();
        let pins = PinSet::default();
        let mut recency = RecencyTracker::new(&RecencyOptions::default());
        recency.record_open("apps".into(), now());

        let later = now() + Duration::minutes(11);
        let rows = compose(&catalog, &pins, &recency, later);
        assert_eq!(ids(&rows), ["about", "history", "crashes", "apps"]);
        assert!(rows.iter().all(|row| !row.recent));
    }

    #[test]
    fn every_pinned_row_precedes_every_unpinned_row() {
        let catalog = catalog();
        let pins = PinSet::from_stored(["apps", "about"], &catalog);
        let mut recency = RecencyTracker::new(&RecencyOptions::default());
        recency.record_open("crashes".into(), now());

        let rows = compose(&catalog, &pins, &recency, now());
        let first_unpinned = rows.iter().position(|row| !row.pinned).unwrap_or(rows.len());
        assert!(rows[first_unpinned..].iter().all(|row| !row.pinned));
        assert_eq!(ids(&rows[..first_unpinned]), ["apps", "about"]);
        assert_eq!(rows.len(), catalog.len());
    }
}
