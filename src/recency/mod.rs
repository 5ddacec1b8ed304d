use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::catalog::{Catalog, LinkId};
use crate::config::RecencyOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    pub id: LinkId,
    pub opened_at: OffsetDateTime,
}

/// Persisted shape of a recent entry: `{"url": "<id>", "ts": <unix millis>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRecord {
    #[serde(rename = "url")]
    pub id: String,
    #[serde(rename = "ts")]
    pub opened_at_ms: i64,
}

/// Most-recent-first log of opened links.
///
/// Only timestamps are kept; whether a link is "recent" is decided on every
/// query against the caller's clock.
#[derive(Debug, Clone)]
pub struct RecencyTracker {
    entries: Vec<RecentEntry>,
    cap: usize,
    interval: Duration,
}

impl RecencyTracker {
    pub fn new(options: &RecencyOptions) -> Self {
        Self {
            entries: Vec::new(),
            cap: options.cap.max(1),
            interval: options.interval(),
        }
    }

    /// Rebuilds the log from persisted records, dropping ids the catalog no
    /// longer knows and entries that can no longer be recent at `now`.
    /// Stamps later than `now` are clamped to `now`.
    pub fn from_records(
        options: &RecencyOptions,
        records: Vec<RecentRecord>,
        catalog: &Catalog,
        now: OffsetDateTime,
    ) -> Self {
        let mut tracker = Self::new(options);
        let mut entries: Vec<RecentEntry> = records
            .into_iter()
            .filter(|record| catalog.contains(&record.id))
            .filter_map(|record| {
                let opened_at = from_unix_millis(record.opened_at_ms)?.min(now);
                Some(RecentEntry {
                    id: LinkId::new(record.id),
                    opened_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));

        let mut seen = HashSet::new();
        entries.retain(|entry| seen.insert(entry.id.clone()));
        enforce_strict_order(&mut entries);

        tracker.entries = entries;
        let pruned = tracker.prune_expired(now);
        if pruned > 0 {
            tracing::debug!(pruned, "dropped expired recent entries on load");
        }
        tracker.entries.truncate(tracker.cap);
        tracker
    }

    pub fn record_open(&mut self, id: LinkId, now: OffsetDateTime) {
        self.entries.retain(|entry| entry.id != id);
        self.entries.insert(0, RecentEntry { id, opened_at: now });
        enforce_strict_order(&mut self.entries);
        self.entries.truncate(self.cap);
    }

    pub fn is_recent(&self, id: &str, now: OffsetDateTime) -> bool {
        self.entries
            .iter()
            .find(|entry| entry.id.as_str() == id)
            .map(|entry| now - entry.opened_at < self.interval)
            .unwrap_or(false)
    }

    pub fn most_recent_first(&self) -> impl Iterator<Item = &LinkId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    pub fn entries(&self) -> &[RecentEntry] {
        &self.entries
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drops entries that are no longer recent at `now`. Returns how many
    /// were removed.
    pub fn prune_expired(&mut self, now: OffsetDateTime) -> usize {
        let before = self.entries.len();
        let interval = self.interval;
        self.entries
            .retain(|entry| now - entry.opened_at < interval);
        before - self.entries.len()
    }

    pub fn to_records(&self) -> Vec<RecentRecord> {
        self.entries
            .iter()
            .map(|entry| RecentRecord {
                id: entry.id.to_string(),
                opened_at_ms: unix_millis(entry.opened_at),
            })
            .collect()
    }
}

/// Shifts entries back 1 ms where needed so stamps strictly decrease.
/// An entry that would fall below the representable range is dropped.
fn enforce_strict_order(entries: &mut Vec<RecentEntry>) {
    let mut ceiling: Option<OffsetDateTime> = None;
    entries.retain_mut(|entry| {
        if let Some(limit) = ceiling {
            if entry.opened_at >= limit {
                match limit.checked_sub(Duration::MILLISECOND) {
                    Some(shifted) => entry.opened_at = shifted,
                    None => return false,
                }
            }
        }
        ceiling = Some(entry.opened_at);
        true
    });
}

fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_unix_millis(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LinkDefinition;
    use time::PrimitiveDateTime;

    fn options(cap: usize) -> RecencyOptions {
        RecencyOptions {
            interval_ms: 10 * 60 * 1000,
            cap,
        }
    }

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
    }

    fn catalog() -> Catalog {
        Catalog::new(
            ["about", "history", "crashes", "apps"]
                .into_iter()
                .map(|id| LinkDefinition::new(id, id, format!("chrome://{id}")))
                .collect(),
        )
        .expect("valid catalog")
    }

    fn ids(tracker: &RecencyTracker) -> Vec<&str> {
        tracker.most_recent_first().map(LinkId::as_str).collect()
    }

    #[test]
    fn recent_until_interval_elapses() {
        let mut tracker = RecencyTracker::new(&options(10));
        tracker.record_open("about".into(), t0());

        assert!(tracker.is_recent("about", t0()));
        assert!(tracker.is_recent("about", t0() + Duration::minutes(10) - Duration::MILLISECOND));
        assert!(!tracker.is_recent("about", t0() + Duration::minutes(10)));
        assert!(!tracker.is_recent("history", t0()));
    }

    #[test]
    fn reopening_moves_entry_to_front_without_duplicating() {
        let mut tracker = RecencyTracker::new(&options(10));
        tracker.record_open("about".into(), t0());
        tracker.record_open("history".into(), t0() + Duration::seconds(1));
        tracker.record_open("about".into(), t0() + Duration::seconds(2));

        assert_eq!(ids(&tracker), ["about", "history"]);
        assert_eq!(tracker.entries()[0].opened_at, t0() + Duration::seconds(2));
    }

    #[test]
    fn oldest_entry_is_evicted_past_cap() {
        let mut tracker = RecencyTracker::new(&options(2));
        tracker.record_open("about".into(), t0());
        tracker.record_open("history".into(), t0() + Duration::seconds(1));
        tracker.record_open("crashes".into(), t0() + Duration::seconds(2));

        assert_eq!(ids(&tracker), ["crashes", "history"]);
    }

    #[test]
    fn same_instant_opens_stay_strictly_ordered() {
        let mut tracker = RecencyTracker::new(&options(10));
        tracker.record_open("about".into(), t0());
        tracker.record_open("history".into(), t0());
        tracker.record_open("crashes".into(), t0());

        let stamps: Vec<_> = tracker.entries().iter().map(|e| e.opened_at).collect();
        assert!(stamps.windows(2).all(|pair| pair[0] > pair[1]));
        assert_eq!(ids(&tracker), ["crashes", "history", "about"]);
    }

    #[test]
    fn load_sanitizes_persisted_records() {
        let now = t0();
        let ms = unix_millis(now);
        let records = vec![
            RecentRecord { id: "about".into(), opened_at_ms: ms - 500 },
            RecentRecord { id: "apps".into(), opened_at_ms: ms + 500 },
            RecentRecord { id: "gone".into(), opened_at_ms: ms },
            RecentRecord { id: "about".into(), opened_at_ms: ms - 900 },
            RecentRecord { id: "history".into(), opened_at_ms: ms - 60 * 60 * 1000 },
        ];

        let tracker = RecencyTracker::from_records(&options(10), records, &catalog(), now);
        assert_eq!(ids(&tracker), ["apps", "about"]);
        assert_eq!(unix_millis(tracker.entries()[1].opened_at), ms - 500);
        assert!(tracker.is_recent("apps", now));
        assert!(tracker.is_recent("about", now));
    }

    #[test]
    fn future_dated_record_is_clamped_to_now() {
        let now = t0();
        let records = vec![RecentRecord {
            id: "about".into(),
            opened_at_ms: unix_millis(now + Duration::hours(1)),
        }];
        let mut tracker = RecencyTracker::from_records(&options(10), records, &catalog(), now);
        assert_eq!(tracker.entries()[0].opened_at, now);

        tracker.record_open("apps".into(), now);
        assert_eq!(ids(&tracker), ["apps", "about"]);
        assert_eq!(tracker.entries()[0].opened_at, now);
        assert!(tracker.entries()[1].opened_at < now);
        assert!(!tracker.is_recent("apps", now + Duration::minutes(11)));
    }

    #[test]
    fn latest_representable_stamp_does_not_block_new_opens() {
        let now = t0();
        let records = vec![RecentRecord {
            id: "about".into(),
            opened_at_ms: 253_402_300_799_999,
        }];
        let mut tracker = RecencyTracker::from_records(&options(10), records, &catalog(), now);
        tracker.record_open("apps".into(), now);

        assert_eq!(ids(&tracker), ["apps", "about"]);
        assert_eq!(tracker.entries()[0].opened_at, now);
    }

    #[test]
    fn earliest_representable_stamps_load_without_shifting_out_of_range() {
        let floor = PrimitiveDateTime::MIN.assume_utc();
        let ms = unix_millis(floor);
        let records = vec![
            RecentRecord { id: "about".into(), opened_at_ms: ms },
            RecentRecord { id: "history".into(), opened_at_ms: ms },
        ];

        let now = floor + Duration::minutes(5);
        let tracker = RecencyTracker::from_records(&options(10), records, &catalog(), now);
        assert_eq!(ids(&tracker), ["about"]);
        assert!(tracker.is_recent("about", now));
    }

    #[test]
    fn records_round_trip_through_json_shape() -> anyhow::Result<()> {
        let mut tracker = RecencyTracker::new(&options(10));
        tracker.record_open("apps".into(), t0());
        let json = serde_json::to_value(tracker.to_records())?;
        assert_eq!(
            json,
            serde_json::json!([{ "url": "apps", "ts": 1_700_000_000_000i64 }])
        );
        Ok(())
    }
}
