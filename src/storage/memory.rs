use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::Value;

use super::{KeyValueStore, StoreArea, StoreError, StoreMap};

/// Process-local store. Backs `--in-memory` runs and tests; it can be
/// switched offline to exercise the degraded paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    areas: Mutex<HashMap<StoreArea, StoreMap>>,
    set_calls: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn with_values<I>(area: StoreArea, values: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Value)>,
    {
        let store = Self::default();
        {
            let mut areas = store.areas.lock();
            let map = areas.entry(area).or_default();
            for (key, value) in values {
                map.insert(key.to_owned(), value);
            }
        }
        store
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of `set` calls that reached the store, failed ones included.
    pub fn set_calls(&self) -> usize {
        self.set_calls.load(Ordering::SeqCst)
    }

    pub fn value(&self, area: StoreArea, key: &str) -> Option<Value> {
        self.areas
            .lock()
            .get(&area)
            .and_then(|map| map.get(key).cloned())
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".into()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, area: StoreArea, keys: Option<&[&str]>) -> Result<StoreMap, StoreError> {
        self.check_online()?;
        let areas = self.areas.lock();
        let Some(map) = areas.get(&area) else {
            return Ok(StoreMap::new());
        };
        Ok(match keys {
            None => map.clone(),
            Some(keys) => keys
                .iter()
                .filter_map(|key| map.get(*key).map(|value| ((*key).to_owned(), value.clone())))
                .collect(),
        })
    }

    fn set(&self, area: StoreArea, key: &str, value: &Value) -> Result<(), StoreError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        self.areas
            .lock()
            .entry(area)
            .or_default()
            .insert(key.to_owned(), value.clone());
        Ok(())
    }
}
