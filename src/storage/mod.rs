use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use thiserror::Error;
use time::OffsetDateTime;

use crate::config::StorageOptions;

mod memory;
mod schema;
mod writer;

pub use memory::MemoryStore;

use self::writer::WriteBehind;

/// Key/value pairs read from one store area, in key order.
pub type StoreMap = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StoreArea {
    /// Device-only area. Pins lived here before they were synced.
    Local,
    Sync,
}

/// Keys the adapter is allowed to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum StorageKey {
    Pinned,
    Recent,
}

impl StorageKey {
    pub fn area(self) -> StoreArea {
        StoreArea::Sync
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(#[from] rusqlite::Error),
    #[error("failed to encode stored value: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store writer has shut down")]
    WriterClosed,
}

/// Raw durable store. `keys == None` reads the whole area; absent keys are
/// left out of the result.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, area: StoreArea, keys: Option<&[&str]>) -> Result<StoreMap, StoreError>;
    fn set(&self, area: StoreArea, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// SQLite-backed store, one row per `(area, key)` holding a JSON value.
#[derive(Clone)]
pub struct SqliteStore {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl SqliteStore {
    pub fn open(options: &StorageOptions) -> anyhow::Result<Self> {
        let db_path = &options.database_path;
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening database {}", db_path.display()))?;
        prepare_connection(&conn, options).context("preparing store connection")?;
        schema::apply(&conn)?;
        Ok(Self {
            db_path: Arc::new(db_path.clone()),
            options: Arc::new(options.clone()),
        })
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError>,
    {
        let conn = Connection::open(&*self.db_path)?;
        prepare_connection(&conn, &self.options)?;
        f(&conn)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, area: StoreArea, keys: Option<&[&str]>) -> Result<StoreMap, StoreError> {
        self.with_connection(|conn| {
            let mut result = StoreMap::new();
            match keys {
                None => {
                    let mut stmt =
                        conn.prepare("SELECT key, value FROM kv WHERE area = ?1 ORDER BY key")?;
                    let rows = stmt.query_map(params![area.as_ref()], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?;
                    for row in rows {
                        let (key, raw) = row?;
                        result.insert(key, serde_json::from_str(&raw)?);
                    }
                }
                Some(keys) => {
                    let mut stmt =
                        conn.prepare("SELECT value FROM kv WHERE area = ?1 AND key = ?2")?;
                    for key in keys {
                        let raw: Option<String> = stmt
                            .query_row(params![area.as_ref(), key], |row| row.get(0))
                            .optional()?;
                        if let Some(raw) = raw {
                            result.insert((*key).to_owned(), serde_json::from_str(&raw)?);
                        }
                    }
                }
            }
            Ok(result)
        })
    }

    fn set(&self, area: StoreArea, key: &str, value: &Value) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.with_connection(|conn| {
            let now = OffsetDateTime::now_utc().unix_timestamp();
            conn.execute(
                "INSERT INTO kv (area, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(area, key) DO UPDATE SET value = excluded.value,
                                                     updated_at = excluded.updated_at",
                params![area.as_ref(), key, raw, now],
            )?;
            Ok(())
        })
    }
}

fn prepare_connection(conn: &Connection, options: &StorageOptions) -> rusqlite::Result<()> {
    conn.busy_timeout(options.busy_timeout())?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Completion signal for a save. Dropping it is fine: saves are
/// fire-and-forget from the caller's point of view.
#[derive(Debug)]
pub struct SaveReceipt {
    rx: Receiver<Result<(), StoreError>>,
}

impl SaveReceipt {
    fn new(rx: Receiver<Result<(), StoreError>>) -> Self {
        Self { rx }
    }

    fn ready(result: Result<(), StoreError>) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let _ = tx.send(result);
        Self { rx }
    }

    /// Blocks until the save has been applied or rejected.
    pub fn wait(self) -> Result<(), StoreError> {
        self.rx.recv().unwrap_or(Err(StoreError::WriterClosed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated { count: usize },
    /// Nothing in the legacy location.
    LegacyEmpty,
    /// The synced location already holds pins; the legacy copy is left alone.
    SyncPopulated,
}

/// Front door to the durable store for the rest of the crate.
///
/// Reads fail soft (an unavailable store reads as empty). Writes go through
/// the background writer unless the adapter was built `inline`.
#[derive(Clone)]
pub struct StoreAdapter {
    backend: Arc<dyn KeyValueStore>,
    writer: Option<Arc<WriteBehind>>,
}

impl StoreAdapter {
    /// Applies every save on the calling thread.
    pub fn inline(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            backend,
            writer: None,
        }
    }

    pub fn write_behind(backend: Arc<dyn KeyValueStore>) -> Result<Self, StoreError> {
        let writer = WriteBehind::spawn(backend.clone())?;
        Ok(Self {
            backend,
            writer: Some(Arc::new(writer)),
        })
    }

    pub fn from_options(
        backend: Arc<dyn KeyValueStore>,
        options: &StorageOptions,
    ) -> Result<Self, StoreError> {
        if options.write_behind {
            Self::write_behind(backend)
        } else {
            Ok(Self::inline(backend))
        }
    }

    /// Reads the given keys, or every stored key when `keys` is `None`.
    pub fn get(&self, keys: Option<&[StorageKey]>) -> StoreMap {
        let names: Option<Vec<&str>> = keys.map(|keys| keys.iter().map(|k| k.as_ref()).collect());
        match self.backend.get(StoreArea::Sync, names.as_deref()) {
            Ok(map) => map,
            Err(err) => {
                tracing::warn!(?err, "store read failed, continuing with empty state");
                StoreMap::new()
            }
        }
    }

    pub fn set(&self, key: StorageKey, value: Value) -> SaveReceipt {
        match &self.writer {
            Some(writer) => writer.enqueue(key, value),
            None => {
                let result = self.backend.set(key.area(), key.as_ref(), &value);
                if let Err(err) = &result {
                    tracing::warn!(?err, key = key.as_ref(), "save failed");
                }
                SaveReceipt::ready(result)
            }
        }
    }

    /// Blocks until every save issued so far has been applied.
    pub fn flush(&self) {
        if let Some(writer) = &self.writer {
            writer.flush();
        }
    }

    /// Moves pins from the legacy local area into the synced area, once.
    pub fn migrate_storage(&self) -> Result<MigrationOutcome, StoreError> {
        let key = StorageKey::Pinned;
        let legacy = self.backend.get(StoreArea::Local, Some(&[key.as_ref()]))?;
        let legacy = id_list(&legacy, key);
        if legacy.is_empty() {
            return Ok(MigrationOutcome::LegacyEmpty);
        }

        let synced = self.backend.get(key.area(), Some(&[key.as_ref()]))?;
        if !id_list(&synced, key).is_empty() {
            tracing::info!("synced pins already present, skipping migration");
            return Ok(MigrationOutcome::SyncPopulated);
        }

        self.flush();
        self.backend
            .set(key.area(), key.as_ref(), &serde_json::json!(legacy))?;
        self.backend
            .set(StoreArea::Local, key.as_ref(), &serde_json::json!([]))?;
        tracing::info!(count = legacy.len(), "migrated pins to synced storage");
        Ok(MigrationOutcome::Migrated {
            count: legacy.len(),
        })
    }
}

/// Reads a stored list of link ids; anything malformed reads as empty.
pub fn id_list(map: &StoreMap, key: StorageKey) -> Vec<String> {
    let Some(value) = map.get(key.as_ref()) else {
        return Vec::new();
    };
    match serde_json::from_value::<Vec<String>>(value.clone()) {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(?err, key = key.as_ref(), "ignoring malformed stored id list");
            Vec::new()
        }
    }
}
