use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::db::Database;
use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

/// Position in the database's change history as seen by one connection.
///
/// `PRAGMA data_version` moves when another connection (or process) commits;
/// `total_changes()` moves on every write through this connection. Both only
/// grow, so a stamp that differs from the cached one means entries may be stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    data_version: i64,
    changes: i64,
}

impl Stamp {
    fn read(conn: &rusqlite::Connection) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            data_version: conn.query_row("PRAGMA data_version", [], |row| row.get(0))?,
            changes: conn.query_row("SELECT total_changes()", [], |row| row.get(0))?,
        })
    }

    fn newer_than(&self, other: &Stamp) -> bool {
        self != other && self.data_version >= other.data_version && self.changes >= other.changes
    }
}

#[derive(Default)]
struct Cache {
    stamp: Option<Stamp>,
    entries: HashMap<String, Value>,
}

impl Cache {
    /// Move to `stamp`, dropping entries cached under an older one.
    /// Returns false when the cache already reflects a newer state.
    fn advance(&mut self, stamp: Stamp) -> bool {
        match self.stamp {
            Some(current) if current == stamp => true,
            Some(current) if !stamp.newer_than(&current) => false,
            _ => {
                self.entries.clear();
                self.stamp = Some(stamp);
                true
            }
        }
    }
}

/// Key/value configuration persisted in SQLite with an in-process read cache.
///
/// Cached values are served only while the database has not changed since
/// they were read, so writes from other stores or processes sharing the file
/// are picked up on the next read. Clones share the same cache.
#[derive(Clone)]
pub struct ConfigStore {
    db: Database,
    cache: Arc<RwLock<Cache>>,
}

impl ConfigStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            cache: Arc::new(RwLock::new(Cache::default())),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<Value>, ServerError> {
        let stamp = self.db.with_conn_async(Stamp::read).await?;
        if let Some(hit) = self.cached(key, stamp) {
            return Ok(Some(hit));
        }

        let key_owned = key.to_string();
        let (stamp, raw): (Stamp, Option<String>) = self
            .db
            .with_conn_async(move |conn| {
                let raw = conn
                    .query_row(
                        "SELECT value FROM config WHERE key = ?1",
                        rusqlite::params![key_owned],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok((Stamp::read(conn)?, raw))
            })
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let value = parse_stored(key, &raw)?;
        self.remember(key, Some(value.clone()), stamp);
        Ok(Some(value))
    }

    pub async fn set(&self, key: &str, value: Value) -> Result<(), ServerError> {
        if key.trim().is_empty() {
            return Err(ServerError::BadRequest("config key must not be empty".to_string()));
        }
        let encoded = serde_json::to_string(&value)
            .map_err(|e| ServerError::Internal(format!("Failed to encode config value: {}", e)))?;
        let key_owned = key.to_string();
        let now = Utc::now().timestamp_millis();
        let stamp = self
            .db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO config (key, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET
                       value = excluded.value,
                       updated_at = excluded.updated_at",
                    rusqlite::params![key_owned, encoded, now],
                )?;
                Stamp::read(conn)
            })
            .await?;

        tracing::debug!("Config '{}' updated", key);
        self.remember(key, Some(value), stamp);
        Ok(())
    }

    /// Returns whether the key existed.
    pub async fn delete(&self, key: &str) -> Result<bool, ServerError> {
        let key_owned = key.to_string();
        let (removed, stamp) = self
            .db
            .with_conn_async(move |conn| {
                let removed =
                    conn.execute("DELETE FROM config WHERE key = ?1", rusqlite::params![key_owned])?;
                Ok((removed, Stamp::read(conn)?))
            })
            .await?;
        self.remember(key, None, stamp);
        Ok(removed > 0)
    }

    /// All entries, sorted by key. Always read from the database.
    pub async fn list(&self) -> Result<Vec<ConfigEntry>, ServerError> {
        let rows: Vec<(String, String, i64)> = self
            .db
            .with_conn_async(|conn| {
                let mut stmt =
                    conn.prepare("SELECT key, value, updated_at FROM config ORDER BY key")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(key, raw, updated_at)| {
                let value = parse_stored(&key, &raw)?;
                Ok(ConfigEntry {
                    key,
                    value,
                    updated_at: Utc
                        .timestamp_millis_opt(updated_at)
                        .single()
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect()
    }

    fn cached(&self, key: &str, stamp: Stamp) -> Option<Value> {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        if cache.stamp != Some(stamp) {
            return None;
        }
        cache.entries.get(key).cloned()
    }

    /// Record what the database held for `key` at `stamp`. Ignored when the
    /// cache has already moved past `stamp`.
    fn remember(&self, key: &str, value: Option<Value>, stamp: Stamp) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if !cache.advance(stamp) {
            return;
        }
        match value {
            Some(value) => {
                cache.entries.insert(key.to_string(), value);
            }
            None => {
                cache.entries.remove(key);
            }
        }
    }
}

fn parse_stored(key: &str, raw: &str) -> Result<Value, ServerError> {
    serde_json::from_str(raw)
        .map_err(|e| ServerError::Database(format!("Corrupt config value for '{}': {}", key, e)))
}
