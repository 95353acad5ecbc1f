//! Per-key JSON storage.
//!
//! Mirrors the browser storage the app used before: string keys, JSON string
//! values, no per-value versioning.  The fixed keys live in [`StorageKey`];
//! raw string keys are available for anything else.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::database::Database;
use crate::error::{Result, StoreError};

/// The fixed storage slots used by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
    FollowedUsers,
    BookedTrips,
    Communities,
    Conversations,
    Messages,
    Notifications,
    MockUser,
    /// Whether the stored mock identity is the active session.
    MockActive,
    Posts,
    Events,
    Resources,
}

impl StorageKey {
    pub const ALL: [StorageKey; 11] = [
        StorageKey::FollowedUsers,
        StorageKey::BookedTrips,
        StorageKey::Communities,
        StorageKey::Conversations,
        StorageKey::Messages,
        StorageKey::Notifications,
        StorageKey::MockUser,
        StorageKey::MockActive,
        StorageKey::Posts,
        StorageKey::Events,
        StorageKey::Resources,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageKey::FollowedUsers => "followedUsers",
            StorageKey::BookedTrips => "bookedTrips",
            StorageKey::Communities => "communities",
            StorageKey::Conversations => "conversations",
            StorageKey::Messages => "messages",
            StorageKey::Notifications => "notifications",
            StorageKey::MockUser => "mockUser",
            StorageKey::MockActive => "mockActive",
            StorageKey::Posts => "posts",
            StorageKey::Events => "events",
            StorageKey::Resources => "resources",
        }
    }
}

impl std::fmt::Display for StorageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Database {
    // ------------------------------------------------------------------
    // Raw string API
    // ------------------------------------------------------------------

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Returns `true` if the key existed.
    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM local_storage WHERE key = ?1", params![key])?;
        Ok(affected > 0)
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT key FROM local_storage ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// When the key was last written, if it exists.
    pub fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = self
            .conn()
            .query_row(
                "SELECT updated_at FROM local_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(ts) => Ok(Some(
                DateTime::parse_from_rfc3339(&ts)?.with_timezone(&Utc),
            )),
            None => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Typed JSON API
    // ------------------------------------------------------------------

    /// Read and decode a fixed slot.  `Ok(None)` when the slot is empty.
    pub fn load<T: DeserializeOwned>(&self, key: StorageKey) -> Result<Option<T>> {
        match self.get_item(key.as_str())? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.as_str().to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Like [`Database::load`], but an empty or corrupt slot yields
    /// `T::default()`.  Corruption is logged; SQLite errors still propagate.
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: StorageKey) -> Result<T> {
        match self.load(key) {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(StoreError::Corrupt { key, source }) => {
                tracing::warn!(%key, error = %source, "discarding corrupt local value");
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.set_item(key.as_str(), &json)?;
        tracing::trace!(%key, bytes = json.len(), "saved local value");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().expect("in-memory db")
    }

    #[test]
    fn raw_items_overwrite() {
        let db = db();
        assert_eq!(db.get_item("a").unwrap(), None);

        db.set_item("a", "1").unwrap();
        db.set_item("a", "2").unwrap();
        assert_eq!(db.get_item("a").unwrap().as_deref(), Some("2"));
        assert_eq!(db.keys().unwrap(), vec!["a".to_string()]);
        assert!(db.updated_at("a").unwrap().is_some());

        assert!(db.remove_item("a").unwrap());
        assert!(!db.remove_item("a").unwrap());
    }

    #[test]
    fn typed_values_use_fixed_key_names() {
        let db = db();
        db.save(StorageKey::BookedTrips, &vec!["trip-1", "trip-2"])
            .unwrap();

        let raw = db.get_item("bookedTrips").unwrap().unwrap();
        assert_eq!(raw, r#"["trip-1","trip-2"]"#);

        let loaded: Vec<String> = db.load(StorageKey::BookedTrips).unwrap().unwrap();
        assert_eq!(loaded, vec!["trip-1", "trip-2"]);
    }

    #[test]
    fn corrupt_value_is_reported_or_defaulted() {
        let db = db();
        db.set_item("followedUsers", "{not json").unwrap();

        let err = db.load::<Vec<String>>(StorageKey::FollowedUsers).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == "followedUsers"));

        let fallback: Vec<String> = db.load_or_default(StorageKey::FollowedUsers).unwrap();
        assert!(fallback.is_empty());
    }

    #[test]
    fn key_names_are_unique() {
        let mut names: Vec<_> = StorageKey::ALL.iter().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), StorageKey::ALL.len());
    }
}
