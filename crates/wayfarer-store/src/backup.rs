use std::collections::BTreeMap;

use chrono::Utc;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Result;

/// Full local-storage snapshot, serialized to JSON for export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupPayload {
    /// ISO 8601 timestamp of when the backup was created
    pub created_at: String,
    /// App version that produced the backup
    pub version: String,
    /// Every stored key with its decoded JSON value
    pub items: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub items_imported: usize,
    pub items_skipped: usize,
}

impl Database {
    /// Export every stored key into a serializable struct.
    ///
    /// Values that are not valid JSON are exported as JSON strings so that
    /// nothing is silently lost.
    pub fn export_backup(&self) -> Result<BackupPayload> {
        let mut items = BTreeMap::new();
        for key in self.keys()? {
            if let Some(raw) = self.get_item(&key)? {
                let value = serde_json::from_str(&raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
                items.insert(key, value);
            }
        }

        tracing::info!(items = items.len(), "exported local storage backup");

        Ok(BackupPayload {
            created_at: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            items,
        })
    }

    /// Import a backup payload, merging with existing data (INSERT OR IGNORE):
    /// keys already present locally are left untouched.
    pub fn import_backup(&self, payload: &BackupPayload) -> Result<ImportStats> {
        let mut stats = ImportStats::default();
        let now = Utc::now().to_rfc3339();

        for (key, value) in &payload.items {
            let json = serde_json::to_string(value)?;
            let inserted = self.conn().execute(
                "INSERT OR IGNORE INTO local_storage (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, json, now],
            )?;
            if inserted == 1 {
                stats.items_imported += 1;
            } else {
                stats.items_skipped += 1;
            }
        }

        tracing::info!(
            imported = stats.items_imported,
            skipped = stats.items_skipped,
            "imported local storage backup"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_storage::StorageKey;

    #[test]
    fn export_then_import_merges_without_overwriting() {
        let source = Database::open_in_memory().unwrap();
        source.save(StorageKey::BookedTrips, &vec!["t1"]).unwrap();
        source.save(StorageKey::FollowedUsers, &vec!["alice"]).unwrap();

        let payload = source.export_backup().unwrap();
        assert_eq!(payload.items.len(), 2);

        let target = Database::open_in_memory().unwrap();
        target.save(StorageKey::BookedTrips, &vec!["mine"]).unwrap();

        let stats = target.import_backup(&payload).unwrap();
        assert_eq!(
            stats,
            ImportStats {
                items_imported: 1,
                items_skipped: 1
            }
        );

        let trips: Vec<String> = target.load(StorageKey::BookedTrips).unwrap().unwrap();
        assert_eq!(trips, vec!["mine"]);
        let follows: Vec<String> = target.load(StorageKey::FollowedUsers).unwrap().unwrap();
        assert_eq!(follows, vec!["alice"]);
    }

    #[test]
    fn non_json_values_survive_export() {
        let db = Database::open_in_memory().unwrap();
        db.set_item("legacy", "plain text").unwrap();

        let payload = db.export_backup().unwrap();
        assert_eq!(payload.items["legacy"], serde_json::json!("plain text"));
    }
}
