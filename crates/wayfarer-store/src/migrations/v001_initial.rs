//! v001 -- Initial schema creation.
//!
//! A single key/value table.  Values are JSON documents whose shape is owned
//! by the caller; keys are the fixed names in [`crate::StorageKey`] plus
//! anything written through the raw API.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,                 -- JSON document
    updated_at TEXT NOT NULL                  -- ISO-8601 / RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
