//! # wayfarer-store
//!
//! On-device storage for the Wayfarer client, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides per-key JSON storage for every domain
//! model, plus backup export/import of the whole store.

pub mod backup;
pub mod database;
pub mod local_storage;
pub mod migrations;
pub mod models;

mod error;

pub use backup::{BackupPayload, ImportStats};
pub use database::Database;
pub use error::{Result, StoreError};
pub use local_storage::StorageKey;
pub use models::*;
