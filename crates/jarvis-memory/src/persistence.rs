//! Key/value persistence for the knowledge store.
//!
//! The whole store is serialized as one JSON blob and written under a single
//! namespace key, so a save is one atomic `INSERT OR REPLACE`.
//!
//! # Storage layout
//!
//! A single table `kv_store` is created (if it does not already exist):
//!
//! | column     | type | description                          |
//! |------------|------|--------------------------------------|
//! | key        | TEXT | Namespace key (e.g. `jarvisMemory`)  |
//! | value      | TEXT | JSON-encoded [`MemorySnapshot`]      |
//! | updated_at | TEXT | RFC-3339 time of the last write (UTC)|
//!
//! # Blob format
//!
//! ```text
//! {
//!   "knowledge":     [[key, {"response", "confidence", "timesUsed", "lastUsed"}], ...],
//!   "conversations": ["<input> → <response>", ...],
//!   "patterns":      [[word, [response, ...]], ...]
//! }
//! ```

use std::path::Path;

use chrono::{DateTime, Utc};
use jarvis_types::JarvisError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from knowledge store persistence.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Malformed memory blob: {0}")]
    MalformedState(String),
}

impl From<MemoryError> for JarvisError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::MalformedState(msg) => JarvisError::MalformedLocalState(msg),
            other => JarvisError::Storage(other.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────────────────────────

/// Serialized value half of a knowledge entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub response: String,
    pub confidence: f64,
    #[serde(default)]
    pub times_used: u64,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
}

/// Full serialized state of a knowledge store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub knowledge: Vec<(String, StoredEntry)>,
    #[serde(default)]
    pub conversations: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<(String, Vec<String>)>,
}

impl MemorySnapshot {
    pub fn to_json(&self) -> Result<String, MemoryError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored blob.  Any parse failure is reported as
    /// [`MemoryError::MalformedState`].
    pub fn from_json(raw: &str) -> Result<Self, MemoryError> {
        serde_json::from_str(raw).map_err(|e| MemoryError::MalformedState(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// KvStore
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite-backed string key/value table.
pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    /// Open (or create) a persistent SQLite database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MemoryError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open a temporary in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self, MemoryError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), MemoryError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key        TEXT NOT NULL PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Read the value stored under `key`, if any.
    pub fn get(&self, key: &str) -> Result<Option<String>, MemoryError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write `value` under `key`, replacing any previous value.
    pub fn put(&self, key: &str, value: &str) -> Result<(), MemoryError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
