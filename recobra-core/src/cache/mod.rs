//! Content-addressed result cache
//!
//! Avoids recomputing expensive summarization for transcripts that have not
//! changed. Keys are SHA-256 digests of the whitespace-normalized transcript
//! text, so invalidation is purely content-addressed: a changed transcript
//! produces a new key, and stale entries simply stop being looked up.
//!
//! The cache may be shared by multiple worker processes. WAL mode plus a busy
//! timeout gives single-key atomicity: a reader never observes a partially
//! written payload. No TTL is enforced here.

pub mod schema;

use crate::error::Result;
use crate::types::{CacheEntry, Transcript};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

/// Durable key-value store for analysis payloads, keyed by transcript digest.
pub struct ResultCache {
    conn: Mutex<Connection>,
}

impl ResultCache {
    /// Open or create a cache database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL for concurrent workers; busy_timeout so writers queue instead
        // of failing under contention.
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory cache (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this cache
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        schema::run_migrations(&conn)
    }

    /// Stable content digest of a transcript.
    ///
    /// Message texts are whitespace-normalized and concatenated with newline
    /// separators, then hashed with SHA-256. Identical content always yields
    /// the identical key, independent of run, process, or machine; any change
    /// to message text, order, or count changes the key.
    pub fn digest_of(transcript: &Transcript) -> String {
        let mut hasher = Sha256::new();
        for message in transcript.iter() {
            let normalized = message.text().split_whitespace().collect::<Vec<_>>().join(" ");
            hasher.update(normalized.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    /// Point lookup by digest.
    ///
    /// A hit refreshes `last_accessed` as an observable side effect; the
    /// returned entry carries the refreshed timestamp.
    pub fn lookup(&self, digest: &str) -> Result<Option<CacheEntry>> {
        let conn = self.conn.lock().unwrap();

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM analysis_cache WHERE digest = ?",
                [digest],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(None);
        };

        let now = Utc::now();
        conn.execute(
            "UPDATE analysis_cache SET last_accessed = ?1 WHERE digest = ?2",
            params![now.to_rfc3339(), digest],
        )?;

        Ok(Some(CacheEntry {
            digest: digest.to_string(),
            payload: serde_json::from_str(&payload)?,
            last_accessed: now,
        }))
    }

    /// Upsert: overwrites any existing entry for this digest entirely.
    ///
    /// Whole-record replacement; stale derived fields from an older payload
    /// never survive an overwrite.
    pub fn store(&self, digest: &str, payload: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO analysis_cache (digest, payload, last_accessed)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(digest) DO UPDATE SET
                payload = excluded.payload,
                last_accessed = excluded.last_accessed
            "#,
            params![digest, payload.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Strip a single field from a stored payload without recomputing the
    /// rest. Used when the result schema changes and an old cached field
    /// becomes invalid. Refreshes `last_accessed` on write.
    ///
    /// Returns true when the entry existed and the field was removed.
    pub fn evict_field(&self, digest: &str, field_name: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let payload: Option<String> = tx
            .query_row(
                "SELECT payload FROM analysis_cache WHERE digest = ?",
                [digest],
                |row| row.get(0),
            )
            .optional()?;

        let Some(payload) = payload else {
            tx.commit()?;
            return Ok(false);
        };

        let mut value: serde_json::Value = serde_json::from_str(&payload)?;
        let removed = value
            .as_object_mut()
            .map(|map| map.remove(field_name).is_some())
            .unwrap_or(false);

        if removed {
            tx.execute(
                "UPDATE analysis_cache SET payload = ?1, last_accessed = ?2 WHERE digest = ?3",
                params![value.to_string(), Utc::now().to_rfc3339(), digest],
            )?;
        }

        tx.commit()?;
        Ok(removed)
    }

    /// Raw `last_accessed` timestamp for an entry, without refreshing it.
    pub fn last_accessed(&self, digest: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let ts: Option<String> = conn
            .query_row(
                "SELECT last_accessed FROM analysis_cache WHERE digest = ?",
                [digest],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Number of stored entries
    pub fn entry_count(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM analysis_cache", [], |r| r.get(0))?;
        Ok(count)
    }
}
