//! SQLite reference backend for the `MemoryStore` contract.
//!
//! Each record is serialised to JSON inside a BLOB column, keyed by
//! `(id, tier)`:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS memories (
//!     id                TEXT NOT NULL,
//!     tier              TEXT NOT NULL,
//!     data              BLOB NOT NULL,
//!     consolidated_from TEXT,
//!     updated_at        TEXT NOT NULL,
//!     PRIMARY KEY (id, tier)
//! );
//! ```
//!
//! Design rationale:
//! - WAL mode for concurrent reads while a cycle runs.
//! - JSON in a BLOB keeps the schema stable across record-shape changes.
//! - The composite key makes the two-phase move honest: a crash between
//!   the destination insert and the source delete leaves the id visible
//!   in both tiers, and [`SqliteStore::reconcile_duplicates`] resolves it
//!   by trusting the destination copy (the one carrying
//!   `consolidated_from`).

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Result, StrataError};
use crate::store::{AuditEvent, MemoryStore, UpdateFields};
use crate::types::{MemoryId, Tier, TieredMemory};

/// Handle to an open SQLite database holding tiered memories.
pub struct SqliteStore {
    conn: Connection,
    db_path: PathBuf,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id                TEXT NOT NULL,
    tier              TEXT NOT NULL,
    data              BLOB NOT NULL,
    consolidated_from TEXT,
    updated_at        TEXT NOT NULL,
    PRIMARY KEY (id, tier)
);
CREATE INDEX IF NOT EXISTS idx_memories_tier ON memories(tier);
CREATE TABLE IF NOT EXISTS audit_log (
    seq       INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL,
    from_tier TEXT NOT NULL,
    to_tier   TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    score     REAL NOT NULL,
    reason    TEXT NOT NULL
);
";

impl SqliteStore {
    /// Open (or create) a database at `path`, applying schema and pragmas.
    ///
    /// # Errors
    /// Returns [`StrataError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&db_path, flags)?;

        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        info!(path = %db_path.display(), "strata store opened");
        Ok(Self { conn, db_path })
    }

    /// Open an in-memory database (tests).
    ///
    /// # Errors
    /// Returns [`StrataError::Database`] on SQLite failures.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            db_path: PathBuf::from(":memory:"),
        })
    }

    /// Insert (or replace) a record at its current tier.
    ///
    /// # Errors
    /// Returns [`StrataError::Serialization`] or [`StrataError::Database`].
    pub fn insert(&self, record: &TieredMemory) -> Result<()> {
        self.write_row(record)
    }

    /// Path to the database file (`:memory:` for in-memory stores).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Total number of rows, counting both copies of an unreconciled move.
    ///
    /// # Errors
    /// Returns [`StrataError::Database`] on failure.
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// The full audit log, oldest first.
    ///
    /// # Errors
    /// Returns [`StrataError::Database`] on failure.
    pub fn audit_log(&self) -> Result<Vec<AuditEvent>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT memory_id, from_tier, to_tier, timestamp, score, reason
             FROM audit_log ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, f64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, from, to, timestamp, score, reason) = row?;
            events.push(AuditEvent {
                memory_id: MemoryId(uuid::Uuid::parse_str(&id).map_err(|e| {
                    StrataError::Serialization(format!("bad uuid in audit log: {e}"))
                })?),
                from_tier: from.parse()?,
                to_tier: to.parse()?,
                timestamp: timestamp
                    .parse()
                    .map_err(|e| StrataError::Serialization(format!("bad timestamp: {e}")))?,
                score: score as f32,
                reason,
            });
        }
        Ok(events)
    }

    /// Resolve duplicates left behind by a move that crashed between its
    /// two phases: for every id present in more than one tier, keep the
    /// destination copy (the one with `consolidated_from` set, newest
    /// first) and delete the rest. Returns the number of rows removed.
    ///
    /// # Errors
    /// Returns [`StrataError::Database`] on failure.
    pub fn reconcile_duplicates(&self) -> Result<usize> {
        let dup_ids: Vec<String> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id FROM memories GROUP BY id HAVING COUNT(*) > 1",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            rows.collect::<std::result::Result<_, _>>()?
        };

        let mut removed = 0;
        for id in &dup_ids {
            removed += self.conn.execute(
                "DELETE FROM memories WHERE id = ?1 AND rowid NOT IN (
                     SELECT rowid FROM memories WHERE id = ?1
                     ORDER BY (consolidated_from IS NOT NULL) DESC, updated_at DESC
                     LIMIT 1
                 )",
                params![id],
            )?;
            warn!(memory = %id, "reconciled duplicate rows from interrupted move");
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Row helpers
    // ------------------------------------------------------------------

    fn write_row(&self, record: &TieredMemory) -> Result<()> {
        let json = serde_json::to_vec(record)
            .map_err(|e| StrataError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO memories (id, tier, data, consolidated_from, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id, tier) DO UPDATE SET
                data = excluded.data,
                consolidated_from = excluded.consolidated_from,
                updated_at = excluded.updated_at",
            params![
                record.id().to_string(),
                record.tier.as_str(),
                json,
                record.consolidated_from.map(Tier::as_str),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn decode(data: &[u8]) -> Result<TieredMemory> {
        serde_json::from_slice(data).map_err(|e| StrataError::Serialization(e.to_string()))
    }

    /// Load the authoritative row for an id: when an interrupted move left
    /// two copies, the destination copy wins.
    fn load_current(&self, id: MemoryId) -> Result<Option<TieredMemory>> {
        let row: Option<Vec<u8>> = self
            .conn
            .prepare_cached(
                "SELECT data FROM memories WHERE id = ?1
                 ORDER BY (consolidated_from IS NOT NULL) DESC, updated_at DESC
                 LIMIT 1",
            )?
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()?;
        row.map(|data| Self::decode(&data)).transpose()
    }
}

impl MemoryStore for SqliteStore {
    fn fetch_by_tier(&self, tier: Tier) -> Result<Vec<TieredMemory>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM memories WHERE tier = ?1")?;
        let rows = stmt.query_map(params![tier.as_str()], |row| row.get::<_, Vec<u8>>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::decode(&row?)?);
        }
        debug!(tier = %tier, count = records.len(), "fetched tier members");
        Ok(records)
    }

    fn fetch_all(&self) -> Result<Vec<TieredMemory>> {
        let mut stmt = self.conn.prepare_cached("SELECT data FROM memories")?;
        let rows = stmt.query_map([], |row| row.get::<_, Vec<u8>>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(Self::decode(&row?)?);
        }
        Ok(records)
    }

    fn update(&self, id: MemoryId, fields: &UpdateFields) -> Result<()> {
        let mut record = self
            .load_current(id)?
            .ok_or(StrataError::NotFound(id))?;

        if let Some(tier) = fields.tier {
            record.tier = tier;
        }
        if let Some(score) = fields.last_surprise_score {
            record.last_surprise_score = score;
        }
        if let Some(at) = fields.last_accessed {
            record.last_accessed = at;
            record.access_count = record.access_count.saturating_add(1);
        }
        if let Some(event) = &fields.record_event {
            record.consolidation_history.push(event.clone());
        }

        self.write_row(&record)
    }

    fn move_memory(&self, id: MemoryId, from: Tier, to: Tier) -> Result<()> {
        let data: Option<Vec<u8>> = self
            .conn
            .prepare_cached("SELECT data FROM memories WHERE id = ?1 AND tier = ?2")?
            .query_row(params![id.to_string(), from.as_str()], |row| row.get(0))
            .optional()?;
        let Some(data) = data else {
            return Err(StrataError::NotFound(id));
        };

        let mut record = Self::decode(&data)?;
        record.tier = to;
        record.consolidated_from = Some(from);

        // Phase 1: insert at the destination (carries provenance).
        self.write_row(&record)?;
        // Phase 2: remove from the source. A crash between the phases is
        // recoverable via reconcile_duplicates().
        self.conn.execute(
            "DELETE FROM memories WHERE id = ?1 AND tier = ?2",
            params![id.to_string(), from.as_str()],
        )?;

        debug!(memory = %id, from = %from, to = %to, "moved memory");
        Ok(())
    }

    fn delete(&self, id: MemoryId) -> Result<()> {
        let deleted = self.conn.execute(
            "DELETE FROM memories WHERE id = ?1",
            params![id.to_string()],
        )?;
        if deleted == 0 {
            return Err(StrataError::NotFound(id));
        }
        Ok(())
    }

    fn append_audit_log(&self, event: &AuditEvent) -> Result<()> {
        self.conn.execute(
            "INSERT INTO audit_log (memory_id, from_tier, to_tier, timestamp, score, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.memory_id.to_string(),
                event.from_tier.as_str(),
                event.to_tier.as_str(),
                event.timestamp.to_rfc3339(),
                f64::from(event.score),
                event.reason,
            ],
        )?;
        Ok(())
    }
}
