//! The `MemoryStore` interface and reference backends.
//!
//! The engine never talks to a concrete database: it depends on the
//! [`MemoryStore`] trait only. Two reference backends ship with the crate:
//!
//! - [`InMemoryStore`] — `parking_lot`-guarded map, used by tests and
//!   benchmarks.
//! - [`SqliteStore`] — durable backend with an audit-log table and the
//!   two-phase move / reconciliation contract.
//!
//! The promotion move is logically *insert at destination, then remove
//! from source* and is **not** assumed atomic. A failure between the two
//! steps leaves the memory id present in both tiers, with the
//! destination-side copy carrying `consolidated_from` provenance; a
//! reconciliation pass resolves such duplicates by trusting the
//! destination-tier copy.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{ConsolidationEvent, MemoryId, Tier, TieredMemory};

/// Partial update applied to one memory record.
///
/// Only the populated fields change; `record_event` appends to the
/// record's consolidation history (append-only — stores must never
/// reorder or truncate existing events).
#[derive(Debug, Clone, Default)]
pub struct UpdateFields {
    /// New tier value (set after a move so the record matches its row).
    pub tier: Option<Tier>,
    /// Score from the evaluation that produced this update.
    pub last_surprise_score: Option<f32>,
    /// New last-accessed timestamp.
    pub last_accessed: Option<DateTime<Utc>>,
    /// Event to append to the consolidation history.
    pub record_event: Option<ConsolidationEvent>,
}

impl UpdateFields {
    /// An update that only refreshes `last_accessed`.
    #[must_use]
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            last_accessed: Some(now),
            ..Self::default()
        }
    }
}

/// One audit-log entry, written when a memory is consolidated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Which memory moved.
    pub memory_id: MemoryId,
    /// Source tier.
    pub from_tier: Tier,
    /// Destination tier.
    pub to_tier: Tier,
    /// When the move happened.
    pub timestamp: DateTime<Utc>,
    /// The surprise score behind the decision.
    pub score: f32,
    /// Human-readable explanation.
    pub reason: String,
}

/// Persistence contract between the consolidation engine and whatever
/// actually stores memories.
///
/// `update`, `move_memory`, and `delete` on a missing id return
/// [`StrataError::NotFound`](crate::StrataError::NotFound); the engine
/// treats that as non-fatal for the single memory involved.
pub trait MemoryStore {
    /// All records currently in `tier`.
    ///
    /// # Errors
    /// Returns [`StrataError::Persistence`](crate::StrataError::Persistence)
    /// or a backend error on failure.
    fn fetch_by_tier(&self, tier: Tier) -> Result<Vec<TieredMemory>>;

    /// All records across every tier — the corpus snapshot.
    ///
    /// # Errors
    /// Backend failures, as for [`MemoryStore::fetch_by_tier`].
    fn fetch_all(&self) -> Result<Vec<TieredMemory>>;

    /// Apply a partial update to one record.
    ///
    /// # Errors
    /// [`StrataError::NotFound`](crate::StrataError::NotFound) for a
    /// missing id; backend errors otherwise.
    fn update(&self, id: MemoryId, fields: &UpdateFields) -> Result<()>;

    /// Move a record between tiers (two-phase: insert at destination with
    /// `consolidated_from = from`, then remove from source).
    ///
    /// # Errors
    /// [`StrataError::NotFound`](crate::StrataError::NotFound) if the id
    /// is not present in `from`; backend errors otherwise.
    fn move_memory(&self, id: MemoryId, from: Tier, to: Tier) -> Result<()>;

    /// Permanently delete a record.
    ///
    /// # Errors
    /// [`StrataError::NotFound`](crate::StrataError::NotFound) for a
    /// missing id; backend errors otherwise.
    fn delete(&self, id: MemoryId) -> Result<()>;

    /// Append an entry to the audit log.
    ///
    /// # Errors
    /// Backend failures.
    fn append_audit_log(&self, event: &AuditEvent) -> Result<()>;
}
