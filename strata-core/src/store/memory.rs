//! In-memory `MemoryStore` backend.
//!
//! Backs tests and benchmarks; a `parking_lot::RwLock` keeps mutations for
//! a given record serialized, matching the single-writer model the engine
//! assumes. Unlike the SQLite backend, moves here are atomic under the
//! lock, so the duplicate-detection path never triggers.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{Result, StrataError};
use crate::store::{AuditEvent, MemoryStore, UpdateFields};
use crate::types::{MemoryId, Tier, TieredMemory};

#[derive(Debug, Default)]
struct State {
    records: HashMap<MemoryId, TieredMemory>,
    audit_log: Vec<AuditEvent>,
}

/// Volatile reference store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a record. Seeding API for callers and tests;
    /// the engine itself never inserts new memories.
    pub fn insert(&self, record: TieredMemory) {
        self.state.write().records.insert(record.id(), record);
    }

    /// Fetch one record by id.
    #[must_use]
    pub fn get(&self, id: MemoryId) -> Option<TieredMemory> {
        self.state.read().records.get(&id).cloned()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Snapshot of the audit log.
    #[must_use]
    pub fn audit_log(&self) -> Vec<AuditEvent> {
        self.state.read().audit_log.clone()
    }
}

impl MemoryStore for InMemoryStore {
    fn fetch_by_tier(&self, tier: Tier) -> Result<Vec<TieredMemory>> {
        Ok(self
            .state
            .read()
            .records
            .values()
            .filter(|r| r.tier == tier)
            .cloned()
            .collect())
    }

    fn fetch_all(&self) -> Result<Vec<TieredMemory>> {
        Ok(self.state.read().records.values().cloned().collect())
    }

    fn update(&self, id: MemoryId, fields: &UpdateFields) -> Result<()> {
        let mut state = self.state.write();
        let record = state
            .records
            .get_mut(&id)
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
        Ok(())
    }

    fn move_memory(&self, id: MemoryId, from: Tier, to: Tier) -> Result<()> {
        let mut state = self.state.write();
        let record = state
            .records
            .get_mut(&id)
            .ok_or(StrataError::NotFound(id))?;
        if record.tier != from {
            return Err(StrataError::Persistence(format!(
                "memory {id} is in {}, not {from}",
                record.tier
            )));
        }
        record.tier = to;
        record.consolidated_from = Some(from);
        Ok(())
    }

    fn delete(&self, id: MemoryId) -> Result<()> {
        self.state
            .write()
            .records
            .remove(&id)
            .map(|_| ())
            .ok_or(StrataError::NotFound(id))
    }

    fn append_audit_log(&self, event: &AuditEvent) -> Result<()> {
        self.state.write().audit_log.push(event.clone());
        Ok(())
    }
}
