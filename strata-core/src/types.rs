//! Core type definitions for the strata tiered memory system.
//!
//! All types are serializable; [`TieredMemory`] is the record shape stored
//! by every [`MemoryStore`](crate::store::MemoryStore) backend.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StrataError};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Unique identifier for a memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    /// Create a new random memory ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MemoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Tiers
// ---------------------------------------------------------------------------

/// One of the five durability levels a memory can occupy.
///
/// Tiers are strictly ordered `t1 < t2 < t3 < t4 < t5`. A memory enters the
/// hierarchy at [`Tier::T1`] and earns its way up through consolidation.
/// [`Tier::T5`] is terminal: the engine writes to it as a promotion target
/// but never reads it as a processing source, and never deletes from it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Immediate capture — volatile, expires within a day by default.
    T1,
    /// Session context — survives about a week.
    T2,
    /// Recognised patterns — survives about a month.
    T3,
    /// Persistent knowledge — no expiry, but still re-evaluated.
    T4,
    /// Core identity — terminal and immutable from the engine's view.
    T5,
}

impl Tier {
    /// The four tiers the engine processes as sources, in cycle order.
    pub const SOURCES: [Self; 4] = [Self::T1, Self::T2, Self::T3, Self::T4];

    /// The next tier up, or `None` for the terminal tier.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::T1 => Some(Self::T2),
            Self::T2 => Some(Self::T3),
            Self::T3 => Some(Self::T4),
            Self::T4 => Some(Self::T5),
            Self::T5 => None,
        }
    }

    /// Zero-based index for table lookups (`t1 → 0`, …, `t5 → 4`).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::T1 => 0,
            Self::T2 => 1,
            Self::T3 => 2,
            Self::T4 => 3,
            Self::T5 => 4,
        }
    }

    /// Whether the engine may read this tier as a consolidation source.
    #[must_use]
    pub fn is_source(self) -> bool {
        self != Self::T5
    }

    /// Short name (`"t1"` … `"t5"`), as used in store columns and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::T1 => "t1",
            Self::T2 => "t2",
            Self::T3 => "t3",
            Self::T4 => "t4",
            Self::T5 => "t5",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = StrataError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "t1" => Ok(Self::T1),
            "t2" => Ok(Self::T2),
            "t3" => Ok(Self::T3),
            "t4" => Ok(Self::T4),
            "t5" => Ok(Self::T5),
            other => Err(StrataError::Serialization(format!(
                "unknown tier name: {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Embedding
// ---------------------------------------------------------------------------

/// A dense vector embedding for semantic similarity.
///
/// Strata never computes embeddings itself; they are an optional input
/// supplied by whatever produced the memory. Scoring degrades to a
/// tag-overlap heuristic when they are absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    /// Cosine similarity between two embeddings.
    /// Returns 0.0 for mismatched dimensions or zero-length vectors.
    #[must_use]
    pub fn cosine_similarity(&self, other: &Self) -> f32 {
        if self.0.len() != other.0.len() || self.0.is_empty() {
            return 0.0;
        }
        let (mut dot, mut norm_a, mut norm_b) = (0.0_f32, 0.0_f32, 0.0_f32);
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }
        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom < f32::EPSILON {
            0.0
        } else {
            dot / denom
        }
    }

    /// Dimensionality of the embedding.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.0.len()
    }
}

// ---------------------------------------------------------------------------
// Memory record
// ---------------------------------------------------------------------------

/// A single captured memory, as created by the journaling front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Unique identifier.
    pub id: MemoryId,
    /// The memory text itself.
    pub content: String,
    /// Optional embedding vector for similarity-based novelty.
    #[serde(default)]
    pub embedding: Option<Embedding>,
    /// Topic tags. Insertion order is irrelevant.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// When the memory was captured.
    pub created_at: DateTime<Utc>,
    /// Emotional valence in [-1, 1] (negative = unpleasant).
    pub emotional_valence: f32,
    /// Emotional intensity in [0, 1].
    pub emotional_intensity: f32,
    /// Where this memory came from (conversation id, import source, …).
    #[serde(default)]
    pub source: Option<String>,
    /// Weak references to related memories. Relation only, no ownership.
    #[serde(default)]
    pub related_to: Vec<MemoryId>,
}

impl Memory {
    /// Create a new memory, clamping affect values into their valid ranges.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        tags: impl IntoIterator<Item = String>,
        created_at: DateTime<Utc>,
        emotional_valence: f32,
        emotional_intensity: f32,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            content: content.into(),
            embedding: None,
            tags: tags.into_iter().collect(),
            created_at,
            emotional_valence: emotional_valence.clamp(-1.0, 1.0),
            emotional_intensity: emotional_intensity.clamp(0.0, 1.0),
            source: None,
            related_to: Vec::new(),
        }
    }

    /// Validate a record loaded from an external store.
    ///
    /// Store-loaded data is untrusted: a malformed record is rejected here,
    /// before scoring, rather than silently defaulted.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Validation`] if the content is empty or an
    /// affect value is outside its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(StrataError::Validation {
                id: self.id,
                reason: "content is empty".to_string(),
            });
        }
        if !(-1.0..=1.0).contains(&self.emotional_valence) {
            return Err(StrataError::Validation {
                id: self.id,
                reason: format!(
                    "emotional_valence {} outside [-1, 1]",
                    self.emotional_valence
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.emotional_intensity) {
            return Err(StrataError::Validation {
                id: self.id,
                reason: format!(
                    "emotional_intensity {} outside [0, 1]",
                    self.emotional_intensity
                ),
            });
        }
        Ok(())
    }

    /// Whether this memory shares at least one tag with `other`.
    #[must_use]
    pub fn shares_tag_with(&self, other: &Self) -> bool {
        self.tags.iter().any(|t| other.tags.contains(t))
    }

    /// Age of the memory at `now`.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }
}

// ---------------------------------------------------------------------------
// Consolidation provenance
// ---------------------------------------------------------------------------

/// One recorded tier transition in a memory's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationEvent {
    /// Tier the memory was promoted out of.
    pub from_tier: Tier,
    /// Tier the memory was promoted into.
    pub to_tier: Tier,
    /// When the promotion happened.
    pub timestamp: DateTime<Utc>,
    /// The surprise score that earned the promotion.
    pub score: f32,
    /// Human-readable explanation, as written to the audit log.
    pub reason: String,
}

/// A memory together with its tier placement and consolidation metadata.
///
/// `consolidation_history` is append-only and non-decreasing by timestamp;
/// the engine never reorders or truncates it. `last_surprise_score` reflects
/// only the most recent evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredMemory {
    /// The underlying memory record.
    #[serde(flatten)]
    pub memory: Memory,
    /// Current tier.
    pub tier: Tier,
    /// When the engine last touched this record.
    pub last_accessed: DateTime<Utc>,
    /// How many times the record has been accessed.
    #[serde(default)]
    pub access_count: u32,
    /// Score from the most recent evaluation, in [0, 1].
    #[serde(default)]
    pub last_surprise_score: f32,
    /// Append-only promotion history.
    #[serde(default)]
    pub consolidation_history: Vec<ConsolidationEvent>,
    /// Set on the destination copy during a two-phase move. Used by the
    /// reconciliation pass to pick the surviving copy after a crashed move.
    #[serde(default)]
    pub consolidated_from: Option<Tier>,
}

impl TieredMemory {
    /// Wrap a freshly captured memory at tier t1.
    #[must_use]
    pub fn new(memory: Memory) -> Self {
        let last_accessed = memory.created_at;
        Self {
            memory,
            tier: Tier::T1,
            last_accessed,
            access_count: 0,
            last_surprise_score: 0.0,
            consolidation_history: Vec::new(),
            consolidated_from: None,
        }
    }

    /// Place a memory at an explicit tier (imports, test fixtures).
    #[must_use]
    pub fn at_tier(memory: Memory, tier: Tier) -> Self {
        Self {
            tier,
            ..Self::new(memory)
        }
    }

    /// Shorthand for the record's id.
    #[must_use]
    pub fn id(&self) -> MemoryId {
        self.memory.id
    }

    /// Validate the record, including the wrapped memory.
    ///
    /// # Errors
    ///
    /// Returns [`StrataError::Validation`] for malformed content/affect or
    /// an out-of-range stored score.
    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        if !(0.0..=1.0).contains(&self.last_surprise_score) {
            return Err(StrataError::Validation {
                id: self.memory.id,
                reason: format!(
                    "last_surprise_score {} outside [0, 1]",
                    self.last_surprise_score
                ),
            });
        }
        Ok(())
    }
}
