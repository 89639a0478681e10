//! # Strata Core Library
//!
//! Tiered memory consolidation for personal knowledge archives.
//!
//! Every captured memory enters a five-level hierarchy and earns its
//! durability through periodic consolidation cycles:
//!
//! - **t1** — immediate capture, expires within a day
//! - **t2** — session context, survives about a week
//! - **t3** — recognised patterns, survives about a month
//! - **t4** — persistent knowledge, no expiry
//! - **t5** — core identity: terminal, never deleted, never overwritten
//!
//! The [`ConsolidationEngine`] scores each memory's *surprise* — how much
//! new information it carries relative to the whole archive — and promotes,
//! keeps, expires, or protects it accordingly. Scoring is pure and fully
//! explained ([`scoring::SurpriseBreakdown`]); persistence is abstracted
//! behind the [`store::MemoryStore`] trait with in-memory and SQLite
//! backends included.
//!
//! ## Guarantees
//!
//! - Each memory is evaluated at most once per cycle.
//! - Promotion into t5 passes an identity-coherence check; strong
//!   contradictions are held back for manual review instead of admitted.
//! - Per-memory failures never abort a cycle; only configuration errors
//!   are fatal, and only at engine construction.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod markers;
pub mod policy;
pub mod scoring;
pub mod store;
pub mod types;

pub use config::StrataConfig;
pub use engine::{ConsolidationEngine, CycleReport, ItemOutcome, OutcomeKind, TierReport};
pub use error::{Result, StrataError};
pub use scoring::{SurpriseBreakdown, SurpriseScorer};
pub use types::*;
