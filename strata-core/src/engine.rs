//! The consolidation engine — one evaluation pass over the tier hierarchy.
//!
//! Each cycle takes a single corpus snapshot, walks the source tiers in
//! order (t1 → t4), and decides one of four outcomes per memory:
//!
//! - **Consolidated** — promoted one tier up.
//! - **Kept** — left in place (score too low, or still in its dwell window).
//! - **Expired** — past its tier's TTL with a score below the bar; deleted.
//! - **Protected** — cleared the t4 threshold but refused t5 admission by
//!   the identity guard; left at t4 for manual review.
//!
//! Tier membership is taken from the cycle-start snapshot, so a memory
//! promoted during a cycle is never re-evaluated at its new tier within
//! the same cycle. Per-memory failures (validation, a missing row, a
//! backend error) are reported as `Failed` items and never abort the
//! cycle; only construction-time configuration errors are fatal.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::StrataConfig;
use crate::error::Result;
use crate::guard::IdentityGuard;
use crate::policy::TierPolicy;
use crate::scoring::{SurpriseBreakdown, SurpriseScorer};
use crate::store::{AuditEvent, MemoryStore, UpdateFields};
use crate::types::{ConsolidationEvent, Memory, MemoryId, Tier, TieredMemory};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one memory during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    /// Promoted one tier up.
    Consolidated,
    /// Left in place.
    Kept,
    /// Deleted after outliving its tier's TTL with a low score.
    Expired,
    /// Refused t5 admission; held at t4 for manual review.
    Protected,
    /// Evaluation or persistence failed for this memory alone.
    Failed,
}

/// Per-memory line item in a tier report.
#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    /// Which memory.
    pub id: MemoryId,
    /// What happened to it.
    pub outcome: OutcomeKind,
    /// The tier it was evaluated in.
    pub from_tier: Tier,
    /// Destination tier, for consolidations only.
    pub to_tier: Option<Tier>,
    /// The surprise score behind the decision (0.0 when scoring never ran).
    pub score: f32,
    /// Full per-factor breakdown; `None` when validation failed before
    /// scoring.
    pub breakdown: Option<SurpriseBreakdown>,
    /// Human-readable explanation.
    pub reason: String,
}

/// Outcome summary for one tier's pass.
#[derive(Debug, Clone, Serialize)]
pub struct TierReport {
    /// The tier that was processed.
    pub tier: Tier,
    /// Memories promoted out of this tier.
    pub consolidated: usize,
    /// Memories left in place.
    pub kept: usize,
    /// Memories deleted on expiry.
    pub expired: usize,
    /// Memories held back by the identity guard.
    pub protected: usize,
    /// Memories that failed evaluation or persistence.
    pub failed: usize,
    /// Line items, sorted by descending score.
    pub items: Vec<ItemOutcome>,
}

impl TierReport {
    fn empty(tier: Tier) -> Self {
        Self {
            tier,
            consolidated: 0,
            kept: 0,
            expired: 0,
            protected: 0,
            failed: 0,
            items: Vec::new(),
        }
    }

    fn push(&mut self, item: ItemOutcome) {
        match item.outcome {
            OutcomeKind::Consolidated => self.consolidated += 1,
            OutcomeKind::Kept => self.kept += 1,
            OutcomeKind::Expired => self.expired += 1,
            OutcomeKind::Protected => self.protected += 1,
            OutcomeKind::Failed => self.failed += 1,
        }
        self.items.push(item);
    }

    fn finish(mut self) -> Self {
        self.items
            .sort_by_key(|item| Reverse(OrderedFloat(item.score)));
        self
    }

    /// Total memories evaluated in this tier.
    #[must_use]
    pub fn evaluated(&self) -> usize {
        self.items.len()
    }
}

/// Outcome summary for a full cycle over t1..t4.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// When the cycle's snapshot was taken.
    pub started_at: DateTime<Utc>,
    /// Whether mutations were suppressed.
    pub dry_run: bool,
    /// Per-tier reports, in processing order t1..t4.
    pub tiers: Vec<TierReport>,
}

impl CycleReport {
    /// Total memories evaluated across all tiers.
    #[must_use]
    pub fn evaluated(&self) -> usize {
        self.tiers.iter().map(TierReport::evaluated).sum()
    }

    /// Total promotions across all tiers.
    #[must_use]
    pub fn consolidated(&self) -> usize {
        self.tiers.iter().map(|t| t.consolidated).sum()
    }

    /// Total expirations across all tiers.
    #[must_use]
    pub fn expired(&self) -> usize {
        self.tiers.iter().map(|t| t.expired).sum()
    }

    /// Total guard refusals across all tiers.
    #[must_use]
    pub fn protected(&self) -> usize {
        self.tiers.iter().map(|t| t.protected).sum()
    }

    /// Total per-memory failures across all tiers.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.tiers.iter().map(|t| t.failed).sum()
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// What the evaluation phase decided, before any store mutation.
enum Decision {
    Promote { to: Tier, reason: String },
    Keep { reason: String },
    Expire { reason: String },
    Protect { reason: String },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Drives consolidation over any [`MemoryStore`] backend.
#[derive(Debug)]
pub struct ConsolidationEngine<S: MemoryStore> {
    store: S,
    scorer: SurpriseScorer,
    policy: TierPolicy,
    dry_run: bool,
}

impl<S: MemoryStore> ConsolidationEngine<S> {
    /// Build an engine over `store`, validating the configuration.
    ///
    /// This is the one place configuration errors are fatal; once the
    /// engine exists, no failure aborts a cycle.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`](crate::StrataError::Config) for
    /// invalid weights, bonuses, or tier tables.
    pub fn new(store: S, config: &StrataConfig) -> Result<Self> {
        Ok(Self {
            store,
            scorer: SurpriseScorer::new(&config.scoring)?,
            policy: TierPolicy::from_config(&config.tiers)?,
            dry_run: config.engine.dry_run,
        })
    }

    /// Whether mutations are suppressed.
    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Borrow the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Consume the engine, returning the store.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Run one full cycle over all source tiers at `now`.
    ///
    /// A single snapshot is taken up front; both tier membership and the
    /// scoring corpus come from it, so each memory is evaluated at most
    /// once per cycle regardless of promotions happening mid-cycle.
    ///
    /// # Errors
    /// Returns an error only if the snapshot itself cannot be fetched.
    /// Per-memory failures land in the report as `Failed` items.
    pub fn run_full_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport> {
        let snapshot = self.store.fetch_all()?;
        info!(
            total = snapshot.len(),
            dry_run = self.dry_run,
            "starting consolidation cycle"
        );

        let mut tiers = Vec::with_capacity(Tier::SOURCES.len());
        for tier in Tier::SOURCES {
            let members: Vec<&TieredMemory> =
                snapshot.iter().filter(|r| r.tier == tier).collect();
            tiers.push(self.process_members(tier, &members, &snapshot, now));
        }

        let report = CycleReport {
            started_at: now,
            dry_run: self.dry_run,
            tiers,
        };
        info!(
            evaluated = report.evaluated(),
            consolidated = report.consolidated(),
            expired = report.expired(),
            protected = report.protected(),
            failed = report.failed(),
            "consolidation cycle finished"
        );
        Ok(report)
    }

    /// Evaluate a single tier at `now`, outside a full cycle.
    ///
    /// Fetches a fresh snapshot at call time. Processing t5 is a no-op:
    /// the terminal tier is never a source, so its report is empty.
    ///
    /// # Errors
    /// Returns an error only if fetching fails; per-memory failures land
    /// in the report.
    pub fn process_tier(&self, tier: Tier, now: DateTime<Utc>) -> Result<TierReport> {
        if !tier.is_source() {
            debug!(%tier, "terminal tier requested; nothing to process");
            return Ok(TierReport::empty(tier));
        }
        let members = self.store.fetch_by_tier(tier)?;
        let snapshot = self.store.fetch_all()?;
        let refs: Vec<&TieredMemory> = members.iter().collect();
        Ok(self.process_members(tier, &refs, &snapshot, now))
    }

    // -----------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------

    fn process_members(
        &self,
        tier: Tier,
        members: &[&TieredMemory],
        snapshot: &[TieredMemory],
        now: DateTime<Utc>,
    ) -> TierReport {
        let terminal: Vec<&Memory> = snapshot
            .iter()
            .filter(|r| r.tier == Tier::T5)
            .map(|r| &r.memory)
            .collect();

        let mut report = TierReport::empty(tier);
        for record in members {
            let corpus: Vec<&Memory> = snapshot
                .iter()
                .filter(|r| r.id() != record.id())
                .map(|r| &r.memory)
                .collect();
            report.push(self.evaluate_one(record, tier, &corpus, &terminal, now));
        }

        let report = report.finish();
        info!(
            %tier,
            evaluated = report.evaluated(),
            consolidated = report.consolidated,
            kept = report.kept,
            expired = report.expired,
            protected = report.protected,
            failed = report.failed,
            "tier pass complete"
        );
        report
    }

    /// Evaluate one memory and, unless in dry-run, apply the side effects.
    fn evaluate_one(
        &self,
        record: &TieredMemory,
        tier: Tier,
        corpus: &[&Memory],
        terminal: &[&Memory],
        now: DateTime<Utc>,
    ) -> ItemOutcome {
        let id = record.id();

        if let Err(e) = record.validate() {
            warn!(memory = %id, %tier, error = %e, "skipping malformed record");
            return ItemOutcome {
                id,
                outcome: OutcomeKind::Failed,
                from_tier: tier,
                to_tier: None,
                score: 0.0,
                breakdown: None,
                reason: e.to_string(),
            };
        }

        let breakdown = self.scorer.score(&record.memory, corpus);
        let decision = self.decide(record, tier, &breakdown, terminal, now);

        let (outcome, to_tier, reason) = match &decision {
            Decision::Promote { to, reason } => (OutcomeKind::Consolidated, Some(*to), reason),
            Decision::Keep { reason } => (OutcomeKind::Kept, None, reason),
            Decision::Expire { reason } => (OutcomeKind::Expired, None, reason),
            Decision::Protect { reason } => (OutcomeKind::Protected, None, reason),
        };
        debug!(
            memory = %id,
            %tier,
            score = breakdown.final_score,
            outcome = ?outcome,
            %reason,
            "evaluated memory"
        );

        if !self.dry_run {
            if let Err(e) = self.apply(id, tier, &decision, breakdown.final_score, now) {
                warn!(memory = %id, %tier, error = %e, "failed to apply outcome");
                return ItemOutcome {
                    id,
                    outcome: OutcomeKind::Failed,
                    from_tier: tier,
                    to_tier: None,
                    score: breakdown.final_score,
                    breakdown: Some(breakdown),
                    reason: e.to_string(),
                };
            }
        }

        ItemOutcome {
            id,
            outcome,
            from_tier: tier,
            to_tier,
            score: breakdown.final_score,
            breakdown: Some(breakdown),
            reason: reason.clone(),
        }
    }

    /// The decision ladder: TTL expiry, then dwell, then threshold, then
    /// (for t5 targets only) the identity guard.
    fn decide(
        &self,
        record: &TieredMemory,
        tier: Tier,
        breakdown: &SurpriseBreakdown,
        terminal: &[&Memory],
        now: DateTime<Utc>,
    ) -> Decision {
        let score = breakdown.final_score;
        let age = record.memory.age_at(now);

        // A memory past its TTL survives only by clearing the promotion
        // bar; otherwise it expires here and the ladder stops.
        if let (Some(ttl), Some(threshold)) = (self.policy.ttl(tier), self.policy.threshold(tier))
        {
            if age > ttl && score < threshold {
                return Decision::Expire {
                    reason: format!(
                        "age {}h exceeded {}h ttl with score {score:.2} below {threshold:.2}",
                        age.num_hours(),
                        ttl.num_hours()
                    ),
                };
            }
        }

        if let Some(min_dwell) = self.policy.min_dwell(tier) {
            if age < min_dwell {
                return Decision::Keep {
                    reason: format!(
                        "age {}h below the {}h dwell minimum",
                        age.num_hours(),
                        min_dwell.num_hours()
                    ),
                };
            }
        }

        let Some(target) = self.policy.promotion_target(tier, score) else {
            let threshold = self.policy.threshold(tier).unwrap_or(1.0);
            return Decision::Keep {
                reason: format!("score {score:.2} below {threshold:.2} threshold"),
            };
        };

        if target == Tier::T5 {
            let verdict = IdentityGuard::new(&self.scorer).verify(&record.memory, terminal);
            if !verdict.safe {
                return Decision::Protect {
                    reason: format!(
                        "{} (contradiction {:.2})",
                        verdict.reason, verdict.contradiction
                    ),
                };
            }
            return Decision::Promote {
                to: target,
                reason: format!("score {score:.2} cleared terminal admission: {}", verdict.reason),
            };
        }

        Decision::Promote {
            to: target,
            reason: format!("score {score:.2} cleared the promotion threshold"),
        }
    }

    /// Side effects for one decision. Never called in dry-run mode.
    fn apply(
        &self,
        id: MemoryId,
        tier: Tier,
        decision: &Decision,
        score: f32,
        now: DateTime<Utc>,
    ) -> Result<()> {
        match decision {
            Decision::Promote { to, reason } => {
                self.store.move_memory(id, tier, *to)?;
                let event = ConsolidationEvent {
                    from_tier: tier,
                    to_tier: *to,
                    timestamp: now,
                    score,
                    reason: reason.clone(),
                };
                self.store.update(
                    id,
                    &UpdateFields {
                        tier: Some(*to),
                        last_surprise_score: Some(score),
                        last_accessed: Some(now),
                        record_event: Some(event),
                    },
                )?;
                self.store.append_audit_log(&AuditEvent {
                    memory_id: id,
                    from_tier: tier,
                    to_tier: *to,
                    timestamp: now,
                    score,
                    reason: reason.clone(),
                })
            }
            Decision::Expire { .. } => self.store.delete(id),
            // Kept and protected memories stay put; only the access
            // timestamp moves. Their fresh score lives in the report.
            Decision::Keep { .. } | Decision::Protect { .. } => {
                self.store.update(id, &UpdateFields::touch(now))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StrataError;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    fn engine(store: InMemoryStore) -> ConsolidationEngine<InMemoryStore> {
        ConsolidationEngine::new(store, &StrataConfig::default()).expect("valid config")
    }

    fn seeded(
        content: &str,
        tags: &[&str],
        tier: Tier,
        age: Duration,
        now: DateTime<Utc>,
    ) -> TieredMemory {
        TieredMemory::at_tier(
            Memory::new(
                content,
                tags.iter().map(|t| (*t).to_string()),
                now - age,
                0.0,
                0.0,
            ),
            tier,
        )
    }

    #[test]
    fn high_scoring_memory_is_promoted() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let mut record = seeded(
            "met carles for coffee, te quiero",
            &["love", "carles"],
            Tier::T1,
            Duration::hours(2),
            now,
        );
        record.memory.emotional_valence = 0.5;
        record.memory.emotional_intensity = 0.6;
        let id = record.id();
        store.insert(record);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.consolidated(), 1);
        let moved = engine.store().get(id).expect("present");
        assert_eq!(moved.tier, Tier::T2);
        assert_eq!(moved.consolidated_from, Some(Tier::T1));
        assert_eq!(moved.consolidation_history.len(), 1);
        assert_eq!(moved.consolidation_history[0].from_tier, Tier::T1);
        assert_eq!(moved.consolidation_history[0].to_tier, Tier::T2);
        assert_eq!(engine.store().audit_log().len(), 1);

        // The decision is fully explained: the love bonus shows up in the
        // reported breakdown.
        let item = &report.tiers[0].items[0];
        assert_eq!(item.outcome, OutcomeKind::Consolidated);
        let breakdown = item.breakdown.expect("scored");
        assert!((breakdown.love_bonus - 0.10).abs() < f32::EPSILON);
    }

    #[test]
    fn stale_low_scoring_memory_expires() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let record = seeded("note", &[], Tier::T1, Duration::hours(30), now);
        let id = record.id();
        store.insert(record);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.expired(), 1);
        assert!(engine.store().get(id).is_none());
        // Expiry is not a consolidation; the audit log stays empty.
        assert!(engine.store().audit_log().is_empty());
    }

    #[test]
    fn stale_but_high_scoring_memory_survives_its_ttl() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let mut record = seeded(
            "critical breakthrough today, te quiero",
            &["love"],
            Tier::T1,
            Duration::hours(30),
            now,
        );
        record.memory.emotional_intensity = 0.8;
        let id = record.id();
        store.insert(record);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.expired(), 0);
        assert_eq!(report.consolidated(), 1);
        assert_eq!(engine.store().get(id).expect("present").tier, Tier::T2);
    }

    #[test]
    fn dwell_window_blocks_promotion_regardless_of_score() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let mut record = seeded(
            "critical essential breakthrough, remember this",
            &["love"],
            Tier::T1,
            Duration::minutes(30),
            now,
        );
        record.memory.emotional_intensity = 1.0;
        let id = record.id();
        store.insert(record);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.consolidated(), 0);
        assert_eq!(report.tiers[0].kept, 1);
        let kept = engine.store().get(id).expect("present");
        assert_eq!(kept.tier, Tier::T1);
        // Kept memories are touched but otherwise untouched.
        assert_eq!(kept.access_count, 1);
        assert_eq!(kept.last_accessed, now);
        assert!(kept.consolidation_history.is_empty());
    }

    #[test]
    fn ttl_boundary_is_exclusive() {
        let now = Utc::now();

        // Exactly at the 24h TTL: not expired, merely kept.
        let store = InMemoryStore::new();
        let at_limit = seeded("note", &[], Tier::T1, Duration::hours(24), now);
        let at_limit_id = at_limit.id();
        store.insert(at_limit);
        let engine_at = engine(store);
        let report = engine_at.run_full_cycle(now).expect("cycle");
        assert_eq!(report.expired(), 0);
        assert_eq!(report.tiers[0].kept, 1);
        assert!(engine_at.store().get(at_limit_id).is_some());

        // One minute past it: expired.
        let store = InMemoryStore::new();
        let past = seeded(
            "note",
            &[],
            Tier::T1,
            Duration::hours(24) + Duration::minutes(1),
            now,
        );
        let past_id = past.id();
        store.insert(past);
        let engine_past = engine(store);
        let report = engine_past.run_full_cycle(now).expect("cycle");
        assert_eq!(report.expired(), 1);
        assert!(engine_past.store().get(past_id).is_none());
    }

    #[test]
    fn guard_protects_t4_memory_contradicting_the_terminal_tier() {
        let now = Utc::now();
        let store = InMemoryStore::new();

        let core = seeded(
            "I value honesty above comfort",
            &["values"],
            Tier::T5,
            Duration::days(365),
            now,
        );
        let mut candidate = seeded(
            "today, a breakthrough: actually I no longer believe that. critical, essential, remember this",
            &["values", "love"],
            Tier::T4,
            Duration::days(31),
            now,
        );
        candidate.memory.emotional_valence = 1.0;
        candidate.memory.emotional_intensity = 1.0;
        let id = candidate.id();
        store.insert(core);
        store.insert(candidate);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.protected(), 1);
        assert_eq!(report.consolidated(), 0);
        let held = engine.store().get(id).expect("present");
        assert_eq!(held.tier, Tier::T4);
        assert_eq!(held.access_count, 1);
        assert!(engine.store().audit_log().is_empty());
        let item = &report.tiers[3].items[0];
        assert_eq!(item.outcome, OutcomeKind::Protected);
        assert!(item.reason.contains("manual review"));
    }

    #[test]
    fn non_contradicting_t4_memory_reaches_the_terminal_tier() {
        let now = Utc::now();
        let store = InMemoryStore::new();

        let core = seeded(
            "music has always mattered to me",
            &["music"],
            Tier::T5,
            Duration::days(365),
            now,
        );
        let mut candidate = seeded(
            "today, a breakthrough on the piano. critical, essential, remember this",
            &["music", "piano", "love"],
            Tier::T4,
            Duration::days(31),
            now,
        );
        candidate.memory.emotional_valence = 1.0;
        candidate.memory.emotional_intensity = 1.0;
        let id = candidate.id();
        store.insert(core);
        store.insert(candidate);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.consolidated(), 1);
        let promoted = engine.store().get(id).expect("present");
        assert_eq!(promoted.tier, Tier::T5);
        assert_eq!(promoted.consolidated_from, Some(Tier::T4));
        assert_eq!(engine.store().audit_log().len(), 1);
    }

    #[test]
    fn dry_run_reports_but_never_mutates() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let mut record = seeded(
            "met carles for coffee, te quiero",
            &["love", "carles"],
            Tier::T1,
            Duration::hours(2),
            now,
        );
        record.memory.emotional_intensity = 0.6;
        let id = record.id();
        store.insert(record);

        let mut config = StrataConfig::default();
        config.engine.dry_run = true;
        let engine = ConsolidationEngine::new(store, &config).expect("valid config");
        let report = engine.run_full_cycle(now).expect("cycle");

        assert!(report.dry_run);
        assert_eq!(report.consolidated(), 1);

        let untouched = engine.store().get(id).expect("present");
        assert_eq!(untouched.tier, Tier::T1);
        assert_eq!(untouched.access_count, 0);
        assert!(untouched.consolidation_history.is_empty());
        assert!(engine.store().audit_log().is_empty());
    }

    #[test]
    fn malformed_record_fails_alone_and_is_not_deleted() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let bad = seeded("   ", &[], Tier::T1, Duration::hours(2), now);
        let bad_id = bad.id();
        let good = seeded("an ordinary note", &["misc"], Tier::T1, Duration::hours(2), now);
        let good_id = good.id();
        store.insert(bad);
        store.insert(good);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.failed(), 1);
        assert_eq!(report.evaluated(), 2);
        // The malformed record is reported, not destroyed.
        assert!(engine.store().get(bad_id).is_some());
        assert!(engine.store().get(good_id).is_some());
    }

    #[test]
    fn terminal_tier_is_never_processed() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let core = seeded("core identity", &["self"], Tier::T5, Duration::days(400), now);
        let id = core.id();
        store.insert(core);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.tiers.len(), 4);
        assert!(report.tiers.iter().all(|t| t.tier != Tier::T5));
        assert_eq!(report.evaluated(), 0);

        let t5_report = engine.process_tier(Tier::T5, now).expect("process");
        assert_eq!(t5_report.evaluated(), 0);

        let untouched = engine.store().get(id).expect("present");
        assert_eq!(untouched.access_count, 0);
    }

    #[test]
    fn promoted_memory_is_not_reprocessed_within_the_cycle() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        let mut record = seeded(
            "critical essential breakthrough, remember this, te quiero",
            &["love"],
            Tier::T1,
            Duration::days(2),
            now,
        );
        record.memory.emotional_intensity = 1.0;
        let id = record.id();
        store.insert(record);

        let engine = engine(store);
        let report = engine.run_full_cycle(now).expect("cycle");

        // Promoted out of t1, but the t2 pass saw the cycle-start snapshot.
        assert_eq!(report.tiers[0].consolidated, 1);
        assert_eq!(report.tiers[1].evaluated(), 0);
        let moved = engine.store().get(id).expect("present");
        assert_eq!(moved.tier, Tier::T2);
        assert_eq!(moved.consolidation_history.len(), 1);
    }

    #[test]
    fn report_items_are_sorted_by_descending_score() {
        let now = Utc::now();
        let store = InMemoryStore::new();
        store.insert(seeded("plain note", &[], Tier::T1, Duration::minutes(5), now));
        let mut strong = seeded(
            "critical breakthrough",
            &["love"],
            Tier::T1,
            Duration::minutes(5),
            now,
        );
        strong.memory.emotional_intensity = 1.0;
        store.insert(strong);
        store.insert(seeded("mild note today", &["misc"], Tier::T1, Duration::minutes(5), now));

        let engine = engine(store);
        let report = engine.process_tier(Tier::T1, now).expect("process");

        let scores: Vec<f32> = report.items.iter().map(|i| i.score).collect();
        assert_eq!(scores.len(), 3);
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn invalid_config_is_fatal_at_construction() {
        let mut config = StrataConfig::default();
        config.scoring.weights.novelty = 0.9;
        assert!(matches!(
            ConsolidationEngine::new(InMemoryStore::new(), &config),
            Err(StrataError::Config(_))
        ));
    }

    // A store whose moves always fail, for failure-isolation coverage.
    struct MoveFailsStore(InMemoryStore);

    impl MemoryStore for MoveFailsStore {
        fn fetch_by_tier(&self, tier: Tier) -> Result<Vec<TieredMemory>> {
            self.0.fetch_by_tier(tier)
        }
        fn fetch_all(&self) -> Result<Vec<TieredMemory>> {
            self.0.fetch_all()
        }
        fn update(&self, id: MemoryId, fields: &UpdateFields) -> Result<()> {
            self.0.update(id, fields)
        }
        fn move_memory(&self, _id: MemoryId, _from: Tier, _to: Tier) -> Result<()> {
            Err(StrataError::Persistence("disk full".to_string()))
        }
        fn delete(&self, id: MemoryId) -> Result<()> {
            self.0.delete(id)
        }
        fn append_audit_log(&self, event: &AuditEvent) -> Result<()> {
            self.0.append_audit_log(event)
        }
    }

    #[test]
    fn persistence_failure_is_isolated_to_the_one_memory() {
        let now = Utc::now();
        let inner = InMemoryStore::new();
        let mut promotable = seeded(
            "met carles for coffee, te quiero",
            &["love", "carles"],
            Tier::T1,
            Duration::hours(2),
            now,
        );
        promotable.memory.emotional_intensity = 0.6;
        let promotable_id = promotable.id();
        let plain = seeded("plain note", &[], Tier::T1, Duration::hours(2), now);
        let plain_id = plain.id();
        inner.insert(promotable);
        inner.insert(plain);

        let engine = ConsolidationEngine::new(MoveFailsStore(inner), &StrataConfig::default())
            .expect("valid config");
        let report = engine.run_full_cycle(now).expect("cycle");

        assert_eq!(report.failed(), 1);
        assert_eq!(report.tiers[0].kept, 1);

        let store = &engine.store().0;
        // The failed promotion left the record where it was.
        assert_eq!(store.get(promotable_id).expect("present").tier, Tier::T1);
        assert!(store.get(plain_id).is_some());
        assert!(store.audit_log().is_empty());

        let failed = report.tiers[0]
            .items
            .iter()
            .find(|i| i.outcome == OutcomeKind::Failed)
            .expect("failed item");
        assert!(failed.reason.contains("disk full"));
    }
}
