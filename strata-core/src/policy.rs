//! Tier policy — the data-driven TTL / dwell / threshold tables.
//!
//! The per-tier rules live in configuration ([`TierTableConfig`]) and are
//! validated exactly once here, at construction. Lookups afterwards are
//! plain array indexing; there is no per-call re-checking.
//!
//! t5 is a destination only: it has no TTL, no dwell time, and no
//! promotion threshold. Every lookup for t5 returns `None`.

use chrono::Duration;

use crate::config::TierTableConfig;
use crate::error::Result;
use crate::types::Tier;

/// Validated, immutable policy table for the four source tiers.
#[derive(Debug, Clone)]
pub struct TierPolicy {
    /// TTL per source tier; `None` = unbounded.
    ttl: [Option<Duration>; 4],
    /// Minimum dwell time before promotion eligibility, per source tier.
    min_dwell: [Duration; 4],
    /// Promotion threshold per source tier.
    threshold: [f32; 4],
}

impl TierPolicy {
    /// Build a policy from configuration, enforcing the ordering invariants
    /// (strictly increasing thresholds and TTLs across t1..t4).
    ///
    /// # Errors
    /// Returns [`StrataError::Config`](crate::StrataError::Config) if the
    /// table violates any invariant.
    pub fn from_config(config: &TierTableConfig) -> Result<Self> {
        config.validate()?;
        let rows = config.rows();
        Ok(Self {
            ttl: rows.map(|r| r.ttl_hours.map(Duration::hours)),
            min_dwell: rows.map(|r| Duration::hours(r.min_dwell_hours)),
            threshold: rows.map(|r| r.threshold),
        })
    }

    /// TTL for a tier. `None` for unbounded tiers and for t5.
    #[must_use]
    pub fn ttl(&self, tier: Tier) -> Option<Duration> {
        if tier.is_source() {
            self.ttl[tier.index()]
        } else {
            None
        }
    }

    /// Minimum dwell time before a memory in `tier` may be promoted.
    /// `None` for t5.
    #[must_use]
    pub fn min_dwell(&self, tier: Tier) -> Option<Duration> {
        tier.is_source().then(|| self.min_dwell[tier.index()])
    }

    /// Promotion threshold for leaving `tier`. `None` for t5.
    #[must_use]
    pub fn threshold(&self, tier: Tier) -> Option<f32> {
        tier.is_source().then(|| self.threshold[tier.index()])
    }

    /// The promotion target for `tier` given `score`, or `None` if the
    /// score does not clear the threshold (or the tier is terminal).
    #[must_use]
    pub fn promotion_target(&self, tier: Tier, score: f32) -> Option<Tier> {
        let threshold = self.threshold(tier)?;
        (score >= threshold).then(|| tier.next()).flatten()
    }
}

impl Default for TierPolicy {
    /// The default table is always valid; see [`TierTableConfig`] defaults.
    fn default() -> Self {
        Self::from_config(&TierTableConfig::default())
            .unwrap_or_else(|_| unreachable!("default tier table is valid"))
    }
}
