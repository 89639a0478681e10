//! Configuration for the strata consolidation engine.
//!
//! Everything here is externally supplied — weights, bonus magnitudes,
//! tier tables, marker lists. Nothing is hard-coded into the engine, and
//! all of it is validated once, fatally, at engine construction.
//! Maps directly to `strata.toml`.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};
use crate::markers::MarkerLists;

/// How far the weight vector may drift from 1.0 before being rejected.
const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

/// Top-level strata configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Surprise scoring weights, bonuses, and marker lists.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Per-tier TTL / dwell / threshold tables.
    #[serde(default)]
    pub tiers: TierTableConfig,
    /// Engine behavior settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`] if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| StrataError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check every construction-time invariant.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`] on the first violation found.
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.tiers.validate()
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Scoring configuration: six factor weights, two bonuses, marker lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// The six factor weights. Must sum to 1.0.
    #[serde(default)]
    pub weights: ScoringWeights,
    /// Additive bonus magnitudes.
    #[serde(default)]
    pub bonuses: BonusConfig,
    /// Marker word-lists for the lexical factors.
    #[serde(default)]
    pub markers: MarkerLists,
}

impl ScoringConfig {
    /// Validate weights and bonuses.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`] if the weight vector does not sum to
    /// 1.0, or any weight/bonus is outside [0, 1].
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        for (name, value) in [
            ("bonuses.love", self.bonuses.love),
            ("bonuses.breakthrough", self.bonuses.breakthrough),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrataError::Config(format!(
                    "{name} = {value} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// The six surprise factor weights. Must sum to 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight for embedding/tag novelty.
    #[serde(default = "default_0_25")]
    pub novelty: f32,
    /// Weight for contradiction detection.
    #[serde(default = "default_0_20")]
    pub contradiction: f32,
    /// Weight for explicit user emphasis.
    #[serde(default = "default_0_15")]
    pub user_emphasis: f32,
    /// Weight for temporal novelty.
    #[serde(default = "default_0_10")]
    pub temporal_novelty: f32,
    /// Weight for emotional weight (valence + intensity).
    #[serde(default = "default_0_15")]
    pub emotional_weight: f32,
    /// Weight for interconnectivity with the corpus.
    #[serde(default = "default_0_15")]
    pub interconnectivity: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            novelty: 0.25,
            contradiction: 0.20,
            user_emphasis: 0.15,
            temporal_novelty: 0.10,
            emotional_weight: 0.15,
            interconnectivity: 0.15,
        }
    }
}

impl ScoringWeights {
    /// Sum of all six weights.
    #[must_use]
    pub fn sum(&self) -> f32 {
        self.novelty
            + self.contradiction
            + self.user_emphasis
            + self.temporal_novelty
            + self.emotional_weight
            + self.interconnectivity
    }

    /// Validate ranges and the sum-to-one invariant.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`] on violation.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("novelty", self.novelty),
            ("contradiction", self.contradiction),
            ("user_emphasis", self.user_emphasis),
            ("temporal_novelty", self.temporal_novelty),
            ("emotional_weight", self.emotional_weight),
            ("interconnectivity", self.interconnectivity),
        ] {
            if !(0.0..=1.0).contains(&w) {
                return Err(StrataError::Config(format!(
                    "weight {name} = {w} outside [0, 1]"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(StrataError::Config(format!(
                "scoring weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

/// Additive score bonuses applied after the weighted factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusConfig {
    /// Bonus when love-context markers match a tag or the content.
    #[serde(default = "default_0_10")]
    pub love: f32,
    /// Bonus when breakthrough markers match the content.
    #[serde(default = "default_0_15")]
    pub breakthrough: f32,
}

impl Default for BonusConfig {
    fn default() -> Self {
        Self {
            love: 0.10,
            breakthrough: 0.15,
        }
    }
}

// ---------------------------------------------------------------------------
// Tier tables
// ---------------------------------------------------------------------------

/// One source tier's row in the policy table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TierRule {
    /// Time-to-live in hours; `None` means the tier never expires.
    pub ttl_hours: Option<i64>,
    /// Minimum hours a memory must dwell before it may be promoted.
    pub min_dwell_hours: i64,
    /// Surprise score required for promotion out of this tier.
    pub threshold: f32,
}

/// Policy rows for the four source tiers. t5 is a destination only and
/// carries neither TTL nor threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTableConfig {
    /// Immediate tier (default: 24h TTL, 1h dwell, 0.30 threshold).
    #[serde(default = "default_t1_rule")]
    pub t1: TierRule,
    /// Session tier (default: 7d TTL, 24h dwell, 0.50 threshold).
    #[serde(default = "default_t2_rule")]
    pub t2: TierRule,
    /// Patterns tier (default: 30d TTL, 7d dwell, 0.70 threshold).
    #[serde(default = "default_t3_rule")]
    pub t3: TierRule,
    /// Persistent tier (default: no TTL, 30d dwell, 0.90 threshold).
    #[serde(default = "default_t4_rule")]
    pub t4: TierRule,
}

impl Default for TierTableConfig {
    fn default() -> Self {
        Self {
            t1: default_t1_rule(),
            t2: default_t2_rule(),
            t3: default_t3_rule(),
            t4: default_t4_rule(),
        }
    }
}

impl TierTableConfig {
    /// Rows in tier order t1..t4.
    #[must_use]
    pub fn rows(&self) -> [TierRule; 4] {
        [self.t1, self.t2, self.t3, self.t4]
    }

    /// Validate the ordering invariants the policy tables must satisfy.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`] if thresholds are not strictly
    /// increasing in (0, 1], TTLs are not strictly increasing (an unbounded
    /// TTL may only be followed by unbounded TTLs), or any duration is
    /// non-positive.
    pub fn validate(&self) -> Result<()> {
        let rows = self.rows();
        let names = ["t1", "t2", "t3", "t4"];

        for (name, rule) in names.iter().zip(rows.iter()) {
            if !(0.0 < rule.threshold && rule.threshold <= 1.0) {
                return Err(StrataError::Config(format!(
                    "{name} threshold {} outside (0, 1]",
                    rule.threshold
                )));
            }
            if rule.min_dwell_hours <= 0 {
                return Err(StrataError::Config(format!(
                    "{name} min_dwell_hours {} must be positive",
                    rule.min_dwell_hours
                )));
            }
            if let Some(ttl) = rule.ttl_hours {
                if ttl <= 0 {
                    return Err(StrataError::Config(format!(
                        "{name} ttl_hours {ttl} must be positive"
                    )));
                }
            }
        }

        for i in 1..rows.len() {
            if rows[i].threshold <= rows[i - 1].threshold {
                return Err(StrataError::Config(format!(
                    "thresholds must strictly increase: {} ({}) <= {} ({})",
                    names[i],
                    rows[i].threshold,
                    names[i - 1],
                    rows[i - 1].threshold
                )));
            }
            match (rows[i - 1].ttl_hours, rows[i].ttl_hours) {
                (Some(prev), Some(next)) if next <= prev => {
                    return Err(StrataError::Config(format!(
                        "TTLs must strictly increase: {} ({next}h) <= {} ({prev}h)",
                        names[i],
                        names[i - 1]
                    )));
                }
                // Unbounded is treated as +infinity; nothing finite may follow it.
                (None, Some(next)) => {
                    return Err(StrataError::Config(format!(
                        "{} has finite TTL {next}h after unbounded {}",
                        names[i],
                        names[i - 1]
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

fn default_t1_rule() -> TierRule {
    TierRule {
        ttl_hours: Some(24),
        min_dwell_hours: 1,
        threshold: 0.30,
    }
}

fn default_t2_rule() -> TierRule {
    TierRule {
        ttl_hours: Some(7 * 24),
        min_dwell_hours: 24,
        threshold: 0.50,
    }
}

fn default_t3_rule() -> TierRule {
    TierRule {
        ttl_hours: Some(30 * 24),
        min_dwell_hours: 7 * 24,
        threshold: 0.70,
    }
}

fn default_t4_rule() -> TierRule {
    TierRule {
        ttl_hours: None,
        min_dwell_hours: 30 * 24,
        threshold: 0.90,
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Engine behavior settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Evaluate everything but apply no store mutation.
    #[serde(default)]
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_0_10() -> f32 { 0.10 }
fn default_0_15() -> f32 { 0.15 }
fn default_0_20() -> f32 { 0.20 }
fn default_0_25() -> f32 { 0.25 }
