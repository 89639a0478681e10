//! Surprise scoring — the composite signal driving tier consolidation.
//!
//! A memory's surprise score measures how much *new* information it brings
//! relative to a corpus snapshot: six weighted factors plus two additive
//! bonuses, clamped to [0, 1].
//!
//! ```text
//! score = w₁·Novelty + w₂·Contradiction + w₃·Emphasis + w₄·Temporal
//!       + w₅·Emotional + w₆·Interconnectivity + love_bonus + breakthrough_bonus
//! ```
//!
//! Scoring is pure and deterministic: the same memory and corpus always
//! produce the same [`SurpriseBreakdown`]. The full breakdown — not just
//! the total — is returned so that every consolidation decision can be
//! explained after the fact.

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::error::Result;
use crate::markers::MarkerSet;
use crate::types::Memory;

/// Per-factor decomposition of a surprise score.
///
/// Factor values are the *raw* (unweighted) results in [0, 1]; the bonuses
/// are the applied additive amounts (zero when the marker didn't fire).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurpriseBreakdown {
    /// How different this memory is from everything in the corpus.
    pub novelty: f32,
    /// Whether it contradicts established knowledge (0, 0.5, or 0.85).
    pub contradiction: f32,
    /// Explicit user emphasis (0, 0.7, 0.85, or 1.0).
    pub user_emphasis: f32,
    /// Recency vs. timelessness of the content (0.7, 0.4, or 0.5).
    pub temporal_novelty: f32,
    /// 0.4·|valence| + 0.6·intensity.
    pub emotional_weight: f32,
    /// Fraction of the corpus sharing at least one tag.
    pub interconnectivity: f32,
    /// Applied love-context bonus.
    pub love_bonus: f32,
    /// Applied breakthrough bonus.
    pub breakthrough_bonus: f32,
    /// Weighted sum plus bonuses, clamped to [0, 1].
    pub final_score: f32,
}

/// Contradiction score when negation language co-occurs with a topically
/// overlapping corpus item — a real contradiction candidate.
const CONTRADICTION_TOPICAL: f32 = 0.85;
/// Contradiction score for negation language with no topical overlap.
const CONTRADICTION_BARE: f32 = 0.5;

/// Pure scorer over a validated [`ScoringConfig`].
#[derive(Debug, Clone)]
pub struct SurpriseScorer {
    weights: crate::config::ScoringWeights,
    bonuses: crate::config::BonusConfig,
    emphasis: MarkerSet,
    love: MarkerSet,
    breakthrough: MarkerSet,
    negation: MarkerSet,
    recency: MarkerSet,
    timeless: MarkerSet,
}

impl SurpriseScorer {
    /// Build a scorer, validating the weight vector.
    ///
    /// # Errors
    /// Returns [`StrataError::Config`](crate::StrataError::Config) if the
    /// six weights do not sum to 1.0 or any weight/bonus is out of range.
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        config.validate()?;
        let m = &config.markers;
        Ok(Self {
            weights: config.weights.clone(),
            bonuses: config.bonuses.clone(),
            emphasis: MarkerSet::new(m.emphasis.iter().cloned()),
            love: MarkerSet::new(m.love.iter().cloned()),
            breakthrough: MarkerSet::new(m.breakthrough.iter().cloned()),
            negation: MarkerSet::new(m.negation.iter().cloned()),
            recency: MarkerSet::new(m.recency.iter().cloned()),
            timeless: MarkerSet::new(m.timeless.iter().cloned()),
        })
    }

    /// Score `memory` against a corpus snapshot.
    ///
    /// The caller is responsible for excluding `memory` itself from
    /// `corpus`; the engine does this when it assembles the snapshot.
    #[must_use]
    pub fn score(&self, memory: &Memory, corpus: &[&Memory]) -> SurpriseBreakdown {
        let novelty = self.novelty(memory, corpus);
        let contradiction = self.contradiction(memory, corpus);
        let user_emphasis = self.user_emphasis(&memory.content);
        let temporal_novelty = self.temporal_novelty(&memory.content);
        let emotional_weight = emotional_weight(memory);
        let interconnectivity = interconnectivity(memory, corpus);

        let base = novelty * self.weights.novelty
            + contradiction * self.weights.contradiction
            + user_emphasis * self.weights.user_emphasis
            + temporal_novelty * self.weights.temporal_novelty
            + emotional_weight * self.weights.emotional_weight
            + interconnectivity * self.weights.interconnectivity;

        let love_bonus = if self.is_love_context(memory) {
            self.bonuses.love
        } else {
            0.0
        };
        let breakthrough_bonus = if self.breakthrough.matches(&memory.content) {
            self.bonuses.breakthrough
        } else {
            0.0
        };

        SurpriseBreakdown {
            novelty,
            contradiction,
            user_emphasis,
            temporal_novelty,
            emotional_weight,
            interconnectivity,
            love_bonus,
            breakthrough_bonus,
            final_score: (base + love_bonus + breakthrough_bonus).clamp(0.0, 1.0),
        }
    }

    /// Novelty: inverse of the best embedding match against the corpus.
    ///
    /// Falls back to a tag-based heuristic (fraction of the memory's tags
    /// unseen anywhere in the corpus) when either side lacks embeddings or
    /// the corpus is empty.
    fn novelty(&self, memory: &Memory, corpus: &[&Memory]) -> f32 {
        if let Some(embedding) = &memory.embedding {
            let max_similarity = corpus
                .iter()
                .filter_map(|c| c.embedding.as_ref())
                .map(|other| embedding.cosine_similarity(other))
                .fold(None::<f32>, |acc, sim| {
                    Some(acc.map_or(sim, |best| best.max(sim)))
                });
            if let Some(max_similarity) = max_similarity {
                // Negative similarity would push novelty above 1; clamp so
                // every raw factor stays in [0, 1].
                return (1.0 - max_similarity).clamp(0.0, 1.0);
            }
        }

        // Tag fallback.
        let new_tags = memory
            .tags
            .iter()
            .filter(|tag| !corpus.iter().any(|c| c.tags.contains(*tag)))
            .count();
        new_tags as f32 / memory.tags.len().max(1) as f32
    }

    /// Contradiction: negation/correction language, weighted by whether
    /// the corpus holds topically overlapping memories.
    ///
    /// Public because the identity guard recomputes this factor against
    /// the terminal-tier corpus specifically.
    #[must_use]
    pub fn contradiction(&self, memory: &Memory, corpus: &[&Memory]) -> f32 {
        if !self.negation.matches(&memory.content) {
            return 0.0;
        }
        let topical_overlap = corpus.iter().any(|c| memory.shares_tag_with(c));
        if topical_overlap {
            CONTRADICTION_TOPICAL
        } else {
            CONTRADICTION_BARE
        }
    }

    /// User emphasis: saturating non-linear map over distinct marker count.
    fn user_emphasis(&self, content: &str) -> f32 {
        match self.emphasis.count_matches(content) {
            0 => 0.0,
            1 => 0.7,
            2 => 0.85,
            _ => 1.0,
        }
    }

    /// Temporal novelty: recency markers beat timelessness markers.
    fn temporal_novelty(&self, content: &str) -> f32 {
        if self.recency.matches(content) {
            0.7
        } else if self.timeless.matches(content) {
            0.4
        } else {
            0.5
        }
    }

    /// Love context fires on either a matching tag or matching content.
    fn is_love_context(&self, memory: &Memory) -> bool {
        self.love.matches_any_tag(&memory.tags) || self.love.matches(&memory.content)
    }
}

impl Default for SurpriseScorer {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
            .unwrap_or_else(|_| unreachable!("default scoring config is valid"))
    }
}

/// Emotional weight: strong affect in either direction is memorable.
fn emotional_weight(memory: &Memory) -> f32 {
    0.4 * memory.emotional_valence.abs() + 0.6 * memory.emotional_intensity
}

/// Interconnectivity: fraction of the corpus sharing at least one tag.
/// Defaults to 0.5 when there is nothing to connect to.
fn interconnectivity(memory: &Memory, corpus: &[&Memory]) -> f32 {
    if corpus.is_empty() {
        return 0.5;
    }
    let connections = corpus
        .iter()
        .filter(|c| memory.shares_tag_with(c))
        .count();
    (connections as f32 / corpus.len() as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Embedding;
    use chrono::Utc;

    fn memory(content: &str, tags: &[&str]) -> Memory {
        Memory::new(
            content,
            tags.iter().map(|t| (*t).to_string()),
            Utc::now(),
            0.0,
            0.0,
        )
    }

    fn scorer() -> SurpriseScorer {
        SurpriseScorer::default()
    }

    #[test]
    fn empty_corpus_uses_tag_fallback_and_neutral_interconnectivity() {
        let m = memory("a quiet observation", &["walking", "rain"]);
        let breakdown = scorer().score(&m, &[]);

        // All tags are new against an empty corpus.
        assert!((breakdown.novelty - 1.0).abs() < f32::EPSILON);
        assert!((breakdown.interconnectivity - 0.5).abs() < f32::EPSILON);
        assert!(breakdown.final_score >= 0.0 && breakdown.final_score <= 1.0);
    }

    #[test]
    fn tagless_memory_does_not_divide_by_zero() {
        let m = memory("untagged note", &[]);
        let breakdown = scorer().score(&m, &[]);
        assert!(breakdown.novelty.abs() < f32::EPSILON);
    }

    #[test]
    fn embedding_novelty_inverts_best_match() {
        let mut m = memory("about the sea", &["sea"]);
        m.embedding = Some(Embedding(vec![1.0, 0.0, 0.0]));

        let mut near = memory("also about the sea", &["sea"]);
        near.embedding = Some(Embedding(vec![1.0, 0.0, 0.0]));
        let mut far = memory("about mountains", &["mountains"]);
        far.embedding = Some(Embedding(vec![0.0, 1.0, 0.0]));

        let breakdown = scorer().score(&m, &[&near, &far]);
        // Best match is identical → novelty ≈ 0.
        assert!(breakdown.novelty < 0.01);

        let breakdown_far = scorer().score(&m, &[&far]);
        assert!(breakdown_far.novelty > 0.99);
    }

    #[test]
    fn embedding_falls_back_when_corpus_has_none() {
        let mut m = memory("note", &["fresh-tag"]);
        m.embedding = Some(Embedding(vec![1.0, 0.0]));
        let plain = memory("no embedding here", &["other"]);

        let breakdown = scorer().score(&m, &[&plain]);
        // Corpus has no embeddings → tag fallback, and the tag is new.
        assert!((breakdown.novelty - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn contradiction_needs_topical_overlap_for_full_score() {
        let s = scorer();
        let contradicting = memory("actually, that restaurant closed", &["food"]);
        let overlapping = memory("great restaurant downtown", &["food"]);
        let unrelated = memory("bought a bicycle", &["cycling"]);

        assert!(
            (s.contradiction(&contradicting, &[&overlapping]) - 0.85).abs() < f32::EPSILON
        );
        assert!(
            (s.contradiction(&contradicting, &[&unrelated]) - 0.5).abs() < f32::EPSILON
        );

        let calm = memory("pleasant dinner tonight", &["food"]);
        assert!(s.contradiction(&calm, &[&overlapping]).abs() < f32::EPSILON);
    }

    #[test]
    fn emphasis_saturates_nonlinearly() {
        let s = scorer();
        let none = memory("a plain note", &[]);
        let one = memory("this is critical", &[]);
        let two = memory("critical and essential", &[]);
        let three = memory("critical, essential, remember this", &[]);

        assert!(s.score(&none, &[]).user_emphasis.abs() < f32::EPSILON);
        assert!((s.score(&one, &[]).user_emphasis - 0.7).abs() < f32::EPSILON);
        assert!((s.score(&two, &[]).user_emphasis - 0.85).abs() < f32::EPSILON);
        assert!((s.score(&three, &[]).user_emphasis - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn recency_markers_beat_timeless_markers() {
        let s = scorer();
        let recent = memory("saw it today", &[]);
        let timeless = memory("an eternal principle", &[]);
        let both = memory("today I grasped an eternal principle", &[]);
        let neither = memory("misc note", &[]);

        assert!((s.score(&recent, &[]).temporal_novelty - 0.7).abs() < f32::EPSILON);
        assert!((s.score(&timeless, &[]).temporal_novelty - 0.4).abs() < f32::EPSILON);
        // Recency is checked first.
        assert!((s.score(&both, &[]).temporal_novelty - 0.7).abs() < f32::EPSILON);
        assert!((s.score(&neither, &[]).temporal_novelty - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn emotional_weight_blends_valence_and_intensity() {
        let mut m = memory("strong feelings", &[]);
        m.emotional_valence = -0.5;
        m.emotional_intensity = 1.0;
        let breakdown = scorer().score(&m, &[]);
        assert!((breakdown.emotional_weight - (0.4 * 0.5 + 0.6)).abs() < 1e-6);
    }

    #[test]
    fn love_bonus_fires_on_tag_or_content() {
        let s = scorer();
        let tagged = memory("ordinary words", &["love"]);
        let worded = memory("te quiero siempre", &[]);
        let neither = memory("grocery list", &["errands"]);

        assert!((s.score(&tagged, &[]).love_bonus - 0.10).abs() < f32::EPSILON);
        assert!((s.score(&worded, &[]).love_bonus - 0.10).abs() < f32::EPSILON);
        assert!(s.score(&neither, &[]).love_bonus.abs() < f32::EPSILON);
    }

    #[test]
    fn breakthrough_bonus_fires_on_content() {
        let s = scorer();
        let m = memory("a real breakthrough in the proof", &[]);
        assert!((s.score(&m, &[]).breakthrough_bonus - 0.15).abs() < f32::EPSILON);
    }

    #[test]
    fn final_score_is_clamped_to_unit_interval() {
        let s = scorer();
        let mut m = memory(
            "critical essential remember this — a breakthrough today, te quiero",
            &["love"],
        );
        m.emotional_valence = 1.0;
        m.emotional_intensity = 1.0;
        m.embedding = Some(Embedding(vec![1.0, 0.0]));

        let mut opposite = memory("opposing item", &["love"]);
        opposite.embedding = Some(Embedding(vec![-1.0, 0.0]));

        let breakdown = s.score(&m, &[&opposite]);
        assert!((breakdown.final_score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn scoring_is_deterministic() {
        let s = scorer();
        let m = memory("same input, same output", &["derp"]);
        let other = memory("corpus item", &["derp"]);
        let a = s.score(&m, &[&other]);
        let b = s.score(&m, &[&other]);
        assert_eq!(a, b);
    }

    #[test]
    fn interconnectivity_is_corpus_fraction() {
        let m = memory("note", &["a"]);
        let shared = memory("x", &["a"]);
        let unshared = memory("y", &["b"]);
        let breakdown = scorer().score(&m, &[&shared, &unshared]);
        assert!((breakdown.interconnectivity - 0.5).abs() < f32::EPSILON);
    }
}
