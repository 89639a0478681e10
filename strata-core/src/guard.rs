//! Identity guard — the stricter admission check in front of the terminal
//! tier.
//!
//! Promotion into t5 is the only irreversible *addition* in the system:
//! t5 members are never deleted and never overwritten. Before a memory is
//! allowed in, its contradiction factor is recomputed against the
//! terminal-tier corpus specifically; a strong conflict means the memory
//! could corrupt established core knowledge and is held back for manual
//! review instead.

use std::fmt;

use serde::Serialize;

use crate::scoring::SurpriseScorer;
use crate::types::Memory;

/// Contradiction level above which admission to the terminal tier is
/// refused.
pub const CONTRADICTION_LIMIT: f32 = 0.70;

/// Why the guard reached its verdict. The safe variants are recorded for
/// audit purposes only — both are admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    /// Contradicts established core knowledge; requires manual review.
    ContradictsCore,
    /// Shares at least one tag with the terminal-tier corpus.
    ExtendsExistingFacet,
    /// No tag overlap — a genuinely new facet of the archive.
    NewFacet,
}

impl fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContradictsCore => {
                f.write_str("contradicts established core knowledge; requires manual review")
            }
            Self::ExtendsExistingFacet => f.write_str("extends an existing facet"),
            Self::NewFacet => f.write_str("introduces a new facet"),
        }
    }
}

/// Result of an identity-coherence check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IdentityVerdict {
    /// Whether the memory may enter the terminal tier.
    pub safe: bool,
    /// Why.
    pub reason: AdmissionReason,
    /// The contradiction factor measured against the terminal-tier corpus.
    pub contradiction: f32,
}

impl IdentityVerdict {
    /// Classify from the raw signals. Split out so the admission boundary
    /// is testable independently of marker heuristics.
    #[must_use]
    pub fn from_signals(contradiction: f32, shares_tag: bool) -> Self {
        if contradiction > CONTRADICTION_LIMIT {
            return Self {
                safe: false,
                reason: AdmissionReason::ContradictsCore,
                contradiction,
            };
        }
        Self {
            safe: true,
            reason: if shares_tag {
                AdmissionReason::ExtendsExistingFacet
            } else {
                AdmissionReason::NewFacet
            },
            contradiction,
        }
    }
}

/// Admission check for promotions targeting the terminal tier.
#[derive(Debug)]
pub struct IdentityGuard<'a> {
    scorer: &'a SurpriseScorer,
}

impl<'a> IdentityGuard<'a> {
    /// Borrow the engine's scorer; the guard reuses its contradiction
    /// factor rather than defining a second heuristic.
    #[must_use]
    pub fn new(scorer: &'a SurpriseScorer) -> Self {
        Self { scorer }
    }

    /// Verify a promotion candidate against the terminal-tier corpus.
    #[must_use]
    pub fn verify(&self, candidate: &Memory, terminal_corpus: &[&Memory]) -> IdentityVerdict {
        let contradiction = self.scorer.contradiction(candidate, terminal_corpus);
        let shares_tag = terminal_corpus
            .iter()
            .any(|c| candidate.shares_tag_with(c));
        IdentityVerdict::from_signals(contradiction, shares_tag)
    }
}
