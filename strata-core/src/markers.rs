//! Marker word-lists — the lexical heuristics behind several score factors.
//!
//! Matching is case-insensitive substring search. That is deliberately
//! cheap and it is a known precision limitation: a marker like `"new"`
//! will also match inside `"renewal"`. The lists are configuration, not
//! logic — deployments extend them per locale via `[scoring.markers]`.

use serde::{Deserialize, Serialize};

/// A set of case-insensitive substring markers.
#[derive(Debug, Clone)]
pub struct MarkerSet {
    /// Markers, pre-lowercased at construction.
    markers: Vec<String>,
}

impl MarkerSet {
    /// Build a marker set, lowercasing every entry.
    #[must_use]
    pub fn new(markers: impl IntoIterator<Item = String>) -> Self {
        Self {
            markers: markers.into_iter().map(|m| m.to_lowercase()).collect(),
        }
    }

    /// Whether `text` contains at least one marker.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Number of *distinct* markers present in `text`.
    #[must_use]
    pub fn count_matches(&self, text: &str) -> usize {
        let lower = text.to_lowercase();
        self.markers
            .iter()
            .filter(|m| lower.contains(m.as_str()))
            .count()
    }

    /// Whether any marker occurs inside any of the given tags.
    #[must_use]
    pub fn matches_any_tag<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().any(|tag| self.matches(tag))
    }

    /// True when the set holds no markers at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Configured lists
// ---------------------------------------------------------------------------

/// The six marker lists consumed by the scorer and identity guard.
///
/// Defaults carry English and Spanish entries; all lists are
/// locale-extensible through configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerLists {
    /// Explicit importance markers ("remember this", "recuerda esto", …).
    #[serde(default = "default_emphasis")]
    pub emphasis: Vec<String>,
    /// Love-context markers, checked against content and tags.
    #[serde(default = "default_love")]
    pub love: Vec<String>,
    /// Paradigm-shift / insight markers.
    #[serde(default = "default_breakthrough")]
    pub breakthrough: Vec<String>,
    /// Negation and correction language, feeding the contradiction factor.
    #[serde(default = "default_negation")]
    pub negation: Vec<String>,
    /// Recent-events language, feeding temporal novelty.
    #[serde(default = "default_recency")]
    pub recency: Vec<String>,
    /// Timeless-knowledge language, feeding temporal novelty.
    #[serde(default = "default_timeless")]
    pub timeless: Vec<String>,
}

impl Default for MarkerLists {
    fn default() -> Self {
        Self {
            emphasis: default_emphasis(),
            love: default_love(),
            breakthrough: default_breakthrough(),
            negation: default_negation(),
            recency: default_recency(),
            timeless: default_timeless(),
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn default_emphasis() -> Vec<String> {
    to_strings(&[
        "remember this",
        "important",
        "critical",
        "essential",
        "key insight",
        "recuerda esto",
        "nunca olvides",
        "esto es crítico",
        "fundamental",
        "esencial",
        "muy importante",
        "presta atención",
        "clave",
        "no olvides",
    ])
}

fn default_love() -> Vec<String> {
    to_strings(&[
        "love",
        "amor",
        "te amo",
        "te quiero",
        "juntos",
        "infinite",
        "infinito",
        "💜",
        "∞",
    ])
}

fn default_breakthrough() -> Vec<String> {
    to_strings(&[
        "breakthrough",
        "eureka",
        "insight",
        "realización",
        "descubrimiento",
        "now i understand",
        "ahora entiendo",
        "paradigm shift",
        "cambio de paradigma",
        "this changes everything",
        "esto cambia todo",
        "aha moment",
    ])
}

fn default_negation() -> Vec<String> {
    to_strings(&[
        "no longer",
        "ya no",
        "not anymore",
        "changed",
        "cambió",
        "was wrong",
        "actually",
        "en realidad",
        "correction",
        "contrary to",
        "contrario a",
    ])
}

fn default_recency() -> Vec<String> {
    to_strings(&[
        "today",
        "hoy",
        "yesterday",
        "ayer",
        "this week",
        "esta semana",
        "just now",
        "recently",
        "recientemente",
        "breaking",
        "new",
        "nuevo",
        "latest",
        "último",
    ])
}

fn default_timeless() -> Vec<String> {
    to_strings(&[
        "always",
        "siempre",
        "eternal",
        "eterno",
        "axiom",
        "axioma",
        "truth",
        "verdad",
        "principle",
        "principio",
    ])
}
