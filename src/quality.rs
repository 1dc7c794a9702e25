//! Quality filtering for author-network candidates.
//!
//! Author searches return everything an author touched, including reviews,
//! errata and front matter. This module drops those, repeated identifiers,
//! placeholder titles and recent papers with implausible citation counts.

use crate::models::GapCandidate;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;
use tracing::{debug, info};

/// Title phrases marking low editorial value (case-insensitive substring)
pub const LOW_VALUE_PATTERNS: &[&str] = &[
    "book review",
    "review of",
    "editorial",
    "erratum",
    "errata",
    "corrigendum",
    "correction to",
    "retraction",
    "retracted",
    "obituary",
    "in memoriam",
    "letter to the editor",
    "reply to",
    "response to",
    "commentary on",
    "preface",
    "front matter",
    "table of contents",
    "news and views",
    "conference report",
];

/// Titles shorter than this are treated as placeholders
pub const MIN_TITLE_CHARS: usize = 10;

/// Citation count that is implausible for a paper from this or next year
pub const MAX_RECENT_IMPACT: u64 = 500;

/// Why a candidate was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    LowValueTitle,
    DuplicateIdentifier,
    PlaceholderTitle,
    ImplausibleImpact,
}

impl RemovalReason {
    pub fn label(&self) -> &'static str {
        match self {
            RemovalReason::LowValueTitle => "low editorial value",
            RemovalReason::DuplicateIdentifier => "duplicate identifier",
            RemovalReason::PlaceholderTitle => "placeholder title",
            RemovalReason::ImplausibleImpact => "implausible recent impact",
        }
    }
}

/// Filtered candidates plus removal counts
#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub candidates: Vec<GapCandidate>,
    pub removed: usize,
    pub reasons: BTreeMap<RemovalReason, usize>,
}

fn placeholder_pattern() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| {
            Regex::new(r"(?i)^[\[\(<]*\s*(untitled|no title|title|n/?a|tbd|tba|unknown|none|null|placeholder)\s*[\]\)>]*\.?$").ok()
        })
        .as_ref()
}

/// Filter for author-network candidates.
#[derive(Debug, Clone)]
pub struct QualityFilter {
    current_year: i32,
}

impl QualityFilter {
    pub fn new(current_year: i32) -> Self {
        Self { current_year }
    }

    /// Reason the candidate should be dropped, ignoring duplicates.
    pub fn rejection(&self, candidate: &GapCandidate) -> Option<RemovalReason> {
        let title = candidate.title.trim();
        let lowered = title.to_lowercase();

        if LOW_VALUE_PATTERNS.iter().any(|p| lowered.contains(p)) {
            return Some(RemovalReason::LowValueTitle);
        }
        if title.chars().count() < MIN_TITLE_CHARS
            || placeholder_pattern().is_some_and(|re| re.is_match(title))
        {
            return Some(RemovalReason::PlaceholderTitle);
        }
        if candidate.year.is_some_and(|y| y >= self.current_year && y <= self.current_year + 1)
            && candidate.impact > MAX_RECENT_IMPACT
        {
            return Some(RemovalReason::ImplausibleImpact);
        }
        None
    }

    /// Apply every rule; the first occurrence of a repeated DOI wins.
    pub fn apply(&self, candidates: Vec<GapCandidate>) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();
        let mut seen = HashSet::new();

        for candidate in candidates {
            let reason = match self.rejection(&candidate) {
                Some(reason) => Some(reason),
                None => candidate
                    .doi
                    .as_ref()
                    .map(|d| d.to_lowercase())
                    .filter(|d| !seen.insert(d.clone()))
                    .map(|_| RemovalReason::DuplicateIdentifier),
            };

            match reason {
                Some(reason) => {
                    debug!(title = %candidate.title, reason = reason.label(), "Filtered candidate");
                    outcome.removed += 1;
                    *outcome.reasons.entry(reason).or_insert(0) += 1;
                }
                None => outcome.candidates.push(candidate),
            }
        }

        info!(
            kept = outcome.candidates.len(),
            removed = outcome.removed,
            "Quality filter applied"
        );
        outcome
    }
}
