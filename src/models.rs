//! Gap candidates and the scoring rules shared by both detectors.

use crate::semanticscholar::PaperRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Confidence at or above which a citation-network candidate is HIGH priority
pub const HIGH_THRESHOLD: f64 = 0.7;

/// Confidence at or above which a candidate is MEDIUM priority
pub const MEDIUM_THRESHOLD: f64 = 0.4;

/// Absolute cap on results per detector, applied after any user limit
pub const MAX_RESULTS: usize = 200;

/// Review tier derived from confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Tier for a citation-network confidence.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= HIGH_THRESHOLD {
            Priority::High
        } else if confidence >= MEDIUM_THRESHOLD {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    /// Tier for an author-network confidence; never HIGH.
    pub fn from_author_confidence(confidence: f64) -> Self {
        if confidence >= MEDIUM_THRESHOLD {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "HIGH",
            Priority::Medium => "MEDIUM",
            Priority::Low => "LOW",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a candidate was discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "origin", rename_all = "kebab-case")]
pub enum GapOrigin {
    /// Referenced by library papers (their ids)
    CitationNetwork { citing_papers: Vec<String> },
    /// Recently published by a frequent library author
    AuthorNetwork { source_author: String },
}

/// A paper missing from the library
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapCandidate {
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    /// External citation count
    pub impact: u64,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub paper_id: Option<String>,
    pub abstract_text: Option<String>,
    #[serde(flatten)]
    pub origin: GapOrigin,
    pub confidence: f64,
    pub priority: Priority,
    pub topic: Option<String>,
}

impl GapCandidate {
    /// New candidate from an API record, unscored.
    pub fn from_record(record: PaperRecord, origin: GapOrigin) -> Self {
        Self {
            title: record.title,
            authors: record.authors,
            year: record.year,
            impact: record.citation_count,
            venue: record.venue,
            doi: record.doi,
            arxiv_id: record.arxiv_id,
            paper_id: record.paper_id,
            abstract_text: record.abstract_text,
            origin,
            confidence: 0.0,
            priority: Priority::Low,
            topic: None,
        }
    }

    /// Deduplication key: DOI when present, else normalized title.
    pub fn key(&self) -> String {
        candidate_key(self.doi.as_deref(), &self.title)
    }

    /// Library papers citing this candidate (empty for author-network).
    pub fn citing_papers(&self) -> &[String] {
        match &self.origin {
            GapOrigin::CitationNetwork { citing_papers } => citing_papers,
            GapOrigin::AuthorNetwork { .. } => &[],
        }
    }

    pub fn source_author(&self) -> Option<&str> {
        match &self.origin {
            GapOrigin::AuthorNetwork { source_author } => Some(source_author),
            GapOrigin::CitationNetwork { .. } => None,
        }
    }

    /// Identifier usable for bulk import: DOI, else arXiv id.
    pub fn import_identifier(&self) -> Option<String> {
        self.doi
            .clone()
            .or_else(|| self.arxiv_id.as_ref().map(|a| format!("arXiv:{}", a)))
    }

    /// Set confidence (clamped) and the matching priority tier.
    pub fn set_confidence(&mut self, confidence: f64, priority: fn(f64) -> Priority) {
        let confidence = if confidence.is_finite() { confidence.clamp(0.0, 1.0) } else { 0.0 };
        self.confidence = confidence;
        self.priority = priority(confidence);
    }
}

/// Lowercase and collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Key used to merge candidates within one detection run.
pub fn candidate_key(doi: Option<&str>, title: &str) -> String {
    match doi.map(str::trim).filter(|d| !d.is_empty()) {
        Some(doi) => format!("doi:{}", doi.to_lowercase()),
        None => format!("title:{}", normalize_title(title)),
    }
}

/// `min(1, citing/10 + impact/1000)`
pub fn citation_confidence(citing_count: usize, impact: u64) -> f64 {
    (citing_count as f64 / 10.0 + impact as f64 / 1000.0).min(1.0)
}

/// Mean of `min(1, impact/100)` and a recency score floored at 0.1.
pub fn author_confidence(impact: u64, year: Option<i32>, current_year: i32) -> f64 {
    let citation_score = (impact as f64 / 100.0).min(1.0);
    let age = year.map(|y| (current_year - y).max(0)).unwrap_or(5);
    let recency_score = (1.0 - age as f64 / 5.0).max(0.1);
    (citation_score + recency_score) / 2.0
}

/// Ranking order: confidence desc, impact desc, title asc.
pub fn rank_order(a: &GapCandidate, b: &GapCandidate) -> Ordering {
    b.confidence
        .partial_cmp(&a.confidence)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.impact.cmp(&a.impact))
        .then_with(|| a.title.cmp(&b.title))
}

/// Sort by rank, then apply the optional limit and the hard cap.
pub fn rank_and_truncate(candidates: &mut Vec<GapCandidate>, limit: Option<usize>) {
    candidates.sort_by(rank_order);
    let keep = limit.unwrap_or(MAX_RESULTS).min(MAX_RESULTS);
    candidates.truncate(keep);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn candidate(title: &str, doi: Option<&str>, origin: GapOrigin) -> GapCandidate {
        GapCandidate::from_record(
            PaperRecord {
                title: title.to_string(),
                doi: doi.map(String::from),
                ..Default::default()
            },
            origin,
        )
    }

    #[test]
    fn test_citation_confidence() {
        assert!((citation_confidence(3, 150) - 0.45).abs() < 1e-9);
        assert_eq!(citation_confidence(8, 5000), 1.0);
        assert_eq!(Priority::from_confidence(0.45), Priority::Medium);
        assert_eq!(Priority::from_confidence(0.7), Priority::High);
        assert_eq!(Priority::from_confidence(0.39), Priority::Low);
    }

    #[test]
    fn test_author_confidence() {
        // Current-year paper with 50 citations: (0.5 + 1.0) / 2
        assert!((author_confidence(50, Some(2025), 2025) - 0.75).abs() < 1e-9);
        // Old paper floors recency at 0.1
        assert!((author_confidence(0, Some(2010), 2025) - 0.05).abs() < 1e-9);
        assert_eq!(Priority::from_author_confidence(0.99), Priority::Medium);
        assert_eq!(Priority::from_author_confidence(0.2), Priority::Low);
    }

    #[test]
    fn test_set_confidence_clamps() {
        let mut c = candidate("T", None, GapOrigin::AuthorNetwork { source_author: "A".into() });
        c.set_confidence(1.7, Priority::from_confidence);
        assert_eq!(c.confidence, 1.0);
        assert_eq!(c.priority, Priority::High);
        c.set_confidence(f64::NAN, Priority::from_confidence);
        assert_eq!(c.confidence, 0.0);
    }

    #[test]
    fn test_candidate_key() {
        assert_eq!(candidate_key(Some("10.1/ABC"), "x"), "doi:10.1/abc");
        assert_eq!(candidate_key(None, "  Deep   Learning "), "title:deep learning");
        assert_eq!(candidate_key(Some(" "), "T"), "title:t");
    }

    #[test]
    fn test_rank_and_truncate() {
        let origin = || GapOrigin::CitationNetwork { citing_papers: vec!["p".into()] };
        let mut list: Vec<GapCandidate> = (0..5)
            .map(|i| {
                let mut c = candidate(&format!("T{}", i), None, origin());
                c.set_confidence(i as f64 / 10.0, Priority::from_confidence);
                c
            })
            .collect();

        rank_and_truncate(&mut list, Some(3));
        let titles: Vec<&str> = list.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["T4", "T3", "T2"]);
    }

    #[test]
    fn test_import_identifier_prefers_doi() {
        let mut c = candidate("T", Some("10.1/x"), GapOrigin::AuthorNetwork { source_author: "A".into() });
        c.arxiv_id = Some("2401.00001".into());
        assert_eq!(c.import_identifier().as_deref(), Some("10.1/x"));
        c.doi = None;
        assert_eq!(c.import_identifier().as_deref(), Some("arXiv:2401.00001"));
    }
}
