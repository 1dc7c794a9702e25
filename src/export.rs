//! CSV export of candidate sets, written next to the report.

use crate::error::Result;
use crate::models::GapCandidate;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// CSV column order for candidate exports
pub const CANDIDATE_COLUMNS: &[&str] = &[
    "title", "authors", "year", "citations", "venue", "doi", "arxiv_id", "origin",
    "connections", "source_author", "topic", "confidence", "priority",
];

/// Flat row for one candidate
#[derive(Debug, Serialize)]
pub struct CandidateRow {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub citations: u64,
    pub venue: String,
    pub doi: String,
    pub arxiv_id: String,
    pub origin: &'static str,
    pub connections: usize,
    pub source_author: String,
    pub topic: String,
    pub confidence: String,
    pub priority: &'static str,
}

impl From<&GapCandidate> for CandidateRow {
    fn from(c: &GapCandidate) -> Self {
        CandidateRow {
            title: c.title.clone(),
            authors: c.authors.join("; "),
            year: c.year.map(|y| y.to_string()).unwrap_or_default(),
            citations: c.impact,
            venue: c.venue.clone().unwrap_or_default(),
            doi: c.doi.clone().unwrap_or_default(),
            arxiv_id: c.arxiv_id.clone().unwrap_or_default(),
            origin: if c.source_author().is_some() {
                "author-network"
            } else {
                "citation-network"
            },
            connections: c.citing_papers().len(),
            source_author: c.source_author().unwrap_or_default().to_string(),
            topic: c.topic.clone().unwrap_or_default(),
            confidence: format!("{:.3}", c.confidence),
            priority: c.priority.label(),
        }
    }
}

/// Save candidates to a CSV file. Returns `None` when there is nothing to write.
pub fn save_candidates(path: &Path, candidates: &[GapCandidate]) -> Result<Option<PathBuf>> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;
    for candidate in candidates {
        wtr.serialize(CandidateRow::from(candidate))?;
    }
    wtr.flush()?;

    info!(path = %path.display(), rows = candidates.len(), "Saved candidate CSV");
    Ok(Some(path.to_path_buf()))
}
