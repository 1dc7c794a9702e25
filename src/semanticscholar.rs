//! Semantic Scholar payload mapping
//!
//! Turns the loosely-typed JSON returned by the Graph API into [`PaperRecord`]
//! values at the boundary, so detectors never handle raw maps.
//!
//! API Details:
//! - Batch endpoint: POST /graph/v1/paper/batch (max 500 ids, nulls for misses)
//! - Single endpoint: GET /graph/v1/paper/{id}
//! - Search endpoint: GET /graph/v1/paper/search

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Bulk reference lookup endpoint
pub const BATCH_ENDPOINT: &str = "paper/batch";

/// Free-text work search endpoint
pub const SEARCH_ENDPOINT: &str = "paper/search";

/// Fields requested for each library paper's outbound references
pub const REFERENCE_FIELDS: &str = "references.paperId,references.title,references.authors,references.year,references.citationCount,references.venue,references.externalIds";

/// Fields requested for author-network works
pub const WORK_FIELDS: &str = "paperId,title,authors,year,citationCount,venue,externalIds,abstract";

/// Endpoint for a single paper lookup
pub fn paper_endpoint(id: &str) -> String {
    format!("paper/{}", id)
}

/// Typed view of one paper in an API payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaperRecord {
    pub paper_id: Option<String>,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub citation_count: u64,
    pub venue: Option<String>,
    pub doi: Option<String>,
    pub arxiv_id: Option<String>,
    pub abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSPaper {
    #[serde(rename = "paperId")]
    paper_id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    authors: Option<Vec<SSAuthor>>,
    year: Option<i32>,
    #[serde(rename = "citationCount")]
    citation_count: Option<i64>,
    venue: Option<String>,
    #[serde(rename = "externalIds")]
    external_ids: Option<SSExternalIds>,
    #[serde(rename = "abstract")]
    abstract_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSAuthor {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SSExternalIds {
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "ArXiv")]
    arxiv: Option<String>,
}

/// Map one paper payload. Items without a usable title are dropped.
pub fn parse_paper(value: &Value) -> Option<PaperRecord> {
    if value.is_null() {
        return None;
    }

    let paper: SSPaper = match serde_json::from_value(value.clone()) {
        Ok(p) => p,
        Err(e) => {
            debug!(error = %e, "Skipping malformed paper payload");
            return None;
        }
    };

    let title = paper.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;

    let (doi, arxiv_id) = paper
        .external_ids
        .map(|ids| (ids.doi.and_then(|d| normalize_doi(&d)), ids.arxiv))
        .unwrap_or((None, None));

    let authors = paper
        .authors
        .unwrap_or_default()
        .into_iter()
        .filter_map(|a| a.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();

    Some(PaperRecord {
        paper_id: paper.paper_id.filter(|id| !id.is_empty()),
        title,
        authors,
        year: paper.year,
        citation_count: paper.citation_count.unwrap_or(0).max(0) as u64,
        venue: paper.venue.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()),
        doi,
        arxiv_id: arxiv_id.filter(|a| !a.is_empty()),
        abstract_text: paper.abstract_text.filter(|a| !a.trim().is_empty()),
    })
}

/// Map the `references` list of a paper payload; malformed entries are skipped.
pub fn parse_references(value: &Value) -> Vec<PaperRecord> {
    value
        .get("references")
        .and_then(Value::as_array)
        .map(|refs| refs.iter().filter_map(parse_paper).collect())
        .unwrap_or_default()
}

/// Map the `data` list of a search response.
pub fn parse_search(value: &Value) -> Vec<PaperRecord> {
    value
        .get("data")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_paper).collect())
        .unwrap_or_default()
}

fn doi_pattern() -> Option<&'static Regex> {
    static DOI: OnceLock<Option<Regex>> = OnceLock::new();
    DOI.get_or_init(|| Regex::new(r"^10\.\d{4,9}/\S+$").ok()).as_ref()
}

/// Normalize a DOI: strip resolver prefixes, trim, lowercase.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim().to_lowercase();
    for prefix in ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "http://dx.doi.org/", "doi:"] {
        if let Some(rest) = doi.strip_prefix(prefix) {
            doi = rest.trim().to_string();
        }
    }
    (!doi.is_empty()).then_some(doi)
}

/// Whether the bulk endpoint can address a paper by this DOI.
pub fn is_bulk_addressable(doi: &str) -> bool {
    normalize_doi(doi)
        .map(|d| doi_pattern().is_some_and(|re| re.is_match(&d)))
        .unwrap_or(false)
}
