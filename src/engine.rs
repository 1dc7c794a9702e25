//! Gap analysis orchestration.
//!
//! Runs the citation detector to completion, then the author detector, on one
//! shared client so both draw from the same rate budget. Filtering, topic
//! grouping and report rendering follow.

use crate::author::AuthorGapDetector;
use crate::citation::{CitationGapDetector, CitationStats};
use crate::client::{ApiClient, ClientStats};
use crate::config::AnalysisOptions;
use crate::error::{GapError, Result};
use crate::library::LibraryPaper;
use crate::models::GapCandidate;
use crate::quality::{FilterOutcome, QualityFilter};
use crate::report::{self, LibrarySummary, ReportInput};
use crate::semanticscholar::is_bulk_addressable;
use crate::topics::{TopicClassifier, TopicGroup};
use chrono::{DateTime, Local};
use std::collections::HashSet;
use tracing::info;

/// Result of one analysis run
#[derive(Debug)]
pub struct GapAnalysis {
    pub citation_gaps: Vec<GapCandidate>,
    pub citation_stats: CitationStats,
    pub author_gaps: Vec<GapCandidate>,
    /// Author-network candidates before quality filtering
    pub author_raw_count: usize,
    pub filter: FilterOutcome,
    pub topics: Vec<TopicGroup>,
    pub summary: LibrarySummary,
    pub client_stats: ClientStats,
    pub generated_at: DateTime<Local>,
    pub report: String,
}

impl GapAnalysis {
    /// Write the rendered report into `dir`.
    pub fn write_report(&self, dir: &std::path::Path) -> Result<std::path::PathBuf> {
        report::write_report(dir, &self.report, self.generated_at)
    }
}

fn summarize(library: &[LibraryPaper]) -> LibrarySummary {
    let authors: HashSet<&str> = library
        .iter()
        .flat_map(|p| p.authors.iter().map(|a| a.trim()))
        .filter(|a| !a.is_empty())
        .collect();
    let addressable = library
        .iter()
        .filter(|p| {
            p.doi.as_deref().is_some_and(is_bulk_addressable)
                || p.external_id.as_deref().is_some_and(|id| !id.trim().is_empty())
        })
        .count();

    LibrarySummary {
        paper_count: library.len(),
        author_count: authors.len(),
        addressable_count: addressable,
    }
}

/// Run the full analysis against `library`.
///
/// Fails only when the library is empty; API failures reduce the result set.
pub async fn run_gap_analysis(
    client: &ApiClient,
    library: &[LibraryPaper],
    options: &AnalysisOptions,
) -> Result<GapAnalysis> {
    if library.is_empty() {
        return Err(GapError::EmptyLibrary);
    }

    let summary = summarize(library);
    info!(
        papers = summary.paper_count,
        authors = summary.author_count,
        "Starting gap analysis"
    );

    let (mut citation_gaps, citation_stats) = CitationGapDetector::new(client)
        .with_min_connections(options.min_connections)
        .detect(library, options.min_citations, options.limit)
        .await;

    let author_raw = AuthorGapDetector::new(client, options.current_year)
        .with_top_authors(options.top_authors)
        .with_search_limit(options.author_search_limit)
        .with_author_delay(options.author_delay)
        .detect(library, options.year_from, options.limit)
        .await;
    let author_raw_count = author_raw.len();

    let filter = QualityFilter::new(options.current_year).apply(author_raw);
    let topics = TopicClassifier::default().group(&mut citation_gaps);

    client.persist_cache();

    let generated_at = Local::now();
    let report = report::render(
        &ReportInput {
            citation: &citation_gaps,
            author: &filter.candidates,
            filtered_out: filter.removed,
            topics: &topics,
            library: &summary,
            current_year: options.current_year,
        },
        generated_at,
    );

    let client_stats = client.stats();
    info!(
        citation = citation_gaps.len(),
        author = filter.candidates.len(),
        network_calls = client_stats.network_calls,
        cache_hits = client_stats.cache_hits,
        "Gap analysis complete"
    );

    Ok(GapAnalysis {
        author_gaps: filter.candidates.clone(),
        citation_gaps,
        citation_stats,
        author_raw_count,
        filter,
        topics,
        summary,
        client_stats,
        generated_at,
        report,
    })
}
