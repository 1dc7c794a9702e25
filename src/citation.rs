//! Citation-network gap detection.
//!
//! Pulls the outbound references of every library paper, keeps the ones the
//! library does not hold, and ranks them by how many library papers cite them
//! and how often the wider literature cites them.

use crate::client::ApiClient;
use crate::library::LibraryPaper;
use crate::models::{
    citation_confidence, normalize_title, rank_and_truncate, GapCandidate, GapOrigin, Priority,
};
use crate::semanticscholar::{
    self, is_bulk_addressable, normalize_doi, paper_endpoint, PaperRecord, BATCH_ENDPOINT,
    REFERENCE_FIELDS,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Default number of citing library papers required to keep a candidate
pub const DEFAULT_MIN_CONNECTIONS: usize = 2;

/// Identifiers of library papers, used to exclude held works.
#[derive(Debug, Default)]
pub struct LibraryIndex {
    dois: HashSet<String>,
    external_ids: HashSet<String>,
    titles: HashSet<String>,
}

impl LibraryIndex {
    pub fn new(library: &[LibraryPaper]) -> Self {
        let mut index = Self::default();
        for paper in library {
            if let Some(doi) = paper.doi.as_deref().and_then(normalize_doi) {
                index.dois.insert(doi);
            }
            if let Some(id) = paper.external_id.as_deref().filter(|id| !id.is_empty()) {
                index.external_ids.insert(id.to_string());
            }
            let title = normalize_title(&paper.title);
            if !title.is_empty() {
                index.titles.insert(title);
            }
        }
        index
    }

    pub fn contains_doi(&self, doi: &str) -> bool {
        normalize_doi(doi).is_some_and(|d| self.dois.contains(&d))
    }

    pub fn contains_external_id(&self, id: &str) -> bool {
        self.external_ids.contains(id)
    }

    /// Case-insensitive exact title match.
    pub fn contains_title(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    /// Whether a record already sits in the library: by DOI, by catalog id,
    /// or by title when it carries no DOI.
    pub fn holds(&self, record: &PaperRecord) -> bool {
        if record.paper_id.as_deref().is_some_and(|id| self.contains_external_id(id)) {
            return true;
        }
        match record.doi.as_deref() {
            Some(doi) => self.contains_doi(doi),
            None => self.contains_title(&record.title),
        }
    }
}

/// Outcome counters of a citation-network run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitationStats {
    pub bulk_papers: usize,
    pub single_papers: usize,
    pub unaddressable: usize,
    pub papers_with_references: usize,
    pub references_seen: usize,
    pub below_min_citations: usize,
    pub already_in_library: usize,
    pub below_min_connections: usize,
}

/// Detector for works referenced by library papers but missing from it.
pub struct CitationGapDetector<'a> {
    client: &'a ApiClient,
    min_connections: usize,
}

impl<'a> CitationGapDetector<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self {
            client,
            min_connections: DEFAULT_MIN_CONNECTIONS,
        }
    }

    /// Override the relevance gate (minimum citing library papers, at least 1).
    pub fn with_min_connections(mut self, min_connections: usize) -> Self {
        self.min_connections = min_connections.max(1);
        self
    }

    /// Run detection over the whole library.
    pub async fn detect(
        &self,
        library: &[LibraryPaper],
        min_citations: u64,
        limit: Option<usize>,
    ) -> (Vec<GapCandidate>, CitationStats) {
        let mut stats = CitationStats::default();
        let index = LibraryIndex::new(library);

        // Partition by addressability
        let mut bulk: Vec<(&LibraryPaper, String)> = Vec::new();
        let mut single: Vec<(&LibraryPaper, String)> = Vec::new();
        for paper in library {
            match (paper.doi.as_deref(), paper.external_id.as_deref()) {
                (Some(doi), _) if is_bulk_addressable(doi) => {
                    if let Some(doi) = normalize_doi(doi) {
                        bulk.push((paper, format!("DOI:{}", doi)));
                    }
                }
                (_, Some(id)) if !id.trim().is_empty() => single.push((paper, id.trim().to_string())),
                _ => stats.unaddressable += 1,
            }
        }
        stats.bulk_papers = bulk.len();
        stats.single_papers = single.len();

        info!(
            bulk = bulk.len(),
            single = single.len(),
            skipped = stats.unaddressable,
            "Starting citation-network analysis"
        );

        let mut aggregator = CandidateAggregator::new(&index, min_citations);
        let fields = vec![("fields", REFERENCE_FIELDS.to_string())];

        let ids: Vec<String> = bulk.iter().map(|(_, id)| id.clone()).collect();
        let payloads = self.client.request_batch(BATCH_ENDPOINT, &ids, &fields).await;
        for ((paper, _), payload) in bulk.iter().zip(payloads) {
            if let Some(payload) = payload {
                stats.papers_with_references += 1;
                aggregator.add_references(&paper.id, semanticscholar::parse_references(&payload));
            }
        }

        for (paper, id) in &single {
            debug!(paper = %paper.id, "Individual reference lookup");
            if let Some(payload) = self.client.request(&paper_endpoint(id), &fields).await {
                self.client.persist_cache();
                stats.papers_with_references += 1;
                aggregator.add_references(&paper.id, semanticscholar::parse_references(&payload));
            }
        }

        stats.references_seen = aggregator.references_seen;
        stats.below_min_citations = aggregator.below_min_citations;
        stats.already_in_library = aggregator.already_in_library;

        let mut candidates = Vec::new();
        for mut candidate in aggregator.into_candidates() {
            let citing = candidate.citing_papers().len();
            if citing < self.min_connections {
                stats.below_min_connections += 1;
                continue;
            }
            candidate.set_confidence(citation_confidence(citing, candidate.impact), Priority::from_confidence);
            candidates.push(candidate);
        }

        rank_and_truncate(&mut candidates, limit);

        info!(
            candidates = candidates.len(),
            references = stats.references_seen,
            dropped_weak = stats.below_min_connections,
            "Citation-network analysis complete"
        );

        (candidates, stats)
    }
}

/// Upserts references into candidates keyed by DOI, falling back to title.
struct CandidateAggregator<'i> {
    index: &'i LibraryIndex,
    min_citations: u64,
    order: Vec<String>,
    by_key: HashMap<String, GapCandidate>,
    references_seen: usize,
    below_min_citations: usize,
    already_in_library: usize,
}

impl<'i> CandidateAggregator<'i> {
    fn new(index: &'i LibraryIndex, min_citations: u64) -> Self {
        Self {
            index,
            min_citations,
            order: Vec::new(),
            by_key: HashMap::new(),
            references_seen: 0,
            below_min_citations: 0,
            already_in_library: 0,
        }
    }

    fn add_references(&mut self, citing_id: &str, references: Vec<PaperRecord>) {
        for record in references {
            self.references_seen += 1;

            if self.index.holds(&record) {
                self.already_in_library += 1;
                continue;
            }
            if record.citation_count < self.min_citations {
                self.below_min_citations += 1;
                continue;
            }

            let key = crate::models::candidate_key(record.doi.as_deref(), &record.title);
            let candidate = self.by_key.entry(key.clone()).or_insert_with(|| {
                self.order.push(key);
                GapCandidate::from_record(
                    record,
                    GapOrigin::CitationNetwork {
                        citing_papers: Vec::new(),
                    },
                )
            });

            if let GapOrigin::CitationNetwork { citing_papers } = &mut candidate.origin {
                if !citing_papers.iter().any(|id| id == citing_id) {
                    citing_papers.push(citing_id.to_string());
                }
            }
        }
    }

    /// Candidates in first-seen order.
    fn into_candidates(mut self) -> Vec<GapCandidate> {
        self.order
            .iter()
            .filter_map(|key| self.by_key.remove(key))
            .collect()
    }
}
