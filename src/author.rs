//! Author-network gap detection.
//!
//! Takes the authors who appear most often in the library and looks for
//! their recent works that the library does not hold yet.

use crate::citation::LibraryIndex;
use crate::client::ApiClient;
use crate::library::LibraryPaper;
use crate::models::{author_confidence, rank_and_truncate, GapCandidate, GapOrigin, Priority};
use crate::semanticscholar::{self, SEARCH_ENDPOINT, WORK_FIELDS};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, info};

/// Authors with the most library papers, ties broken by name.
pub fn top_authors(library: &[LibraryPaper], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for paper in library {
        for author in &paper.authors {
            let author = author.trim();
            if !author.is_empty() {
                *counts.entry(author).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Detector for recent works by the library's most frequent authors.
pub struct AuthorGapDetector<'a> {
    client: &'a ApiClient,
    top_n: usize,
    search_limit: usize,
    author_delay: Duration,
    current_year: i32,
}

impl<'a> AuthorGapDetector<'a> {
    pub fn new(client: &'a ApiClient, current_year: i32) -> Self {
        Self {
            client,
            top_n: 10,
            search_limit: 20,
            author_delay: Duration::from_secs(2),
            current_year,
        }
    }

    pub fn with_top_authors(mut self, n: usize) -> Self {
        self.top_n = n;
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit.max(1);
        self
    }

    /// Extra pause between author searches, on top of the rate limiter.
    pub fn with_author_delay(mut self, delay: Duration) -> Self {
        self.author_delay = delay;
        self
    }

    pub async fn detect(
        &self,
        library: &[LibraryPaper],
        year_from: i32,
        limit: Option<usize>,
    ) -> Vec<GapCandidate> {
        let authors = top_authors(library, self.top_n);
        let index = LibraryIndex::new(library);

        info!(
            authors = authors.len(),
            year_from = year_from,
            "Starting author-network analysis"
        );

        let mut candidates = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (idx, (author, count)) in authors.iter().enumerate() {
            if idx > 0 && !self.author_delay.is_zero() {
                tokio::time::sleep(self.author_delay).await;
            }

            let params = vec![
                ("query", author.clone()),
                ("year", format!("{}-", year_from)),
                ("limit", self.search_limit.to_string()),
                ("fields", WORK_FIELDS.to_string()),
            ];

            let Some(payload) = self.client.request(SEARCH_ENDPOINT, &params).await else {
                debug!(author = %author, "No works returned");
                continue;
            };
            self.client.persist_cache();

            let mut found = 0;
            for record in semanticscholar::parse_search(&payload) {
                if !authored_by(&record.authors, author) {
                    continue;
                }
                if record.year.is_some_and(|y| y < year_from) {
                    continue;
                }
                if is_held(&index, &record) {
                    continue;
                }

                let mut candidate = GapCandidate::from_record(
                    record,
                    GapOrigin::AuthorNetwork {
                        source_author: author.clone(),
                    },
                );
                // Co-authored works come back once per author; the first search keeps it
                if !seen.insert(candidate.key()) {
                    continue;
                }
                let confidence = author_confidence(candidate.impact, candidate.year, self.current_year);
                candidate.set_confidence(confidence, Priority::from_author_confidence);
                candidates.push(candidate);
                found += 1;
            }

            info!(author = %author, library_papers = count, found = found, "Author searched");
        }

        rank_and_truncate(&mut candidates, limit);
        info!(candidates = candidates.len(), "Author-network analysis complete");
        candidates
    }
}

/// Exact display-name match, case-insensitive.
fn authored_by(authors: &[String], name: &str) -> bool {
    let name = name.trim().to_lowercase();
    authors.iter().any(|a| a.trim().to_lowercase() == name)
}

/// Held when the DOI, catalog id or exact title is already in the library.
fn is_held(index: &LibraryIndex, record: &semanticscholar::PaperRecord) -> bool {
    record.doi.as_deref().is_some_and(|d| index.contains_doi(d))
        || record.paper_id.as_deref().is_some_and(|id| index.contains_external_id(id))
        || index.contains_title(&record.title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::client::tests::test_client;
    use crate::error::Result;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tempfile::TempDir;

    fn paper(id: &str, title: &str, authors: &[&str]) -> LibraryPaper {
        LibraryPaper {
            id: id.to_string(),
            title: title.to_string(),
            authors: authors.iter().map(|a| a.to_string()).collect(),
            year: Some(2022),
            doi: Some(format!("10.1000/{}", id)),
            external_id: None,
        }
    }

    #[test]
    fn test_top_authors_ranking() {
        let library = vec![
            paper("1", "A", &["Grace Hopper", "Alan Turing"]),
            paper("2", "B", &["Alan Turing"]),
            paper("3", "C", &["Ada Lovelace", " "]),
            paper("4", "D", &["Grace Hopper"]),
        ];

        let top = top_authors(&library, 2);
        assert_eq!(
            top,
            vec![("Alan Turing".to_string(), 2), ("Grace Hopper".to_string(), 2)]
        );
        assert_eq!(top_authors(&library, 10).len(), 3);
    }

    #[test]
    fn test_authored_by_exact_match() {
        let authors = vec!["Alan M. Turing".to_string(), " alan turing".to_string()];
        assert!(authored_by(&authors, "Alan Turing"));
        assert!(!authored_by(&authors[..1], "Alan Turing"));
    }

    #[tokio::test]
    async fn test_detect_author_works() -> Result<()> {
        let library = vec![
            paper("1", "Computing Machinery and Intelligence", &["Alan Turing"]),
            paper("2", "On Computable Numbers", &["Alan Turing"]),
        ];

        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "Alan Turing".into()),
                Matcher::UrlEncoded("year".into(), "2023-".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"paperId": "n1", "title": "Morphogenesis Revisited", "authors": [{"name": "Alan Turing"}], "year": 2025, "citationCount": 50, "externalIds": {"DOI": "10.2000/new"}},
                    {"paperId": "n2", "title": "computing machinery and intelligence", "authors": [{"name": "Alan Turing"}], "year": 2024, "citationCount": 5000},
                    {"paperId": "n3", "title": "Someone Else Entirely", "authors": [{"name": "Alan Smith"}], "year": 2025, "citationCount": 10},
                    {"paperId": "n4", "title": "Older Follow-up Work", "authors": [{"name": "alan turing"}], "year": 2023, "citationCount": 400}
                ]})
                .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let candidates = AuthorGapDetector::new(&client, 2025)
            .with_author_delay(Duration::ZERO)
            .detect(&library, 2023, None)
            .await;

        mock.assert_async().await;
        assert_eq!(candidates.len(), 2);
        // 2025 / 50 cites: (0.5 + 1.0) / 2 = 0.75; 2023 / 400 cites: (1.0 + 0.6) / 2 = 0.8
        assert_eq!(candidates[0].title, "Older Follow-up Work");
        assert!((candidates[0].confidence - 0.8).abs() < 1e-9);
        assert_eq!(candidates[1].title, "Morphogenesis Revisited");
        assert!(candidates.iter().all(|c| c.priority == Priority::Medium));
        assert!(candidates.iter().all(|c| c.source_author() == Some("Alan Turing")));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_author_search_is_skipped() -> Result<()> {
        let library = vec![paper("1", "A paper", &["Grace Hopper"])];

        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let candidates = AuthorGapDetector::new(&client, 2025)
            .with_author_delay(Duration::ZERO)
            .detect(&library, 2023, Some(5))
            .await;

        assert!(candidates.is_empty());
        assert_eq!(client.stats().failures, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_coauthored_work_reported_once() -> Result<()> {
        let library = vec![
            paper("1", "A", &["Grace Hopper", "Alan Turing"]),
            paper("2", "B", &["Grace Hopper"]),
        ];

        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"title": "Shared Compiler Work", "authors": [{"name": "Grace Hopper"}, {"name": "Alan Turing"}], "year": 2024, "citationCount": 20}
                ]})
                .to_string(),
            )
            .expect(2)
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let candidates = AuthorGapDetector::new(&client, 2025)
            .with_author_delay(Duration::ZERO)
            .detect(&library, 2023, None)
            .await;

        mock.assert_async().await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key(), "title:shared compiler work");
        assert_eq!(candidates[0].source_author(), Some("Grace Hopper"));
        Ok(())
    }

    #[tokio::test]
    async fn test_library_doi_and_catalog_id_excluded() -> Result<()> {
        let mut held_by_id = paper("2", "Preprint Version", &["Alan Turing"]);
        held_by_id.doi = None;
        held_by_id.external_id = Some("S2-HELD".into());
        let library = vec![paper("1", "Published Version", &["Alan Turing"]), held_by_id];

        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"data": [
                    {"paperId": "x1", "title": "A Retitled Journal Version", "authors": [{"name": "Alan Turing"}], "year": 2024, "citationCount": 40, "externalIds": {"DOI": "10.1000/1"}},
                    {"paperId": "S2-HELD", "title": "Renamed Preprint", "authors": [{"name": "Alan Turing"}], "year": 2024, "citationCount": 40},
                    {"paperId": "x3", "title": "Genuinely New Work", "authors": [{"name": "Alan Turing"}], "year": 2024, "citationCount": 40}
                ]})
                .to_string(),
            )
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let candidates = AuthorGapDetector::new(&client, 2025)
            .with_author_delay(Duration::ZERO)
            .detect(&library, 2023, None)
            .await;

        let titles: Vec<&str> = candidates.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Genuinely New Work"]);
        assert!(candidates.iter().all(|c| c.doi.as_deref() != Some("10.1000/1")));
        assert!(candidates.iter().all(|c| c.paper_id.as_deref() != Some("S2-HELD")));
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupted_run_keeps_finished_searches() -> Result<()> {
        let library = vec![
            paper("1", "A", &["Grace Hopper"]),
            paper("2", "B", &["Grace Hopper", "Alan Turing"]),
        ];

        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/paper/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"data": []}).to_string())
            .create_async()
            .await;

        let dir = TempDir::new()?;
        let client = test_client(server.url(), &dir)?;
        let detector = AuthorGapDetector::new(&client, 2025).with_author_delay(Duration::from_secs(60));

        // Cancelled while pausing before the second author
        let run = tokio::time::timeout(Duration::from_secs(2), detector.detect(&library, 2023, None)).await;
        assert!(run.is_err());

        let saved = ResponseCache::load(dir.path().join("cache.json"), Duration::from_secs(3600));
        assert_eq!(saved.len(), 1);
        Ok(())
    }
}
