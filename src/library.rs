//! Read-only snapshot of the curated paper library.
//!
//! The library itself is built elsewhere; this module only reads an exported
//! snapshot (JSON array or CSV) into [`LibraryPaper`] values.

use crate::error::{GapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// A paper already present in the library.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryPaper {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default)]
    pub year: Option<i32>,
    /// Persistent identifier (DOI)
    #[serde(default)]
    pub doi: Option<String>,
    /// External-catalog identifier (Semantic Scholar paper id)
    #[serde(default, alias = "s2_id", alias = "paper_id")]
    pub external_id: Option<String>,
}

/// Flat CSV row; authors are `;`-separated.
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default)]
    year: Option<i32>,
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    external_id: Option<String>,
}

impl From<CsvRow> for LibraryPaper {
    fn from(row: CsvRow) -> Self {
        let authors = row
            .authors
            .split(';')
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        LibraryPaper {
            id: row.id,
            title: row.title,
            authors,
            year: row.year,
            doi: row.doi.filter(|d| !d.trim().is_empty()),
            external_id: row.external_id.filter(|s| !s.trim().is_empty()),
        }
    }
}

/// Load a library snapshot. `.csv` files are read as CSV, anything else as JSON.
pub fn load_snapshot(path: &Path) -> Result<Vec<LibraryPaper>> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    let papers = if is_csv {
        let mut reader = csv::Reader::from_path(path)?;
        let mut papers = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            papers.push(LibraryPaper::from(row?));
        }
        papers
    } else {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str::<Vec<LibraryPaper>>(&content)?
    };

    let papers = drop_duplicate_ids(papers)?;
    info!(count = papers.len(), path = %path.display(), "Loaded library snapshot");
    Ok(papers)
}

/// Papers must carry a unique, non-empty id; repeats keep the first entry.
fn drop_duplicate_ids(papers: Vec<LibraryPaper>) -> Result<Vec<LibraryPaper>> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(papers.len());

    for paper in papers {
        if paper.id.trim().is_empty() {
            return Err(GapError::Parse(format!(
                "Library paper without id: {:?}",
                paper.title
            )));
        }
        if seen.insert(paper.id.clone()) {
            kept.push(paper);
        } else {
            debug!(id = %paper.id, "Skipping duplicate library id");
        }
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    #[test]
    fn test_load_json_snapshot() -> Result<()> {
        let mut file = Builder::new().suffix(".json").tempfile()?;
        write!(
            file,
            r#"[
                {{"id": "p1", "title": "Deep Residual Learning", "authors": ["Kaiming He"], "year": 2016, "doi": "10.1109/CVPR.2016.90"}},
                {{"id": "p2", "title": "No DOI Paper", "s2_id": "abc123"}},
                {{"id": "p1", "title": "Duplicate"}}
            ]"#
        )?;

        let papers = load_snapshot(file.path())?;
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].authors, vec!["Kaiming He".to_string()]);
        assert_eq!(papers[1].external_id.as_deref(), Some("abc123"));
        assert!(papers[1].doi.is_none());
        Ok(())
    }

    #[test]
    fn test_load_csv_snapshot() -> Result<()> {
        let mut file = Builder::new().suffix(".csv").tempfile()?;
        writeln!(file, "id,title,authors,year,doi,external_id")?;
        writeln!(file, "a,First Paper,Ada Lovelace; Alan Turing,1950,10.1000/xyz,")?;
        writeln!(file, "b,Second Paper,,,,s2-b")?;

        let papers = load_snapshot(file.path())?;
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].authors.len(), 2);
        assert_eq!(papers[0].authors[1], "Alan Turing");
        assert_eq!(papers[0].year, Some(1950));
        assert!(papers[0].external_id.is_none());
        assert!(papers[1].doi.is_none());
        assert_eq!(papers[1].external_id.as_deref(), Some("s2-b"));
        Ok(())
    }

    #[test]
    fn test_missing_id_rejected() -> Result<()> {
        let mut file = Builder::new().suffix(".json").tempfile()?;
        write!(file, r#"[{{"id": " ", "title": "Anonymous"}}]"#)?;
        assert!(matches!(load_snapshot(file.path()), Err(GapError::Parse(_))));
        Ok(())
    }
}
