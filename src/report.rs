//! Markdown report generation.
//!
//! [`render`] is a pure function of its inputs and the timestamp it is given,
//! so two renders of the same analysis differ only in the header line.

use crate::error::Result;
use crate::models::{GapCandidate, Priority};
use crate::topics::TopicGroup;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::info;

/// Entries shown on the dashboard
const DASHBOARD_SIZE: usize = 5;

/// Candidates listed per topic section
const TOPIC_TOP_N: usize = 10;

/// Identifiers listed inline per topic section
const TOPIC_ID_PREVIEW: usize = 20;

/// Citation count that earns the "highly cited" tag
const HIGHLY_CITED: u64 = 1000;

/// Basic facts about the analyzed library
#[derive(Debug, Clone, Default)]
pub struct LibrarySummary {
    pub paper_count: usize,
    pub author_count: usize,
    pub addressable_count: usize,
}

/// Everything the report is built from
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub citation: &'a [GapCandidate],
    pub author: &'a [GapCandidate],
    pub filtered_out: usize,
    pub topics: &'a [TopicGroup],
    pub library: &'a LibrarySummary,
    /// Year the recency tags are measured from
    pub current_year: i32,
}

/// Dashboard score: `10 × citing + impact / 100`.
pub fn dashboard_score(candidate: &GapCandidate) -> f64 {
    candidate.citing_papers().len() as f64 * 10.0 + candidate.impact as f64 / 100.0
}

fn rationale_tags(candidate: &GapCandidate, year_now: i32) -> Vec<String> {
    let mut tags = Vec::new();
    let citing = candidate.citing_papers().len();
    if citing > 0 {
        tags.push(format!("cited by {} library papers", citing));
    }
    if let Some(author) = candidate.source_author() {
        tags.push(format!("by {}", author));
    }
    if candidate.impact >= HIGHLY_CITED {
        tags.push("highly cited".to_string());
    }
    match candidate.year {
        Some(y) if y >= year_now - 2 => tags.push("recent".to_string()),
        Some(y) if y <= year_now - 15 && candidate.impact >= HIGHLY_CITED => {
            tags.push("foundational".to_string())
        }
        _ => {}
    }
    tags
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", cut.trim_end())
}

fn author_list(authors: &[String]) -> String {
    match authors.len() {
        0 => "Unknown authors".to_string(),
        1..=3 => authors.join(", "),
        _ => format!("{} et al.", authors[..3].join(", ")),
    }
}

fn year_text(year: Option<i32>) -> String {
    year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string())
}

fn id_block(out: &mut String, ids: &[String]) {
    if ids.is_empty() {
        out.push_str("_No importable identifiers._\n\n");
        return;
    }
    out.push_str("```text\n");
    for id in ids {
        out.push_str(id);
        out.push('\n');
    }
    out.push_str("```\n\n");
}

fn identifiers<'c>(candidates: impl IntoIterator<Item = &'c GapCandidate>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter_map(GapCandidate::import_identifier)
        .filter(|id| seen.insert(id.to_lowercase()))
        .collect()
}

/// Topics ordered by average impact (desc), then name.
fn sorted_topics<'t>(topics: &'t [TopicGroup]) -> Vec<&'t TopicGroup> {
    let mut sorted: Vec<&TopicGroup> = topics.iter().collect();
    sorted.sort_by(|a, b| {
        b.average_impact()
            .partial_cmp(&a.average_impact())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    sorted
}

/// Render the full report.
pub fn render(input: &ReportInput<'_>, generated_at: DateTime<Local>) -> String {
    let year_now = input.current_year;
    let mut out = String::new();

    out.push_str("# Literature Gap Analysis\n\n");
    out.push_str(&format!("Generated: {}\n\n", generated_at.format("%Y-%m-%d %H:%M")));
    out.push_str(&format!(
        "- Library papers analyzed: {} ({} addressable, {} distinct authors)\n",
        input.library.paper_count, input.library.addressable_count, input.library.author_count
    ));
    out.push_str(&format!("- Citation-network gaps: {}\n", input.citation.len()));
    out.push_str(&format!(
        "- Author-network gaps: {} ({} removed by quality filter)\n\n",
        input.author.len(),
        input.filtered_out
    ));

    render_dashboard(&mut out, input, year_now);
    render_topics(&mut out, input);
    render_author_section(&mut out, input);
    render_appendix(&mut out, input);
    render_import_lists(&mut out, input);

    out
}

fn render_dashboard(out: &mut String, input: &ReportInput<'_>, year_now: i32) {
    out.push_str("## Priority Dashboard\n\n");

    let mut picks: Vec<&GapCandidate> = input.citation.iter().collect();
    picks.sort_by(|a, b| {
        dashboard_score(b)
            .partial_cmp(&dashboard_score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    picks.truncate(DASHBOARD_SIZE);

    if picks.len() < DASHBOARD_SIZE {
        let mut fill: Vec<&GapCandidate> = input.author.iter().collect();
        fill.sort_by(|a, b| {
            dashboard_score(b)
                .partial_cmp(&dashboard_score(a))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.title.cmp(&b.title))
        });
        picks.extend(fill.into_iter().take(DASHBOARD_SIZE - picks.len()));
    }

    if picks.is_empty() {
        out.push_str("_No candidates found._\n\n");
        return;
    }

    out.push_str("| # | Title | Year | Score | Why |\n|---|---|---|---|---|\n");
    for (i, candidate) in picks.iter().enumerate() {
        out.push_str(&format!(
            "| {} | {} | {} | {:.1} | {} |\n",
            i + 1,
            escape(&truncate(&candidate.title, 80)),
            year_text(candidate.year),
            dashboard_score(candidate),
            escape(&rationale_tags(candidate, year_now).join(", "))
        ));
    }
    out.push('\n');
}

fn render_topics(out: &mut String, input: &ReportInput<'_>) {
    out.push_str("## Citation-Network Gaps by Topic\n\n");
    if input.topics.is_empty() {
        out.push_str("_No citation-network gaps._\n\n");
        return;
    }

    for group in sorted_topics(input.topics) {
        out.push_str(&format!(
            "### {} ({} papers, avg. {:.0} citations)\n\n",
            group.name,
            group.candidates.len(),
            group.average_impact()
        ));
        out.push_str("| Title | Year | Citations | Cited by | Confidence | Priority |\n|---|---|---|---|---|---|\n");
        for candidate in group.candidates.iter().take(TOPIC_TOP_N) {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {:.2} | {} |\n",
                escape(&truncate(&candidate.title, 90)),
                year_text(candidate.year),
                candidate.impact,
                candidate.citing_papers().len(),
                candidate.confidence,
                candidate.priority
            ));
        }
        out.push('\n');

        let ids = identifiers(&group.candidates);
        if !ids.is_empty() {
            let shown: Vec<String> = ids.iter().take(TOPIC_ID_PREVIEW).map(|id| format!("`{}`", id)).collect();
            out.push_str(&format!("Identifiers: {}", shown.join(", ")));
            if ids.len() > TOPIC_ID_PREVIEW {
                out.push_str(&format!(" (+{} more)", ids.len() - TOPIC_ID_PREVIEW));
            }
            out.push_str("\n\n");
        }
    }
}

fn render_author_section(out: &mut String, input: &ReportInput<'_>) {
    out.push_str("## Author-Network Gaps\n\n");
    out.push_str(&format!(
        "{} candidates after quality filtering; {} removed.\n\n",
        input.author.len(),
        input.filtered_out
    ));
    if input.author.is_empty() {
        return;
    }

    out.push_str("| Title | Author | Year | Citations | Confidence | Priority |\n|---|---|---|---|---|---|\n");
    for candidate in input.author {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {:.2} | {} |\n",
            escape(&truncate(&candidate.title, 90)),
            escape(candidate.source_author().unwrap_or("")),
            year_text(candidate.year),
            candidate.impact,
            candidate.confidence,
            candidate.priority
        ));
    }
    out.push('\n');
}

fn render_appendix(out: &mut String, input: &ReportInput<'_>) {
    out.push_str("## Appendix: Full Reference List\n\n");

    for tier in [Priority::High, Priority::Medium, Priority::Low] {
        let members: Vec<&GapCandidate> = input
            .citation
            .iter()
            .chain(input.author.iter())
            .filter(|c| c.priority == tier)
            .collect();

        out.push_str(&format!("### {} priority ({})\n\n", tier, members.len()));
        for candidate in members {
            let mut line = format!(
                "- {} ({}). {}.",
                escape(&candidate.title),
                year_text(candidate.year),
                author_list(&candidate.authors)
            );
            if let Some(venue) = &candidate.venue {
                line.push_str(&format!(" *{}*.", venue));
            }
            if let Some(id) = candidate.import_identifier() {
                line.push_str(&format!(" `{}`", id));
            }
            line.push_str(&format!(" (confidence {:.2})\n", candidate.confidence));
            out.push_str(&line);
        }
        out.push('\n');
    }
}

fn render_import_lists(out: &mut String, input: &ReportInput<'_>) {
    out.push_str("## Import Lists\n\n");

    out.push_str("### Top tier (HIGH priority)\n\n");
    id_block(out, &identifiers(input.citation.iter().filter(|c| c.priority == Priority::High)));

    for group in sorted_topics(input.topics) {
        out.push_str(&format!("### Topic: {}\n\n", group.name));
        id_block(out, &identifiers(&group.candidates));
    }

    out.push_str("### Author network\n\n");
    id_block(out, &identifiers(input.author));
}

/// `gap_analysis_YYYY-MM-DD_HHMM.md`
pub fn report_file_name(at: DateTime<Local>) -> String {
    format!("gap_analysis_{}.md", at.format("%Y-%m-%d_%H%M"))
}

/// Write the report into `dir`, returning its path.
pub fn write_report(dir: &Path, content: &str, at: DateTime<Local>) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(report_file_name(at));
    std::fs::write(&path, content)?;
    info!(path = %path.display(), bytes = content.len(), "Report written");
    Ok(path)
}
