//! gapscholar - Literature Gap Analysis
//!
//! Finds papers that a curated library cites heavily, or that its most
//! frequent authors published recently, but that the library does not hold.
//!
//! ## Usage
//!
//! ```bash
//! gapscholar analyze library.json --min-citations 50 --year-from 2023
//! gapscholar cache stats
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gapscholar::cache::ResponseCache;
use gapscholar::client::ApiClient;
use gapscholar::config::{AnalysisOptions, ClientConfig};
use gapscholar::{engine, export, library};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Literature Gap Analysis - citation and author network discovery
#[derive(Parser)]
#[command(name = "gapscholar")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Cache file (default: ~/.gapscholar_cache.json or $GAPSCHOLAR_CACHE)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a library snapshot and write a gap report
    Analyze {
        /// Library snapshot (.json array or .csv)
        library: PathBuf,

        /// Minimum external citations for citation-network gaps
        #[arg(long, default_value = "50")]
        min_citations: u64,

        /// Earliest publication year for author-network gaps (default: current year - 2)
        #[arg(long)]
        year_from: Option<i32>,

        /// Results per algorithm
        #[arg(long)]
        limit: Option<usize>,

        /// Library papers that must cite a candidate
        #[arg(long, default_value = "2")]
        min_connections: usize,

        /// Most frequent library authors to search
        #[arg(long, default_value = "10")]
        top_authors: usize,

        /// Semantic Scholar API key (or $SEMANTIC_SCHOLAR_API_KEY)
        #[arg(long)]
        api_key: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Skip CSV exports of the candidate sets
        #[arg(long)]
        no_csv: bool,
    },

    /// Manage the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache file path
    Path,
    /// Delete the cache file
    Clear,
    /// Show cache size and age
    Stats,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let mut config = ClientConfig::from_env();
    if let Some(path) = cli.cache {
        config.cache_path = path;
    }

    match cli.command {
        Commands::Analyze {
            library,
            min_citations,
            year_from,
            limit,
            min_connections,
            top_authors,
            api_key,
            output,
            no_csv,
        } => {
            if api_key.is_some() {
                config.api_key = api_key;
            }
            let mut options = AnalysisOptions {
                min_citations,
                limit,
                min_connections,
                top_authors,
                ..Default::default()
            };
            if let Some(year) = year_from {
                options.year_from = year;
            }
            run_analysis(config, library, options, output, !no_csv).await
        }
        Commands::Cache { action } => handle_cache(action, &config),
    }
}

// ============================================================================
// Analysis
// ============================================================================

async fn run_analysis(
    config: ClientConfig,
    library_path: PathBuf,
    options: AnalysisOptions,
    output_dir: PathBuf,
    write_csv: bool,
) -> Result<()> {
    let papers = library::load_snapshot(&library_path)
        .with_context(|| format!("Failed to load library snapshot {}", library_path.display()))?;
    println!("Library: {} papers", papers.len());

    let client = ApiClient::from_config(config).context("Failed to build API client")?;
    info!(cache_entries = client.cache_len(), "API client ready");

    println!("\n--- Citation & author network analysis ---");
    let analysis = engine::run_gap_analysis(&client, &papers, &options)
        .await
        .context("Gap analysis failed")?;

    let stats = &analysis.citation_stats;
    println!(
        "Citation network: {} gaps ({} references scanned, {} papers without identifiers)",
        analysis.citation_gaps.len(),
        stats.references_seen,
        stats.unaddressable
    );
    println!(
        "Author network: {} gaps ({} found, {} removed by quality filter)",
        analysis.author_gaps.len(),
        analysis.author_raw_count,
        analysis.filter.removed
    );
    for (reason, count) in &analysis.filter.reasons {
        println!("  - {}: {}", reason.label(), count);
    }
    println!("Topics: {}", analysis.topics.len());

    let report_path = analysis
        .write_report(&output_dir)
        .context("Failed to write report")?;
    println!("\nReport: {}", report_path.display());

    if write_csv {
        let stamp = analysis.generated_at.format("%Y-%m-%d_%H%M");
        for (name, set) in [
            ("citation_gaps", &analysis.citation_gaps),
            ("author_gaps", &analysis.author_gaps),
        ] {
            let path = output_dir.join(format!("{}_{}.csv", name, stamp));
            if let Some(saved) = export::save_candidates(&path, set).context("Failed to write CSV")? {
                println!("Saved: {}", saved.display());
            }
        }
    }

    let client_stats = analysis.client_stats;
    println!(
        "API: {} network calls, {} cache hits, {} failures",
        client_stats.network_calls, client_stats.cache_hits, client_stats.failures
    );
    Ok(())
}

// ============================================================================
// Cache Management
// ============================================================================

fn handle_cache(action: CacheAction, config: &ClientConfig) -> Result<()> {
    let path = &config.cache_path;
    match action {
        CacheAction::Path => {
            println!("{}", path.display());
        }
        CacheAction::Clear => {
            if path.exists() {
                std::fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                println!("Cleared cache at {}", path.display());
            } else {
                println!("No cache at {}", path.display());
            }
        }
        CacheAction::Stats => {
            let cache = ResponseCache::load(path.clone(), config.cache_ttl);
            let age = chrono::Utc::now() - cache.created_at();
            println!("Cache: {}", path.display());
            println!("Entries: {}", cache.len());
            println!(
                "Created: {} ({} days old, expires after {} days)",
                cache.created_at().format("%Y-%m-%d %H:%M"),
                age.num_days(),
                config.cache_ttl.as_secs() / 86_400
            );
        }
    }
    Ok(())
}
