//! # gapscholar
//!
//! Literature gap analysis for a curated paper library.
//!
//! ## Modules
//!
//! - [`client`] - Rate-limited, cached API client
//! - [`citation`] - Citation-network gap detection
//! - [`author`] - Author-network gap detection
//! - [`quality`] - Quality filter for author-network candidates
//! - [`topics`] - Keyword topic classifier
//! - [`report`] - Markdown report builder
//! - [`engine`] - Orchestration of a full run
//!
//! ## Usage
//!
//! ```rust,no_run
//! use gapscholar::{client::ApiClient, config::{AnalysisOptions, ClientConfig}, engine, library};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let papers = library::load_snapshot("library.json".as_ref())?;
//!     let client = ApiClient::from_config(ClientConfig::from_env())?;
//!     let analysis = engine::run_gap_analysis(&client, &papers, &AnalysisOptions::default()).await?;
//!     println!("Found {} citation gaps", analysis.citation_gaps.len());
//!     Ok(())
//! }
//! ```

pub mod author;
pub mod cache;
pub mod citation;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod library;
pub mod models;
pub mod quality;
pub mod rate_limit;
pub mod report;
pub mod semanticscholar;
pub mod topics;

pub use error::{GapError, Result};
