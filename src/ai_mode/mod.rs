//! Answer extraction from AI-mode result pages
//!
//! Drives one browser page through challenge and availability checks, waits
//! for the streamed answer to finish, pulls citations out of the live DOM and
//! renders the answer as Markdown with numbered footnotes.
//!
//! # Architecture
//! - `config` - Phrase tables, selectors and timings
//! - `types` - Data structures shared by the stages
//! - `challenge` / `availability` - Pre-flight page checks
//! - `completion` - Deadline-bounded completion cascade
//! - `citations` - In-page citation marking and source capture
//! - `transform` - HTML to footnoted Markdown
//! - `orchestrator` - Stage sequencing and session lifecycle
//!
//! # Usage
//! ```no_run
//! use ai_mode_search::{ai_mode, load_yaml_config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_yaml_config()?;
//!     let result = ai_mode::run(&config, "rust async runtimes").await;
//!     println!("{}", serde_json::to_string_pretty(&result.to_json())?);
//!     std::process::exit(result.exit_code());
//! }
//! ```

mod availability;
mod challenge;
mod citations;
mod completion;
mod config;
mod error;
mod orchestrator;
mod transform;
mod types;

pub use availability::AvailabilityChecker;
pub use challenge::ChallengeDetector;
pub use citations::{CitationExtractor, Extraction, SourceFilter};
pub use completion::{CompletionReport, CompletionSignal, CompletionState, CompletionWaiter};
pub use config::{PhraseTables, ScrapeConfig, SelectorConfig, TimingConfig};
pub use error::ScrapeError;
pub use orchestrator::{Scraper, run, scrape_and_stop};
pub use transform::{ContentTransformer, Rendered, embed_citations, sources_section};
pub use types::{
    CitationGroup, DetectionLayer, DetectionSignal, ErrorKind, ScrapeFailure, ScrapeRequest,
    ScrapeResult, ScrapeSuccess, Source, marker_token,
};
