//! Reverse-image-search crawl pipeline.
//!
//! For every `<category>/<image>` under an input root, the crawl uploads the
//! image to a visual-search page, collects the candidate image URLs and
//! downloads them into `<output>/<category>/<image-stem>/<n>.jpg`.
//!
//! - [`cache::DedupCache`]: run-wide set of URLs already fetched
//! - [`download::Downloader`]: bounded fan-out fetcher with idempotent writes
//! - [`scrape::ResultScraper`]: upload → wait → scroll → extract on one browser session
//! - [`traverse::TraversalController`]: resumable walk over the category tree
pub mod cache;
pub mod download;
pub mod error;
pub mod scrape;
pub mod traverse;

pub use cache::DedupCache;
pub use download::{DownloadOutcome, DownloadReport, DownloadTask, Downloader};
pub use error::{CrawlError, FetchFailure, ScrapeError};
pub use scrape::{CandidateUrl, ProviderSelectors, ResultScraper, ScrapeSettings};
pub use traverse::{RunSummary, SourceImage, TraversalController};
