//! Resumable walk over `<input>/<category>/<image>`.
//!
//! One browser session serves the whole run and is closed on every exit
//! path. An image whose output folder already exists is treated as done, so
//! an interrupted run can simply be started again.

use crate::download::Downloader;
use crate::error::{CrawlError, ScrapeError};
use crate::scrape::ResultScraper;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use lookalike_common::natord;
use lookalike_drivers::{BrowserSession, SessionFactory};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One input image and the folder its lookalikes go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub category: String,
    pub file_name: String,
    pub path: PathBuf,
    pub output_dir: PathBuf,
}

impl SourceImage {
    fn new(category: &str, file_name: &str, input_root: &Path, output_root: &Path) -> Self {
        let path = input_root.join(category).join(file_name);
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        Self {
            category: category.to_string(),
            file_name: file_name.to_string(),
            path,
            output_dir: output_root.join(category).join(stem),
        }
    }
}

/// End-of-run tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub categories: usize,
    pub images_seen: usize,
    pub skipped_existing: usize,
    pub searched: usize,
    pub no_results: usize,
    pub scrape_failures: usize,
    pub files_saved: usize,
    pub already_present: usize,
    pub duplicates: usize,
    pub download_failures: usize,
    pub sessions_recreated: usize,
    pub interrupted: bool,
}

pub struct TraversalController {
    input_root: PathBuf,
    output_root: PathBuf,
    scraper: ResultScraper,
    downloader: Downloader,
    factory: Arc<dyn SessionFactory>,
    search_attempts: u32,
    recreate_unhealthy_session: bool,
    progress: bool,
    cancel: CancellationToken,
}

impl TraversalController {
    pub fn new(
        input_root: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        scraper: ResultScraper,
        downloader: Downloader,
        factory: Arc<dyn SessionFactory>,
    ) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            scraper,
            downloader,
            factory,
            search_attempts: 3,
            recreate_unhealthy_session: true,
            progress: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Searches per image before it is left for the next run (at least one).
    pub fn with_search_attempts(mut self, attempts: u32) -> Self {
        self.search_attempts = attempts.max(1);
        self
    }

    pub fn with_session_recreation(mut self, enabled: bool) -> Self {
        self.recreate_unhealthy_session = enabled;
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.progress = enabled;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run before the next image when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// List categories and their images, both in natural order.
    pub async fn discover(&self) -> Result<Vec<(String, Vec<SourceImage>)>, CrawlError> {
        let categories = list_names(&self.input_root, EntryKind::Dir).await?;
        let mut tree = Vec::with_capacity(categories.len());
        for category in categories {
            let dir = self.input_root.join(&category);
            let images = list_names(&dir, EntryKind::File)
                .await?
                .into_iter()
                .map(|name| SourceImage::new(&category, &name, &self.input_root, &self.output_root))
                .collect();
            tree.push((category, images));
        }
        Ok(tree)
    }

    pub async fn run(&self) -> Result<RunSummary, CrawlError> {
        let tree = self.discover().await?;
        let mut summary = RunSummary {
            categories: tree.len(),
            ..RunSummary::default()
        };

        let mut session = self.factory.open().await?;
        let result = self.traverse(&tree, &mut session, &mut summary).await;
        if let Err(err) = session.close().await {
            warn!(target: "crawl.traverse", error = %err, "closing browser session failed");
        }
        result?;

        info!(
            target: "crawl.traverse",
            categories = summary.categories,
            images_seen = summary.images_seen,
            skipped_existing = summary.skipped_existing,
            searched = summary.searched,
            no_results = summary.no_results,
            scrape_failures = summary.scrape_failures,
            files_saved = summary.files_saved,
            already_present = summary.already_present,
            duplicates = summary.duplicates,
            download_failures = summary.download_failures,
            sessions_recreated = summary.sessions_recreated,
            interrupted = summary.interrupted,
            "crawl finished"
        );
        Ok(summary)
    }

    async fn traverse(
        &self,
        tree: &[(String, Vec<SourceImage>)],
        session: &mut Box<dyn BrowserSession>,
        summary: &mut RunSummary,
    ) -> Result<(), CrawlError> {
        let bars = MultiProgress::new();
        let category_bar = self.bar(&bars, tree.len(), "categories");

        for (category, images) in tree {
            let image_bar = self.bar(&bars, images.len(), category);
            for image in images {
                if self.cancel.is_cancelled() {
                    summary.interrupted = true;
                    info!(target: "crawl.traverse", "cancelled; stopping before next image");
                    image_bar.abandon();
                    category_bar.abandon();
                    return Ok(());
                }
                summary.images_seen += 1;
                self.process(image, session, summary).await?;
                image_bar.inc(1);
            }
            image_bar.finish_and_clear();
            category_bar.inc(1);
        }
        category_bar.finish();
        Ok(())
    }

    async fn process(
        &self,
        image: &SourceImage,
        session: &mut Box<dyn BrowserSession>,
        summary: &mut RunSummary,
    ) -> Result<(), CrawlError> {
        let exists = fs::try_exists(&image.output_dir)
            .await
            .map_err(|e| CrawlError::io(&image.output_dir, e))?;
        if exists {
            summary.skipped_existing += 1;
            debug!(
                target: "crawl.traverse",
                category = %image.category,
                image = %image.file_name,
                "output exists; skipping"
            );
            return Ok(());
        }

        summary.searched += 1;
        let mut attempt = 1;
        let candidates = loop {
            let err = match self.scraper.search(&image.path, &mut **session).await {
                Ok(candidates) => break candidates,
                Err(err) => err,
            };
            self.check_session(&err, session, summary).await?;
            if attempt >= self.search_attempts || !err.is_retryable() || self.cancel.is_cancelled() {
                summary.scrape_failures += 1;
                warn!(
                    target: "crawl.scrape_failure",
                    category = %image.category,
                    image = %image.file_name,
                    attempts = attempt,
                    timeout = err.is_timeout(),
                    error = %err,
                    "search failed; image left for the next run"
                );
                return Ok(());
            }
            debug!(
                target: "crawl.traverse",
                image = %image.file_name,
                attempt,
                error = %err,
                "search failed; retrying"
            );
            attempt += 1;
        };

        if candidates.is_empty() {
            summary.no_results += 1;
            info!(
                target: "crawl.no_results",
                category = %image.category,
                image = %image.file_name,
                "search returned no usable results"
            );
        }

        let report = self
            .downloader
            .download_candidates(&candidates, &image.output_dir)
            .await?;
        summary.files_saved += report.saved();
        summary.already_present += report.already_present();
        summary.duplicates += report.duplicates();
        summary.download_failures += report.failed();
        Ok(())
    }

    /// After a failed search, replace the session if it no longer answers.
    async fn check_session(
        &self,
        cause: &ScrapeError,
        session: &mut Box<dyn BrowserSession>,
        summary: &mut RunSummary,
    ) -> Result<(), CrawlError> {
        if !self.recreate_unhealthy_session || session.is_alive().await {
            return Ok(());
        }
        warn!(target: "crawl.traverse", cause = %cause, "browser session unresponsive; reopening");
        if let Err(err) = session.close().await {
            debug!(target: "crawl.traverse", error = %err, "closing dead session failed");
        }
        *session = self.factory.open().await?;
        summary.sessions_recreated += 1;
        Ok(())
    }

    fn bar(&self, bars: &MultiProgress, len: usize, label: &str) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let bar = bars.add(ProgressBar::new(len as u64));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:>16} [{bar:40.cyan/blue}] {pos}/{len} {elapsed_precise}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_prefix(label.to_string());
        bar
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

/// Names of the entries of `kind` directly under `dir`, in natural order.
async fn list_names(dir: &Path, kind: EntryKind) -> Result<Vec<String>, CrawlError> {
    let mut entries = fs::read_dir(dir).await.map_err(|e| CrawlError::io(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| CrawlError::io(dir, e))? {
        let path = entry.path();
        let meta = match fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(err) => {
                warn!(target: "crawl.traverse", path = %path.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let wanted = match kind {
            EntryKind::Dir => meta.is_dir(),
            EntryKind::File => meta.is_file(),
        };
        if !wanted {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => warn!(target: "crawl.traverse", name = ?raw, "skipping non UTF-8 entry"),
        }
    }
    natord::sort_natural(&mut names, |s| s.as_str());
    Ok(names)
}
