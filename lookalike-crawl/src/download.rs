//! Concurrent, idempotent download of candidate URLs into numbered files.
//!
//! Ordinal `i` (1-based, input order) always maps to `{dest}/{i}.jpg`. Skips
//! are decided in input order before any request goes out, so the first
//! occurrence of a repeated URL is the one that gets fetched. Only the
//! fetch+write step runs concurrently, bounded by the worker budget.

use crate::cache::DedupCache;
use crate::error::{CrawlError, FetchFailure};
use crate::scrape::CandidateUrl;
use futures::stream::{self, StreamExt};
use lookalike_config::DownloadSettings;
use lookalike_http::{HttpClient, RequestOpts};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// One URL bound to its output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub ordinal: usize,
    pub target: PathBuf,
}

impl DownloadTask {
    pub fn new(url: &str, ordinal: usize, destination: &Path) -> Self {
        Self {
            url: url.to_string(),
            ordinal,
            target: destination.join(format!("{ordinal}.jpg")),
        }
    }
}

#[derive(Debug)]
pub enum DownloadOutcome {
    Saved { bytes: usize },
    /// The target file existed before this call; no request was made.
    AlreadyPresent,
    /// The URL was already fetched (or claimed) during this run; no request was made.
    Duplicate,
    Failed(FetchFailure),
}

impl DownloadOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, DownloadOutcome::Saved { .. })
    }
}

/// Per-URL results in ordinal order.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub entries: Vec<(DownloadTask, DownloadOutcome)>,
}

impl DownloadReport {
    fn count(&self, pred: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.entries.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn saved(&self) -> usize {
        self.count(DownloadOutcome::is_saved)
    }

    pub fn already_present(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::AlreadyPresent))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Duplicate))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed(_)))
    }

    pub fn outcome_for(&self, ordinal: usize) -> Option<&DownloadOutcome> {
        self.entries
            .iter()
            .find(|(task, _)| task.ordinal == ordinal)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Debug, Clone)]
pub struct Downloader {
    http: HttpClient,
    cache: DedupCache,
    workers: usize,
}

impl Downloader {
    pub fn new(http: HttpClient, cache: DedupCache, workers: usize) -> Self {
        Self {
            http,
            cache,
            workers: workers.max(1),
        }
    }

    /// Build the HTTP client from configuration and share `cache`.
    pub fn from_settings(settings: &DownloadSettings, cache: DedupCache) -> Result<Self, CrawlError> {
        let http = HttpClient::new()?
            .with_max_attempts(settings.max_attempts)
            .with_backoff(settings.backoff())
            .with_timeout(settings.request_timeout())
            .with_user_agent(&settings.user_agent)?;
        Ok(Self::new(http, cache, settings.workers))
    }

    pub fn cache(&self) -> &DedupCache {
        &self.cache
    }

    /// Fetch every URL at most once into `destination`, returning one outcome
    /// per URL. Individual fetch failures are reported, not raised; a
    /// filesystem failure is raised once every in-flight task has finished.
    pub async fn download(
        &self,
        urls: &[String],
        destination: &Path,
    ) -> Result<DownloadReport, CrawlError> {
        let tasks = urls
            .iter()
            .enumerate()
            .map(|(index, url)| DownloadTask::new(url, index + 1, destination))
            .collect();
        self.run_tasks(tasks, destination).await
    }

    /// Like [`Downloader::download`], but each file is named after the rank
    /// the scraper gave its URL.
    pub async fn download_candidates(
        &self,
        candidates: &[CandidateUrl],
        destination: &Path,
    ) -> Result<DownloadReport, CrawlError> {
        let tasks = candidates
            .iter()
            .map(|c| DownloadTask::new(&c.url, c.ordinal, destination))
            .collect();
        self.run_tasks(tasks, destination).await
    }

    async fn run_tasks(
        &self,
        tasks: Vec<DownloadTask>,
        destination: &Path,
    ) -> Result<DownloadReport, CrawlError> {
        fs::create_dir_all(destination)
            .await
            .map_err(|e| CrawlError::io(destination, e))?;

        let requested = tasks.len();
        let mut entries: Vec<(DownloadTask, Option<DownloadOutcome>)> =
            Vec::with_capacity(requested);
        let mut pending = Vec::new();

        for (index, task) in tasks.into_iter().enumerate() {
            let url = task.url.as_str();
            let exists = fs::try_exists(&task.target)
                .await
                .map_err(|e| CrawlError::io(&task.target, e))?;
            let outcome = if exists {
                debug!(target: "crawl.download", ordinal = task.ordinal, "target exists; skipping");
                Some(DownloadOutcome::AlreadyPresent)
            } else if !self.cache.try_claim(url) {
                debug!(target: "crawl.download", ordinal = task.ordinal, %url, "duplicate url; skipping");
                Some(DownloadOutcome::Duplicate)
            } else {
                pending.push((index, task.clone()));
                None
            };
            entries.push((task, outcome));
        }

        let fetched: Vec<(usize, DownloadOutcome)> = stream::iter(pending)
            .map(|(index, task)| async move { (index, self.fetch(&task).await) })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        for (index, outcome) in fetched {
            entries[index].1 = Some(outcome);
        }

        let mut report = DownloadReport::default();
        let mut write_error = None;
        for (task, outcome) in entries {
            let outcome = match outcome {
                Some(DownloadOutcome::Failed(FetchFailure::Write { path, source })) => {
                    if write_error.is_none() {
                        write_error = Some(CrawlError::io(path, source));
                    }
                    continue;
                }
                Some(outcome) => outcome,
                None => continue,
            };
            report.entries.push((task, outcome));
        }
        if let Some(err) = write_error {
            return Err(err);
        }

        info!(
            target: "crawl.download",
            destination = %destination.display(),
            requested,
            saved = report.saved(),
            already_present = report.already_present(),
            duplicates = report.duplicates(),
            failed = report.failed(),
            "downloads finished"
        );
        Ok(report)
    }

    async fn fetch(&self, task: &DownloadTask) -> DownloadOutcome {
        let body = match self.http.get_bytes(&task.url, RequestOpts::default()).await {
            Ok(body) => body,
            Err(err) => {
                self.cache.release(&task.url);
                warn!(
                    target: "crawl.download",
                    url = %task.url,
                    ordinal = task.ordinal,
                    attempts = err.attempts(),
                    transient = err.is_transient(),
                    error = %err,
                    "download failed"
                );
                return DownloadOutcome::Failed(err.into());
            }
        };

        match write_atomically(&task.target, &body).await {
            Ok(()) => {
                self.cache.mark(&task.url);
                DownloadOutcome::Saved { bytes: body.len() }
            }
            Err(source) => {
                self.cache.release(&task.url);
                warn!(
                    target: "crawl.download",
                    target_path = %task.target.display(),
                    error = %source,
                    "write failed"
                );
                DownloadOutcome::Failed(FetchFailure::Write {
                    path: task.target.clone(),
                    source,
                })
            }
        }
    }
}

/// Write `bytes` to a hidden sibling temp file, flush it, then rename it onto
/// `target`, so a crash never leaves a truncated `{n}.jpg` behind.
async fn write_atomically(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(".{name}.{}.part", uuid::Uuid::new_v4().simple()));

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, target).await
    }
    .await;

    if result.is_err() {
        let _ = fs::remove_file(&tmp).await;
    }
    result
}
