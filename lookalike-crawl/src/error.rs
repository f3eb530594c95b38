use lookalike_drivers::DriverError;
use lookalike_http::HttpError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop a crawl run.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Filesystem trouble (permissions, disk full). Not retried.
    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The browser session could not be opened or replaced.
    #[error("browser session unavailable: {0}")]
    Session(#[from] DriverError),

    #[error("http client setup failed: {0}")]
    Http(#[from] HttpError),
}

impl CrawlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrawlError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why one search came back without results. The image is skipped for this run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("timed out during {stage}: {source}")]
    Timeout {
        stage: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("browser failed during {stage}: {source}")]
    Session {
        stage: &'static str,
        #[source]
        source: DriverError,
    },

    #[error("cannot upload {}: {source}", path.display())]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ScrapeError {
    pub(crate) fn at(stage: &'static str) -> impl FnOnce(DriverError) -> ScrapeError {
        move |source| {
            if source.is_timeout() {
                ScrapeError::Timeout { stage, source }
            } else {
                ScrapeError::Session { stage, source }
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScrapeError::Timeout { .. })
    }

    /// A bad input file fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ScrapeError::InvalidPath { .. })
    }
}

/// Why a single URL was not saved. Never aborts sibling downloads.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
