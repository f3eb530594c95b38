#![allow(dead_code)]

use async_trait::async_trait;
use lookalike_common::observability::{LogConfig, LogFormat};
use lookalike_crawl::ScrapeSettings;
use lookalike_drivers::{BrowserSession, DriverError, SessionFactory};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

static INIT_PATH: OnceLock<PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "lookalike-tests",
            log_dir: Some(std::env::temp_dir().join("lookalike-tests")),
            emit_stderr: true,
            format: LogFormat::Text,
            default_filter: "debug".into(),
        };
        lookalike_common::observability::init_logging(config).unwrap_or_default()
    });
}

/// Scrape settings that do not sleep between scrolls.
pub fn fast_scrape() -> ScrapeSettings {
    ScrapeSettings {
        wait_timeout: Duration::from_millis(50),
        scroll_pause: Duration::ZERO,
        max_scroll_iterations: 50,
        max_results: 15,
    }
}

/// A `data-m` payload carrying `url`.
pub fn murl(url: &str) -> Option<String> {
    Some(format!(r#"{{"murl":"{url}","turl":"thumb"}}"#))
}

/// How the fake page answers one uploaded image.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    /// `data-m` values of the result links, in DOM order.
    pub payloads: Vec<Option<String>>,
    /// The result links never appear.
    pub results_time_out: bool,
    /// The browser dies while waiting for results.
    pub kill_session: bool,
    /// Successive `document_height` answers; the last one repeats.
    pub heights: Vec<u64>,
}

impl PageScript {
    pub fn results(payloads: Vec<Option<String>>) -> Self {
        Self {
            payloads,
            ..Self::default()
        }
    }

    pub fn timeout() -> Self {
        Self {
            results_time_out: true,
            ..Self::default()
        }
    }

    pub fn crash() -> Self {
        Self {
            kill_session: true,
            ..Self::default()
        }
    }
}

/// Shared view of everything the fake sessions did.
#[derive(Default)]
pub struct BrowserLog {
    scripts: Mutex<HashMap<String, VecDeque<PageScript>>>,
    uploads: Mutex<Vec<String>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
    pub scrolls: AtomicUsize,
}

impl BrowserLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the page for the image whose path ends in `key`
    /// (`"<category>/<file>"` or just `"<file>"`). Scripting a key again
    /// queues the next answer; the last one repeats.
    pub fn script(&self, key: &str, script: PageScript) {
        self.scripts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .push_back(script);
    }

    /// Uploaded images as `"<category>/<file>"`, in upload order.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn lookup(&self, key: &str, file: &str) -> PageScript {
        let mut scripts = self.scripts.lock().unwrap();
        let key = if scripts.contains_key(key) { key } else { file };
        let Some(queue) = scripts.get_mut(key) else {
            return PageScript::default();
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        }
    }
}

fn upload_key(path: &Path) -> (String, String) {
    let file = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let category = path
        .parent()
        .and_then(Path::file_name)
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    (format!("{category}/{file}"), file)
}

pub struct FakeSession {
    log: Arc<BrowserLog>,
    page: Option<PageScript>,
    height_calls: usize,
    dead: bool,
    closed: bool,
}

impl FakeSession {
    pub fn new(log: Arc<BrowserLog>) -> Self {
        Self {
            log,
            page: None,
            height_calls: 0,
            dead: false,
            closed: false,
        }
    }

    fn alive(&self) -> Result<(), DriverError> {
        if self.dead || self.closed {
            Err(DriverError::Command("session is gone".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        self.alive()?;
        self.page = None;
        self.height_calls = 0;
        self.log.navigations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn click(&mut self, _selector: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.alive()
    }

    async fn upload_file(
        &mut self,
        _selector: &str,
        path: &Path,
        _timeout: Duration,
    ) -> Result<(), DriverError> {
        self.alive()?;
        let (key, file) = upload_key(path);
        self.page = Some(self.log.lookup(&key, &file));
        self.log.uploads.lock().unwrap().push(key);
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.alive()?;
        let page = self.page.as_ref().ok_or(DriverError::NoPage)?;
        if page.kill_session {
            self.dead = true;
            return Err(DriverError::Command("chrome not reachable".into()));
        }
        if page.results_time_out {
            return Err(DriverError::Timeout {
                what: selector.to_string(),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, DriverError> {
        self.alive()?;
        let page = self.page.as_ref().ok_or(DriverError::NoPage)?;
        let height = match page.heights.as_slice() {
            [] => 1000,
            hs => hs[self.height_calls.min(hs.len() - 1)],
        };
        self.height_calls += 1;
        Ok(height)
    }

    async fn scroll_half_page(&mut self) -> Result<(), DriverError> {
        self.alive()?;
        self.log.scrolls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn attribute_values(
        &mut self,
        _selector: &str,
        _attribute: &str,
        limit: usize,
    ) -> Result<Vec<Option<String>>, DriverError> {
        self.alive()?;
        let page = self.page.as_ref().ok_or(DriverError::NoPage)?;
        Ok(page.payloads.iter().take(limit).cloned().collect())
    }

    async fn is_alive(&mut self) -> bool {
        !self.dead && !self.closed
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            self.log.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hands out [`FakeSession`]s that all report to one [`BrowserLog`].
pub struct FakeFactory {
    pub log: Arc<BrowserLog>,
    /// Refuse every open after this many successful ones.
    pub max_opens: Option<usize>,
}

impl FakeFactory {
    pub fn new(log: Arc<BrowserLog>) -> Arc<Self> {
        Arc::new(Self {
            log,
            max_opens: None,
        })
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let opened = self.log.opened.load(Ordering::SeqCst);
        if self.max_opens.is_some_and(|max| opened >= max) {
            return Err(DriverError::Connect {
                endpoint: "fake://browser".into(),
                message: "no more browsers".into(),
            });
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession::new(self.log.clone())))
    }
}

/// Create `root/<category>/<file>` with placeholder bytes.
pub fn write_image(root: &Path, category: &str, file: &str) -> PathBuf {
    let dir = root.join(category);
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(file);
    std::fs::write(&path, b"\x89PNG").unwrap();
    path
}
