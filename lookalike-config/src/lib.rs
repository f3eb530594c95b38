//! Loader for crawler configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//!
//! 1. built-in defaults (every field has one, so no file is required)
//! 2. YAML files / inline YAML snippets, in the order they were attached
//! 3. `LOOKALIKE__SECTION__KEY` environment variables
//! 4. explicit overrides (used by the CLI for flags)
//!
//! After merging, `${VAR}` placeholders in string values are expanded from
//! the process environment.
use config::{Config, ConfigError, Environment, File, FileFormat};
use lookalike_common::observability::LogFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "LOOKALIKE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookalikeConfig {
    /// Root holding `<category>/<image>` inputs.
    pub input_root: PathBuf,
    /// Root receiving `<category>/<image-stem>/<n>.jpg` outputs.
    pub output_root: PathBuf,
    pub browser: BrowserSettings,
    pub provider: ProviderSettings,
    pub scraper: ScraperSettings,
    pub download: DownloadSettings,
    pub traversal: TraversalSettings,
    pub logging: LoggingSettings,
}

impl Default for LookalikeConfig {
    fn default() -> Self {
        Self {
            input_root: PathBuf::from("./background_transformed/train/image"),
            output_root: PathBuf::from("./background/train/image"),
            browser: BrowserSettings::default(),
            provider: ProviderSettings::default(),
            scraper: ScraperSettings::default(),
            download: DownloadSettings::default(),
            traversal: TraversalSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl LookalikeConfig {
    /// Reject values that would stall or disable the pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.download.workers == 0 {
            return Err(ConfigError::Message(
                "download.workers must be at least 1".into(),
            ));
        }
        if self.download.max_attempts == 0 {
            return Err(ConfigError::Message(
                "download.max_attempts must be at least 1".into(),
            ));
        }
        if self.traversal.search_attempts == 0 {
            return Err(ConfigError::Message(
                "traversal.search_attempts must be at least 1".into(),
            ));
        }
        if self.scraper.max_results == 0 {
            return Err(ConfigError::Message(
                "scraper.max_results must be at least 1".into(),
            ));
        }
        if self.provider.result_link.trim().is_empty() {
            return Err(ConfigError::Message(
                "provider.result_link must be a CSS selector".into(),
            ));
        }
        Ok(())
    }
}

/// Browser automation stealth level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StealthLevel {
    Lightweight,
    #[default]
    Balanced,
    Maximum,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// WebDriver endpoint (chromedriver listens on 9515 by default).
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthLevel,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            stealth: StealthLevel::Balanced,
        }
    }
}

/// Where the visual-search page keeps its controls. Defaults target Bing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub entry_url: String,
    pub upload_trigger: String,
    pub file_input: String,
    pub result_link: String,
    /// Attribute on each result link holding a JSON payload.
    pub payload_attribute: String,
    /// Field of that payload holding the full-size image URL.
    pub payload_field: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            entry_url: "https://www.bing.com/visualsearch".into(),
            upload_trigger: ".pstpn".into(),
            file_input: "input[type='file']".into(),
            result_link: "a.richImgLnk".into(),
            payload_attribute: "data-m".into(),
            payload_field: "murl".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperSettings {
    pub wait_timeout_secs: u64,
    pub scroll_pause_ms: u64,
    pub max_scroll_iterations: u32,
    pub max_results: usize,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 10,
            scroll_pause_ms: 1000,
            max_scroll_iterations: 50,
            max_results: 15,
        }
    }
}

impl ScraperSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    pub fn scroll_pause(&self) -> Duration {
        Duration::from_millis(self.scroll_pause_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    /// Concurrent fetches per source image.
    pub workers: usize,
    /// Total attempts per URL, including the first.
    pub max_attempts: u32,
    /// First backoff delay; doubles on each retry.
    pub backoff_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: 5,
            max_attempts: 3,
            backoff_ms: 500,
            request_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36".into(),
        }
    }
}

impl DownloadSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalSettings {
    /// Searches per image within one run before it is left for the next run.
    pub search_attempts: u32,
    /// Replace the browser session when it stops answering after a failed search.
    pub recreate_unhealthy_session: bool,
    /// Draw progress bars on the terminal.
    pub progress: bool,
}

impl Default for TraversalSettings {
    fn default() -> Self {
        Self {
            search_attempts: 3,
            recreate_unhealthy_session: true,
            progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub stderr: bool,
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            dir: None,
            format: LogFormat::Text,
            stderr: false,
            filter: "info".into(),
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct LookalikeConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    overrides: Vec<(String, config::Value)>,
    use_env: bool,
}

impl Default for LookalikeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LookalikeConfigLoader {
    /// Start from built-in defaults with `LOOKALIKE__` env overrides enabled.
    ///
    /// ```
    /// use lookalike_config::LookalikeConfigLoader;
    ///
    /// let config = LookalikeConfigLoader::new()
    ///     .without_env()
    ///     .load()
    ///     .expect("defaults are valid");
    ///
    /// assert_eq!(config.scraper.max_results, 15);
    /// assert_eq!(config.download.max_attempts, 3);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            overrides: Vec::new(),
            use_env: true,
        }
    }

    /// Attach a YAML/TOML/JSON file that must exist; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is merged only when present, so headless deployments
    /// can rely purely on environment variables.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use lookalike_config::{LookalikeConfigLoader, StealthLevel};
    ///
    /// let cfg = LookalikeConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   headless: false
    ///   stealth: maximum
    /// download:
    ///   workers: 16
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.browser.stealth, StealthLevel::Maximum);
    /// assert_eq!(cfg.download.workers, 16);
    /// assert_eq!(cfg.download.max_attempts, 3);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Set a single dotted key (e.g. `browser.headless`) above every other source.
    pub fn with_override<V: Into<config::Value>>(mut self, key: &str, value: V) -> Self {
        self.overrides.push((key.to_string(), value.into()));
        self
    }

    /// Ignore `LOOKALIKE__*` variables (mostly for deterministic tests).
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use lookalike_config::LookalikeConfigLoader;
    ///
    /// unsafe { std::env::set_var("LOOKALIKE_DOC_DATA", "/data/crawl"); }
    ///
    /// let config = LookalikeConfigLoader::new()
    ///     .without_env()
    ///     .with_yaml_str("output_root: \"${LOOKALIKE_DOC_DATA}/out\"")
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.output_root, std::path::PathBuf::from("/data/crawl/out"));
    ///
    /// unsafe { std::env::remove_var("LOOKALIKE_DOC_DATA"); }
    /// ```
    pub fn load(self) -> Result<LookalikeConfig, ConfigError> {
        let mut builder = self.builder;
        if self.use_env {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: LookalikeConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}
