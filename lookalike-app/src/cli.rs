use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Collect lookalike images for a dataset via reverse image search.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory for log files (overrides config and LOOKALIKE_LOG_DIR).
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Write logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Also print logs to stderr.
    #[arg(long, global = true)]
    pub stderr: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search every `<category>/<image>` and download the results.
    Crawl(CrawlArgs),
    /// Renumber the files of a directory to 1.ext..N.ext in natural order.
    Rename {
        dir: PathBuf,
        #[arg(long, default_value = "jpg")]
        ext: String,
    },
    /// Erase masked objects from `<images>/<category>/*` using `<masks>/<category>/<stem>.png`.
    Inpaint {
        #[arg(long)]
        images: PathBuf,
        #[arg(long)]
        masks: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// YAML configuration file.
    #[arg(short, long, default_value = "lookalike.yaml")]
    pub config: PathBuf,

    /// Root of `<category>/<image>` inputs.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Root the results are written under.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run the browser headless.
    #[arg(long, overrides_with = "no_headless")]
    pub headless: bool,

    /// Show the browser window.
    #[arg(long)]
    pub no_headless: bool,

    /// WebDriver endpoint, e.g. http://localhost:9515.
    #[arg(long, env = "LOOKALIKE_WEBDRIVER")]
    pub webdriver: Option<String>,

    /// Disable progress bars.
    #[arg(long)]
    pub no_progress: bool,
}

impl CrawlArgs {
    /// `Some(true|false)` when either flag was given.
    pub fn headless(&self) -> Option<bool> {
        match (self.headless, self.no_headless) {
            (_, true) => Some(false),
            (true, false) => Some(true),
            (false, false) => None,
        }
    }
}
