use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use lookalike_common::observability::{LogConfig, LogFormat, init_logging};
use lookalike_config::LoggingSettings;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod cli;
mod pipeline;

const APP_NAME: &str = "lookalike";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Crawl(ref args) => {
            let cfg = pipeline::load_config(args)?;
            start_logging(&cli, &cfg.logging)?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!(target: "app", "interrupt received; finishing current image");
                    on_signal.cancel();
                }
            });

            let crawl = pipeline::build_crawl(&cfg, cancel)?;
            let summary = crawl.run().await.context("crawl aborted")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Rename { ref dir, ref ext } => {
            start_logging(&cli, &LoggingSettings::default())?;
            let moved = lookalike_tools::rename::rename_sequentially(dir, ext)
                .with_context(|| format!("renaming files in {}", dir.display()))?;
            for (from, to) in &moved {
                println!("{} -> {}", from.display(), to.display());
            }
        }
        Command::Inpaint {
            ref images,
            ref masks,
            ref output,
        } => {
            start_logging(&cli, &LoggingSettings::default())?;
            let report = lookalike_tools::inpaint::inpaint_dir(images, masks, output)?;
            info!(target: "app", written = report.written.len(), "inpaint done");
            println!(
                "written: {}, skipped (exists): {}, missing mask: {}, unreadable: {}",
                report.written.len(),
                report.skipped_existing,
                report.missing_mask,
                report.unreadable
            );
        }
    }
    Ok(())
}

/// Flags beat the `logging` section of the config.
fn start_logging(cli: &Cli, settings: &LoggingSettings) -> Result<()> {
    let format = if cli.log_json {
        LogFormat::Json
    } else {
        settings.format
    };
    let path = init_logging(LogConfig {
        app_name: APP_NAME,
        log_dir: cli.log_dir.clone().or_else(|| settings.dir.clone()),
        emit_stderr: cli.stderr || settings.stderr,
        format,
        default_filter: settings.filter.clone(),
    })?;
    info!(target: "app", log_file = %path.display(), "logging initialised");
    Ok(())
}
