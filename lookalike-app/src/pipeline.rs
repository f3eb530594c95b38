use crate::cli::CrawlArgs;
use anyhow::{Context, Result};
use lookalike_config::{LookalikeConfig, LookalikeConfigLoader, StealthLevel};
use lookalike_crawl::{DedupCache, Downloader, ProviderSelectors, ResultScraper, TraversalController};
use lookalike_drivers::browser::driver::DriverSettings;
use lookalike_drivers::browser::stealth::StealthProfile;
use lookalike_drivers::WebDriverSessionFactory;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Merge the config file, `LOOKALIKE__*` variables and crawl flags.
pub fn load_config(args: &CrawlArgs) -> Result<LookalikeConfig> {
    let mut loader = LookalikeConfigLoader::new().with_optional_file(&args.config);
    if let Some(input) = &args.input {
        loader = loader.with_override("input_root", input.to_string_lossy().into_owned());
    }
    if let Some(output) = &args.output {
        loader = loader.with_override("output_root", output.to_string_lossy().into_owned());
    }
    if let Some(headless) = args.headless() {
        loader = loader.with_override("browser.headless", headless);
    }
    if let Some(url) = &args.webdriver {
        loader = loader.with_override("browser.webdriver_url", url.as_str());
    }
    if args.no_progress {
        loader = loader.with_override("traversal.progress", false);
    }
    loader
        .load()
        .with_context(|| format!("loading configuration from {}", args.config.display()))
}

fn driver_settings(cfg: &LookalikeConfig) -> DriverSettings {
    DriverSettings {
        webdriver_url: cfg.browser.webdriver_url.clone(),
        headless: cfg.browser.headless,
        stealth_profile: match cfg.browser.stealth {
            StealthLevel::Lightweight => StealthProfile::Lightweight,
            StealthLevel::Balanced => StealthProfile::Balanced,
            StealthLevel::Maximum => StealthProfile::Maximum,
        },
    }
}

/// Wire scraper, downloader and browser factory into one controller.
pub fn build_crawl(cfg: &LookalikeConfig, cancel: CancellationToken) -> Result<TraversalController> {
    let downloader = Downloader::from_settings(&cfg.download, DedupCache::new())
        .context("building http client")?;
    let scraper = ResultScraper::new(
        ProviderSelectors::from(cfg.provider.clone()),
        (&cfg.scraper).into(),
    );
    let factory = Arc::new(WebDriverSessionFactory::new(driver_settings(cfg)));

    Ok(TraversalController::new(
        &cfg.input_root,
        &cfg.output_root,
        scraper,
        downloader,
        factory,
    )
    .with_search_attempts(cfg.traversal.search_attempts)
    .with_session_recreation(cfg.traversal.recreate_unhealthy_session)
    .with_progress(cfg.traversal.progress)
    .with_cancellation(cancel))
}
