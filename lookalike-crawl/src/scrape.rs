//! Drives one visual search on a browser session and pulls out the
//! candidate image URLs.

use crate::error::ScrapeError;
use lookalike_config::{ProviderSettings, ScraperSettings};
use lookalike_drivers::BrowserSession;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A result URL and its 1-based rank; the rank becomes the output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    pub url: String,
    pub ordinal: usize,
}

/// CSS selectors and payload layout of the search provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSelectors {
    pub entry_url: String,
    pub upload_trigger: String,
    pub file_input: String,
    pub result_link: String,
    pub payload_attribute: String,
    pub payload_field: String,
}

impl Default for ProviderSelectors {
    fn default() -> Self {
        ProviderSettings::default().into()
    }
}

impl From<ProviderSettings> for ProviderSelectors {
    fn from(p: ProviderSettings) -> Self {
        Self {
            entry_url: p.entry_url,
            upload_trigger: p.upload_trigger,
            file_input: p.file_input,
            result_link: p.result_link,
            payload_attribute: p.payload_attribute,
            payload_field: p.payload_field,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeSettings {
    pub wait_timeout: Duration,
    pub scroll_pause: Duration,
    pub max_scroll_iterations: u32,
    pub max_results: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        (&ScraperSettings::default()).into()
    }
}

impl From<&ScraperSettings> for ScrapeSettings {
    fn from(s: &ScraperSettings) -> Self {
        Self {
            wait_timeout: s.wait_timeout(),
            scroll_pause: s.scroll_pause(),
            max_scroll_iterations: s.max_scroll_iterations,
            max_results: s.max_results,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultScraper {
    selectors: ProviderSelectors,
    settings: ScrapeSettings,
}

impl ResultScraper {
    pub fn new(selectors: ProviderSelectors, settings: ScrapeSettings) -> Self {
        Self {
            selectors,
            settings,
        }
    }

    pub fn settings(&self) -> &ScrapeSettings {
        &self.settings
    }

    /// Upload `image` and return up to `max_results` candidate URLs in page
    /// order. An empty vector means the page answered with nothing usable.
    pub async fn search(
        &self,
        image: &Path,
        session: &mut dyn BrowserSession,
    ) -> Result<Vec<CandidateUrl>, ScrapeError> {
        let image = tokio::fs::canonicalize(image)
            .await
            .map_err(|source| ScrapeError::InvalidPath {
                path: image.to_path_buf(),
                source,
            })?;
        let sel = &self.selectors;
        let wait = self.settings.wait_timeout;

        session
            .navigate(&sel.entry_url)
            .await
            .map_err(ScrapeError::at("navigate"))?;
        session
            .click(&sel.upload_trigger, wait)
            .await
            .map_err(ScrapeError::at("open upload"))?;
        session
            .upload_file(&sel.file_input, &image, wait)
            .await
            .map_err(ScrapeError::at("upload"))?;
        session
            .wait_for(&sel.result_link, wait)
            .await
            .map_err(ScrapeError::at("results"))?;
        debug!(target: "crawl.scrape", image = %image.display(), "results rendered");

        self.scroll_until_stable(session).await?;

        let raw = session
            .attribute_values(
                &sel.result_link,
                &sel.payload_attribute,
                self.settings.max_results,
            )
            .await
            .map_err(ScrapeError::at("extract"))?;
        let examined = raw.len();

        let urls: Vec<CandidateUrl> = raw
            .into_iter()
            .filter_map(|payload| payload.and_then(|p| payload_url(&p, &sel.payload_field)))
            .enumerate()
            .map(|(i, url)| CandidateUrl {
                url,
                ordinal: i + 1,
            })
            .collect();

        info!(
            target: "crawl.scrape",
            image = %image.display(),
            examined,
            extracted = urls.len(),
            "search complete"
        );
        Ok(urls)
    }

    /// Scroll by half a page until the document stops growing, or until the
    /// iteration cap is hit.
    async fn scroll_until_stable(&self, session: &mut dyn BrowserSession) -> Result<(), ScrapeError> {
        let mut last = session
            .document_height()
            .await
            .map_err(ScrapeError::at("scroll"))?;

        for _ in 0..self.settings.max_scroll_iterations {
            session
                .scroll_half_page()
                .await
                .map_err(ScrapeError::at("scroll"))?;
            tokio::time::sleep(self.settings.scroll_pause).await;
            let height = session
                .document_height()
                .await
                .map_err(ScrapeError::at("scroll"))?;
            if height == last {
                return Ok(());
            }
            last = height;
        }

        warn!(
            target: "crawl.scrape",
            iterations = self.settings.max_scroll_iterations,
            height = last,
            "page kept growing; stopped scrolling at cap"
        );
        Ok(())
    }
}

/// Pull the string `field` out of a JSON payload. Anything else yields `None`.
fn payload_url(payload: &str, field: &str) -> Option<String> {
    let value: Value = serde_json::from_str(payload).ok()?;
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_url_reads_the_field() {
        let p = r#"{"murl":"https://img.example/a.jpg","turl":"t"}"#;
        assert_eq!(payload_url(p, "murl").as_deref(), Some("https://img.example/a.jpg"));
    }

    #[test]
    fn payload_url_ignores_junk() {
        assert_eq!(payload_url("not json", "murl"), None);
        assert_eq!(payload_url(r#"{"turl":"x"}"#, "murl"), None);
        assert_eq!(payload_url(r#"{"murl":42}"#, "murl"), None);
        assert_eq!(payload_url(r#"{"murl":""}"#, "murl"), None);
    }

    #[test]
    fn defaults_target_bing() {
        let sel = ProviderSelectors::default();
        assert_eq!(sel.entry_url, "https://www.bing.com/visualsearch");
        assert_eq!(sel.result_link, "a.richImgLnk");
        assert_eq!(ScrapeSettings::default().max_results, 15);
    }
}
