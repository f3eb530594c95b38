use crate::browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentManager,
    stealth::StealthProfile,
};
use crate::error::DriverError;
use fantoccini::{elements::Element, error::CmdError, Client, Locator};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// High-level page wrapper providing bounded waits and element queries.
pub struct BrowserPage {
    pub(crate) client: Client,
    pub(crate) stealth_profile: StealthProfile,
    pub(crate) fingerprint_manager: UserAgentManager,
    pub(crate) behavioral_engine: BehavioralEngine,
}

impl BrowserPage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(
        client: Client,
        stealth_profile: StealthProfile,
        fingerprint_manager: UserAgentManager,
        behavioral_engine: BehavioralEngine,
    ) -> Self {
        Self {
            client,
            stealth_profile,
            fingerprint_manager,
            behavioral_engine,
        }
    }

    /// Navigate to `url` and apply stealth/fingerprint scripts.
    pub async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        self.behavioral_engine.random_delay(300, 1200).await;
        self.client.goto(url).await?;

        self.apply_stealth_and_fingerprint().await
    }

    /// Apply stealth scripts and basic fingerprinting adjustments.
    async fn apply_stealth_and_fingerprint(&mut self) -> Result<(), DriverError> {
        let fingerprint = self.fingerprint_manager.session_profile().clone();
        for evasion in self.stealth_profile.evasions() {
            self.client
                .execute(evasion.script(), evasion.arguments(&fingerprint))
                .await?;
        }
        Ok(())
    }

    /// Wait up to `timeout` for an element matching `selector` to be present.
    pub async fn wait_for_element(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<PageElement, DriverError> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .every(POLL_INTERVAL)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => DriverError::Timeout {
                    what: format!("`{selector}` to appear"),
                    after: timeout,
                },
                other => other.into(),
            })?;
        Ok(PageElement::new(element, &self.behavioral_engine))
    }

    /// Wait up to `timeout` for an element to be present, displayed and enabled.
    pub async fn wait_for_interactable(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<PageElement, DriverError> {
        let deadline = Instant::now() + timeout;
        let element = self.wait_for_element(selector, timeout).await?;
        loop {
            if element.element.is_displayed().await? && element.element.is_enabled().await? {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: format!("`{selector}` to become clickable"),
                    after: timeout,
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Find zero or more elements by CSS selector, in document order.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<PageElement>, DriverError> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;

        Ok(elements
            .into_iter()
            .map(|element| PageElement::new(element, &self.behavioral_engine))
            .collect())
    }

    /// Current `document.body.scrollHeight` in CSS pixels.
    pub async fn scroll_height(&self) -> Result<u64, DriverError> {
        let value = self
            .client
            .execute("return document.body.scrollHeight;", vec![])
            .await?;
        value
            .as_f64()
            .filter(|h| h.is_finite() && *h >= 0.0)
            .map(|h| h as u64)
            .ok_or_else(|| DriverError::Script(format!("scrollHeight was {value}")))
    }

    /// Scroll down by half of the current document height.
    pub async fn scroll_by_half_height(&self) -> Result<(), DriverError> {
        self.client
            .execute(
                "window.scrollBy(0, document.body.scrollHeight / 2);",
                vec![],
            )
            .await?;
        debug!(target: "browser.scroll", "scrolled half a document height");
        Ok(())
    }
}

// =========================
// PageElement Definition
// =========================

#[derive(Clone)]
/// Wrapper for DOM elements that provides typed helpers consistent with [`BrowserPage`].
pub struct PageElement {
    pub element: Element,
    pub behavioral_engine: BehavioralEngine,
}

impl PageElement {
    /// Construct an element wrapper.
    pub fn new(element: Element, behavioral: &BehavioralEngine) -> Self {
        Self {
            element,
            behavioral_engine: behavioral.clone(),
        }
    }

    /// Click after a short human-like pause.
    pub async fn click(&self) -> Result<(), DriverError> {
        self.behavioral_engine.random_delay(100, 400).await;
        self.element.click().await?;
        Ok(())
    }

    /// Send raw keys; for a file input this is the absolute path to upload.
    pub async fn send_keys(&self, text: &str) -> Result<(), DriverError> {
        self.element.send_keys(text).await?;
        Ok(())
    }

    /// Read an attribute value.
    pub async fn get_attribute(&self, attribute: &str) -> Result<Option<String>, DriverError> {
        Ok(self.element.attr(attribute).await?)
    }
}
