//! The browser capability the crawler is written against.
//!
//! A [`BrowserSession`] is exclusively owned and used sequentially: every
//! method takes `&mut self`, so the borrow checker keeps concurrent workers
//! away from it. [`SessionFactory`] produces fresh sessions so a caller can
//! replace one that stopped responding.

use crate::browser::driver::{BrowserDriver, DriverSettings};
use crate::browser::page::BrowserPage;
use crate::error::DriverError;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, replacing whatever page was open.
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Wait until `selector` is displayed and enabled, then click it.
    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Wait for the file input at `selector` and hand it a local file.
    async fn upload_file(
        &mut self,
        selector: &str,
        path: &Path,
        timeout: Duration,
    ) -> Result<(), DriverError>;

    /// Wait until at least one element matches `selector`.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Current scrollable height of the document.
    async fn document_height(&mut self) -> Result<u64, DriverError>;

    /// Scroll down by half of the current document height.
    async fn scroll_half_page(&mut self) -> Result<(), DriverError>;

    /// Read `attribute` from the first `limit` elements matching `selector`,
    /// in document order. Missing attributes are `None`.
    async fn attribute_values(
        &mut self,
        selector: &str,
        attribute: &str,
        limit: usize,
    ) -> Result<Vec<Option<String>>, DriverError>;

    /// Cheap round trip proving the browser still answers.
    async fn is_alive(&mut self) -> bool;

    /// Release the browser. Calling it twice is harmless.
    async fn close(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError>;
}

/// [`BrowserSession`] backed by a real WebDriver browser.
pub struct WebDriverSession {
    driver: Option<BrowserDriver>,
    page: Option<BrowserPage>,
}

impl WebDriverSession {
    pub async fn connect(settings: &DriverSettings) -> Result<Self, DriverError> {
        let driver = BrowserDriver::connect(settings).await?;
        Ok(Self {
            driver: Some(driver),
            page: None,
        })
    }

    fn page(&self) -> Result<&BrowserPage, DriverError> {
        self.page.as_ref().ok_or(DriverError::NoPage)
    }
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        let driver = self.driver.as_mut().ok_or(DriverError::NoPage)?;
        self.page = Some(driver.goto(url).await?);
        debug!(target: "browser.session", %url, "navigated");
        Ok(())
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        let element = self.page()?.wait_for_interactable(selector, timeout).await?;
        element.click().await
    }

    async fn upload_file(
        &mut self,
        selector: &str,
        path: &Path,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let path = path
            .to_str()
            .ok_or_else(|| DriverError::Command(format!("non UTF-8 path: {}", path.display())))?;
        let input = self.page()?.wait_for_element(selector, timeout).await?;
        input.send_keys(path).await
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), DriverError> {
        self.page()?.wait_for_element(selector, timeout).await?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, DriverError> {
        self.page()?.scroll_height().await
    }

    async fn scroll_half_page(&mut self) -> Result<(), DriverError> {
        self.page()?.scroll_by_half_height().await
    }

    async fn attribute_values(
        &mut self,
        selector: &str,
        attribute: &str,
        limit: usize,
    ) -> Result<Vec<Option<String>>, DriverError> {
        let elements = self.page()?.find_elements(selector).await?;
        let mut values = Vec::with_capacity(limit.min(elements.len()));
        for element in elements.into_iter().take(limit) {
            values.push(element.get_attribute(attribute).await?);
        }
        Ok(values)
    }

    async fn is_alive(&mut self) -> bool {
        let Some(driver) = self.driver.as_ref() else {
            return false;
        };
        matches!(
            tokio::time::timeout(HEALTH_CHECK_TIMEOUT, driver.client.current_url()).await,
            Ok(Ok(_))
        )
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.page = None;
        match self.driver.take() {
            Some(driver) => driver.close().await,
            None => Ok(()),
        }
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.driver.is_some() {
            warn!(
                target: "browser.session",
                "webdriver session dropped without close; the browser may linger"
            );
        }
    }
}

/// Opens a new [`WebDriverSession`] per call.
#[derive(Debug, Clone)]
pub struct WebDriverSessionFactory {
    settings: DriverSettings,
}

impl WebDriverSessionFactory {
    pub fn new(settings: DriverSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SessionFactory for WebDriverSessionFactory {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        Ok(Box::new(WebDriverSession::connect(&self.settings).await?))
    }
}
