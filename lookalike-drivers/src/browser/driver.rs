use crate::browser::{
    behavioral::BehavioralEngine,
    fingerprint::UserAgentManager,
    page::BrowserPage,
    stealth::StealthProfile,
};
use crate::error::DriverError;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;
use webdriver::capabilities::Capabilities;

/// How to reach and configure the browser.
#[derive(Debug, Clone)]
pub struct DriverSettings {
    /// WebDriver endpoint, e.g. chromedriver on `http://localhost:9515`.
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth_profile: StealthProfile,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            stealth_profile: StealthProfile::Balanced,
        }
    }
}

/// Thin wrapper around a `fantoccini` WebDriver client with stealth and
/// behavioral helpers.
pub struct BrowserDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
    pub user_agent_manager: UserAgentManager,
    pub stealth_profile: StealthProfile,
}

impl BrowserDriver {
    /// Create a new driver connected to a running WebDriver service.
    pub async fn connect(settings: &DriverSettings) -> Result<Self, DriverError> {
        let mut caps = Capabilities::new();
        let mut chrome_opts = HashMap::new();
        let mut user_agent_manager = UserAgentManager::new();
        let user_agent_profile = user_agent_manager.session_profile();

        let mut args = settings.stealth_profile.launch_arguments(user_agent_profile);
        if settings.headless {
            args.push("--headless=new".to_string());
            if !args.iter().any(|a| a == "--disable-gpu") {
                args.push("--disable-gpu".to_string());
            }
        }
        chrome_opts.insert("args".to_string(), json!(args));
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&settings.webdriver_url)
            .await
            .map_err(|e| DriverError::connect(&settings.webdriver_url, e))?;

        info!(
            target: "browser.session",
            endpoint = %settings.webdriver_url,
            headless = settings.headless,
            stealth = ?settings.stealth_profile,
            "webdriver session opened"
        );

        Ok(Self {
            client,
            behavioral_engine: BehavioralEngine::new(),
            user_agent_manager,
            stealth_profile: settings.stealth_profile,
        })
    }

    /// Navigate to `url` and return a [`BrowserPage`] with stealth/fingerprint
    /// scripts applied.
    pub async fn goto(&mut self, url: &str) -> Result<BrowserPage, DriverError> {
        let mut page = BrowserPage::new(
            self.client.clone(),
            self.stealth_profile,
            self.user_agent_manager.clone(),
            self.behavioral_engine.clone(),
        );
        page.goto(url).await?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<(), DriverError> {
        self.client.close().await?;
        Ok(())
    }
}
