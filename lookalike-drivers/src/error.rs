use fantoccini::error::{CmdError, NewSessionError};
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by the browser layer.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The WebDriver endpoint refused or failed to create a session.
    #[error("failed to open webdriver session at {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    /// An element never reached the awaited state within the bound.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// A page command was issued before any page was loaded.
    #[error("no page loaded; navigate first")]
    NoPage,

    /// Any other WebDriver command failure.
    #[error("webdriver command failed: {0}")]
    Command(String),

    /// A script evaluated but returned something we could not use.
    #[error("unexpected script result: {0}")]
    Script(String),
}

impl DriverError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, DriverError::Timeout { .. })
    }

    pub(crate) fn connect(endpoint: &str, err: NewSessionError) -> Self {
        DriverError::Connect {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<CmdError> for DriverError {
    fn from(err: CmdError) -> Self {
        DriverError::Command(err.to_string())
    }
}
