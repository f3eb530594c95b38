//! Driver layer for browser automation.
//!
//! This crate exposes the WebDriver session used to drive a visual-search
//! page, plus the [`browser::session::BrowserSession`] trait the crawler is
//! written against so it can be exercised without a real browser.
//!
//! - [`browser::driver::BrowserDriver`]: WebDriver client wrapper
//! - [`browser::page::BrowserPage`]: bounded waits, scrolling and element helpers
//! - [`browser::session`]: the session capability and its WebDriver implementation
//! - [`browser::behavioral::BehavioralEngine`]: human-like pauses between actions
//! - [`browser::stealth`]: stealth profiles and JS evasions
pub mod browser;
pub mod error;

pub use browser::session::{BrowserSession, SessionFactory, WebDriverSession, WebDriverSessionFactory};
pub use error::DriverError;
