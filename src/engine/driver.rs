//! Browser automation seam.
//!
//! The engine only talks to the messaging client through [`UiDriver`], so the
//! whole campaign flow can run against a scripted driver in tests and against
//! Chromium in production.

use crate::model::RunConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// How an element is found on the rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", content = "value", rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    #[serde(rename = "xpath")]
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css:{s}"),
            Locator::XPath(s) => write!(f, "xpath:{s}"),
        }
    }
}

/// Key combinations the engine needs beyond plain typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyChord {
    /// Shift+Enter: line break inside the compose field without sending.
    SoftReturn,
    /// Ctrl+V: paste whatever the operator staged on the clipboard.
    Paste,
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("element {locator} not ready after {waited:?}")]
    Timeout { locator: String, waited: Duration },

    #[error("element interaction failed on {locator}: {reason}")]
    Element { locator: String, reason: String },

    #[error("keyboard input failed: {0}")]
    Input(String),

    #[error("browser session is closed")]
    Closed,
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Element-level operations against the messaging client's page.
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> DriverResult<()>;

    /// Poll until `locator` is present and interactable, or `timeout` elapses.
    /// A timeout is `Ok(false)`, not an error.
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<bool>;

    async fn click(&self, locator: &Locator) -> DriverResult<()>;

    async fn clear(&self, locator: &Locator) -> DriverResult<()>;

    async fn type_text(&self, locator: &Locator, text: &str) -> DriverResult<()>;

    async fn press(&self, locator: &Locator, chord: KeyChord) -> DriverResult<()>;

    /// Release the browser. Calling this more than once is a no-op.
    async fn close(&self) -> DriverResult<()>;

    /// Wait for the element, failing with [`DriverError::Timeout`] if it never shows.
    async fn require(&self, locator: &Locator, timeout: Duration) -> DriverResult<()> {
        if self.wait_for(locator, timeout).await? {
            Ok(())
        } else {
            Err(DriverError::Timeout {
                locator: locator.to_string(),
                waited: timeout,
            })
        }
    }
}

/// Creates one driver session per campaign run.
#[async_trait]
pub trait DriverLauncher: Send + Sync {
    async fn launch(&self, cfg: &RunConfig) -> DriverResult<Arc<dyn UiDriver>>;
}
