//! Opens the chat pane for a contact through the client's search drawer.

use super::driver::{DriverResult, UiDriver};
use super::pacing::Pacer;
use super::selectors::Selectors;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Opened,
    /// Neither probe matched. The search drawer has already been cleared and
    /// closed, but the caller still has to re-verify the main view.
    NotReachable,
}

pub(crate) struct ContactResolver<'a> {
    pub driver: &'a dyn UiDriver,
    pub selectors: &'a Selectors,
    pub pacer: &'a Pacer,
    pub dial_prefix: &'a str,
    pub element_timeout: Duration,
    pub probe_timeout: Duration,
}

/// Apply the dial prefix unless the identifier is already international.
pub(crate) fn normalize_identifier(raw: &str, dial_prefix: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('+') {
        compact
    } else {
        format!("{dial_prefix}{compact}")
    }
}

impl ContactResolver<'_> {
    pub async fn open_chat(&self, identifier: &str) -> DriverResult<Resolution> {
        let sel = self.selectors;

        self.driver.require(&sel.new_chat_button, self.element_timeout).await?;
        self.pacer.click_settle().await;
        self.driver.click(&sel.new_chat_button).await?;

        self.driver.require(&sel.search_field, self.element_timeout).await?;
        self.pacer.click_settle().await;
        self.driver.click(&sel.search_field).await?;
        let query = normalize_identifier(identifier, self.dial_prefix);
        self.driver.type_text(&sel.search_field, &query).await?;

        // Presence probes: short windows, the results either render fast or not at all.
        for probe in [&sel.known_contact_result, &sel.unknown_number_result] {
            if self.driver.wait_for(probe, self.probe_timeout).await? {
                self.pacer.click_settle().await;
                self.driver.click(probe).await?;
                debug!(contact = %identifier, locator = %probe, "chat opened");
                return Ok(Resolution::Opened);
            }
        }

        if let Err(e) = self.leave_search().await {
            warn!(contact = %identifier, error = %e, "could not close search drawer");
        }
        Ok(Resolution::NotReachable)
    }

    async fn leave_search(&self) -> DriverResult<()> {
        let sel = self.selectors;
        self.driver.require(&sel.search_clear_button, self.element_timeout).await?;
        self.pacer.click_settle().await;
        self.driver.click(&sel.search_clear_button).await?;

        self.driver.require(&sel.search_back_button, self.element_timeout).await?;
        self.pacer.click_settle().await;
        self.driver.click(&sel.search_back_button).await
    }
}
