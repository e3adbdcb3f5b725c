//! Compose-and-send sequence for a single contact.

use super::driver::{DriverResult, KeyChord, Locator, UiDriver};
use super::pacing::Pacer;
use super::resolver::{ContactResolver, Resolution};
use super::selectors::Selectors;
use crate::model::{ContactOutcome, ContactRecord};
use std::time::Duration;
use tracing::{debug, warn};

pub(crate) struct MessageDispatcher<'a> {
    pub driver: &'a dyn UiDriver,
    pub selectors: &'a Selectors,
    pub resolver: ContactResolver<'a>,
    pub pacer: &'a Pacer,
    pub element_timeout: Duration,
    pub with_media: bool,
}

impl MessageDispatcher<'_> {
    /// Never fails: driver errors become [`ContactOutcome::Failed`].
    pub async fn send(&self, contact: &ContactRecord) -> ContactOutcome {
        match self.try_send(contact).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(contact = %contact.identifier, error = %e, "send failed");
                ContactOutcome::Failed
            }
        }
    }

    async fn try_send(&self, contact: &ContactRecord) -> DriverResult<ContactOutcome> {
        if self.resolver.open_chat(&contact.identifier).await? == Resolution::NotReachable {
            return Ok(ContactOutcome::Unreachable);
        }
        self.pacer.before_compose().await;

        let sel = self.selectors;
        self.driver.require(&sel.compose_field, self.element_timeout).await?;
        self.driver.click(&sel.compose_field).await?;
        self.pacer.click_settle().await;
        self.driver.clear(&sel.compose_field).await?;

        // The clip must already be on the clipboard; pasting it opens the
        // media preview, which has its own caption box and send control.
        let (text_field, send_control) = if self.with_media {
            self.driver.press(&sel.compose_field, KeyChord::Paste).await?;
            self.driver.require(&sel.media_caption_field, self.element_timeout).await?;
            (&sel.media_caption_field, &sel.media_send_button)
        } else {
            (&sel.compose_field, &sel.send_button)
        };

        self.type_body(text_field, &contact.body).await?;

        self.driver.require(send_control, self.element_timeout).await?;
        self.driver.click(send_control).await?;
        self.pacer.after_send().await;

        debug!(contact = %contact.identifier, "message sent");
        Ok(ContactOutcome::Sent)
    }

    /// Line breaks become soft returns so the body stays one message.
    async fn type_body(&self, field: &Locator, body: &str) -> DriverResult<()> {
        let mut lines = body.split('\n').map(|l| l.trim_end_matches('\r'));
        if let Some(first) = lines.next() {
            if !first.is_empty() {
                self.driver.type_text(field, first).await?;
            }
        }
        for line in lines {
            self.driver.press(field, KeyChord::SoftReturn).await?;
            if !line.is_empty() {
                self.driver.type_text(field, line).await?;
            }
        }
        Ok(())
    }
}
