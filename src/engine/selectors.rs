//! Locator catalogue for the messaging client's markup.
//!
//! The client ships new markup often; every locator can be replaced from a JSON
//! file passed with `--selectors`.

use super::driver::Locator;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    /// Editable element that only exists once the session is logged in.
    pub authenticated: Locator,
    pub new_chat_button: Locator,
    pub search_field: Locator,
    /// Search hit for a number saved in the address book.
    pub known_contact_result: Locator,
    /// "Chat with this number" hit for a number that is not saved.
    pub unknown_number_result: Locator,
    pub search_clear_button: Locator,
    pub search_back_button: Locator,
    pub compose_field: Locator,
    pub send_button: Locator,
    /// Caption box of the media preview that opens after a paste.
    pub media_caption_field: Locator,
    pub media_send_button: Locator,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            authenticated: Locator::xpath("//div[@contenteditable='true' and @data-tab='3']"),
            new_chat_button: Locator::css("header span[data-icon='new-chat-outline']"),
            search_field: Locator::css(
                "div[aria-label='New chat'] div[contenteditable='true'][role='textbox'] p",
            ),
            known_contact_result: Locator::css(
                "div[aria-label='New chat'] div[role='listitem']:nth-child(2) div[role='button']",
            ),
            unknown_number_result: Locator::css("div[aria-label='New chat'] div._ak72"),
            search_clear_button: Locator::css(
                "div[aria-label='New chat'] button span[data-icon='x-alt']",
            ),
            search_back_button: Locator::css(
                "div[aria-label='New chat'] header button span[data-icon='back']",
            ),
            compose_field: Locator::css(
                "#main footer div.lexical-rich-text-input div[contenteditable='true'] p",
            ),
            send_button: Locator::css("#main footer button span[data-icon='send']"),
            media_caption_field: Locator::css(
                "div[data-animate-media-caption] div[contenteditable='true'] p",
            ),
            media_send_button: Locator::css("div[role='button'] span[data-icon='send']"),
        }
    }
}

impl Selectors {
    /// Load overrides from a JSON file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read selectors file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parse selectors file {}", path.display()))
    }
}
