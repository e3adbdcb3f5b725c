//! Chromium-backed [`UiDriver`] over the DevTools protocol.

use super::driver::{DriverError, DriverLauncher, DriverResult, KeyChord, Locator, UiDriver};
use crate::model::RunConfig;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::element::Element;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Visible, enabled and attached.
const READY_JS: &str = "function() { \
    const r = this.getBoundingClientRect(); \
    return this.isConnected && !this.disabled && r.width > 0 && r.height > 0; \
}";

const CLEAR_JS: &str = "function() { \
    this.focus(); \
    if ('value' in this) { this.value = ''; } else { this.textContent = ''; } \
    this.dispatchEvent(new InputEvent('input', { bubbles: true })); \
}";

/// Launches Chromium on the persistent profile so a scanned login survives restarts.
pub struct ChromiumLauncher;

#[async_trait]
impl DriverLauncher for ChromiumLauncher {
    async fn launch(&self, cfg: &RunConfig) -> DriverResult<Arc<dyn UiDriver>> {
        std::fs::create_dir_all(&cfg.profile_dir).map_err(|e| {
            DriverError::Launch(format!(
                "cannot create profile dir {}: {e}",
                cfg.profile_dir.display()
            ))
        })?;

        let mut builder = BrowserConfig::builder()
            .user_data_dir(&cfg.profile_dir)
            .viewport(None)
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-session-crashed-bubble");
        if !cfg.headless {
            builder = builder.with_head();
        }
        if let Some(exe) = &cfg.chrome_executable {
            builder = builder.chrome_executable(exe);
        }
        let config = builder.build().map_err(DriverError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "devtools handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(DriverError::Launch(e.to_string()));
            }
        };
        debug!(profile = %cfg.profile_dir.display(), "browser launched");

        Ok(Arc::new(ChromiumDriver {
            session: Mutex::new(Some(Session {
                browser,
                page,
                handler_task,
            })),
        }))
    }
}

struct Session {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

pub struct ChromiumDriver {
    session: Mutex<Option<Session>>,
}

impl ChromiumDriver {
    /// The page handle is cloned out so no lock is held across an await.
    fn page(&self) -> DriverResult<Page> {
        let guard = self.session.lock().unwrap_or_else(|p| p.into_inner());
        guard
            .as_ref()
            .map(|s| s.page.clone())
            .ok_or(DriverError::Closed)
    }

    async fn find(page: &Page, locator: &Locator) -> Result<Element, CdpError> {
        match locator {
            Locator::Css(sel) => page.find_element(sel.as_str()).await,
            Locator::XPath(expr) => page.find_xpath(expr.as_str()).await,
        }
    }

    async fn element(&self, locator: &Locator) -> DriverResult<Element> {
        let page = self.page()?;
        Self::find(&page, locator)
            .await
            .map_err(|e| element_error(locator, e))
    }

    async fn is_ready(element: &Element) -> bool {
        match element.call_js_fn(READY_JS, false).await {
            Ok(ret) => ret
                .result
                .value
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

fn element_error(locator: &Locator, e: impl std::fmt::Display) -> DriverError {
    DriverError::Element {
        locator: locator.to_string(),
        reason: e.to_string(),
    }
}

fn key_event(
    kind: DispatchKeyEventType,
    chord: KeyChord,
) -> Result<DispatchKeyEventParams, String> {
    let builder = DispatchKeyEventParams::builder().r#type(kind);
    let builder = match chord {
        KeyChord::SoftReturn => builder
            .modifiers(8)
            .key("Enter")
            .code("Enter")
            .windows_virtual_key_code(13),
        KeyChord::Paste => builder
            .modifiers(2)
            .key("v")
            .code("KeyV")
            .windows_virtual_key_code(86)
            .commands(vec!["paste".to_string()]),
    };
    builder.build()
}

#[async_trait]
impl UiDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        let page = self.page()?;
        page.goto(url)
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> DriverResult<bool> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = Self::find(&page, locator).await {
                if Self::is_ready(&element).await {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            // Surface a torn-down session instead of polling a dead page.
            self.page()?;
        }
    }

    async fn click(&self, locator: &Locator) -> DriverResult<()> {
        let element = self.element(locator).await?;
        element
            .click()
            .await
            .map_err(|e| element_error(locator, e))?;
        Ok(())
    }

    async fn clear(&self, locator: &Locator) -> DriverResult<()> {
        let element = self.element(locator).await?;
        element
            .call_js_fn(CLEAR_JS, false)
            .await
            .map_err(|e| element_error(locator, e))?;
        Ok(())
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> DriverResult<()> {
        let element = self.element(locator).await?;
        element
            .focus()
            .await
            .map_err(|e| element_error(locator, e))?;
        element
            .type_str(text)
            .await
            .map_err(|e| element_error(locator, e))?;
        Ok(())
    }

    async fn press(&self, locator: &Locator, chord: KeyChord) -> DriverResult<()> {
        let element = self.element(locator).await?;
        element
            .focus()
            .await
            .map_err(|e| element_error(locator, e))?;

        let page = self.page()?;
        for kind in [DispatchKeyEventType::RawKeyDown, DispatchKeyEventType::KeyUp] {
            let params = key_event(kind, chord).map_err(DriverError::Input)?;
            page.execute(params)
                .await
                .map_err(|e| DriverError::Input(e.to_string()))?;
        }
        Ok(())
    }

    async fn close(&self) -> DriverResult<()> {
        let session = {
            let mut guard = self.session.lock().unwrap_or_else(|p| p.into_inner());
            guard.take()
        };
        let Some(mut session) = session else {
            return Ok(());
        };

        if let Err(e) = session.browser.close().await {
            warn!(error = %e, "browser did not acknowledge close");
        }
        if let Err(e) = session.browser.wait().await {
            warn!(error = %e, "waiting for browser exit failed");
        }
        session.handler_task.abort();
        debug!("browser closed");
        Ok(())
    }
}
