//! In-memory driver for exercising the engine without a browser.

use super::driver::{DriverError, DriverLauncher, DriverResult, KeyChord, Locator, UiDriver};
use super::selectors::Selectors;
use crate::model::RunConfig;
use crate::status::StopSignal;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Navigate(String),
    Click(Locator),
    Clear(Locator),
    Type(Locator, String),
    Press(Locator, KeyChord),
    Close,
}

#[derive(Default)]
struct Script {
    actions: Vec<Action>,
    /// Search text that matches neither probe.
    unreachable: HashSet<String>,
    /// Search text that only matches the "unknown number" probe.
    unsaved: HashSet<String>,
    /// Locators that never appear.
    absent: HashSet<Locator>,
    /// Locators whose click fails.
    broken: HashSet<Locator>,
    auth_misses: usize,
    navigate_errors: usize,
    last_search: String,
    closed: bool,
    /// Run on every click attempt at the locator, before it succeeds or fails.
    click_hooks: Vec<(Locator, Box<dyn FnMut() + Send>)>,
    stop_after_sends: Option<(usize, StopSignal)>,
    stop_on_navigate: Option<(usize, StopSignal)>,
}

pub(crate) struct ScriptedDriver {
    sel: Selectors,
    script: Mutex<Script>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self {
            sel: Selectors::default(),
            script: Mutex::new(Script::default()),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut Script) -> R) -> R {
        f(&mut self.script.lock().unwrap())
    }

    pub fn unreachable(self, search: &str) -> Self {
        self.with(|s| s.unreachable.insert(search.to_string()));
        self
    }

    pub fn unsaved(self, search: &str) -> Self {
        self.with(|s| s.unsaved.insert(search.to_string()));
        self
    }

    pub fn absent(self, locator: Locator) -> Self {
        self.with(|s| s.absent.insert(locator));
        self
    }

    pub fn broken(self, locator: Locator) -> Self {
        self.with(|s| s.broken.insert(locator));
        self
    }

    pub fn auth_misses(self, n: usize) -> Self {
        self.with(|s| s.auth_misses = n);
        self
    }

    pub fn navigate_errors(self, n: usize) -> Self {
        self.with(|s| s.navigate_errors = n);
        self
    }

    /// Raise `stop` as soon as the `n`th send button click happens.
    pub fn stop_after_sends(self, n: usize, stop: StopSignal) -> Self {
        self.with(|s| s.stop_after_sends = Some((n, stop)));
        self
    }

    pub fn on_click(self, locator: Locator, hook: impl FnMut() + Send + 'static) -> Self {
        self.with(|s| s.click_hooks.push((locator, Box::new(hook))));
        self
    }

    /// Raise `stop` on the `n`th navigation.
    pub fn stop_on_navigate(self, n: usize, stop: StopSignal) -> Self {
        self.with(|s| s.stop_on_navigate = Some((n, stop)));
        self
    }

    pub fn selectors(&self) -> &Selectors {
        &self.sel
    }

    pub fn actions(&self) -> Vec<Action> {
        self.with(|s| s.actions.clone())
    }

    pub fn clicks_on(&self, locator: &Locator) -> usize {
        self.with(|s| {
            s.actions
                .iter()
                .filter(|a| matches!(a, Action::Click(l) if l == locator))
                .count()
        })
    }

    pub fn navigations(&self) -> usize {
        self.with(|s| {
            s.actions
                .iter()
                .filter(|a| matches!(a, Action::Navigate(_)))
                .count()
        })
    }

    pub fn is_closed(&self) -> bool {
        self.with(|s| s.closed)
    }

    fn guard(s: &Script) -> DriverResult<()> {
        if s.closed {
            Err(DriverError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UiDriver for ScriptedDriver {
    async fn navigate(&self, url: &str) -> DriverResult<()> {
        self.with(|s| {
            Self::guard(s)?;
            s.actions.push(Action::Navigate(url.to_string()));
            let count = s.actions.iter().filter(|a| matches!(a, Action::Navigate(_))).count();
            if let Some((n, stop)) = &s.stop_on_navigate {
                if count == *n {
                    stop.request();
                }
            }
            if s.navigate_errors > 0 {
                s.navigate_errors -= 1;
                return Err(DriverError::Navigation("connection reset".into()));
            }
            Ok(())
        })
    }

    async fn wait_for(&self, locator: &Locator, _timeout: Duration) -> DriverResult<bool> {
        self.with(|s| {
            Self::guard(s)?;
            if s.absent.contains(locator) {
                return Ok(false);
            }
            if *locator == self.sel.authenticated && s.auth_misses > 0 {
                s.auth_misses -= 1;
                return Ok(false);
            }
            if *locator == self.sel.known_contact_result {
                let hit = !s.unreachable.contains(&s.last_search) && !s.unsaved.contains(&s.last_search);
                return Ok(hit);
            }
            if *locator == self.sel.unknown_number_result {
                return Ok(s.unsaved.contains(&s.last_search));
            }
            Ok(true)
        })
    }

    async fn click(&self, locator: &Locator) -> DriverResult<()> {
        self.with(|s| {
            Self::guard(s)?;
            for (target, hook) in s.click_hooks.iter_mut() {
                if target == locator {
                    hook();
                }
            }
            if s.broken.contains(locator) {
                return Err(DriverError::Element {
                    locator: locator.to_string(),
                    reason: "detached from DOM".into(),
                });
            }
            s.actions.push(Action::Click(locator.clone()));
            if *locator == self.sel.send_button || *locator == self.sel.media_send_button {
                let sends = s
                    .actions
                    .iter()
                    .filter(|a| {
                        matches!(a, Action::Click(l) if *l == self.sel.send_button || *l == self.sel.media_send_button)
                    })
                    .count();
                if let Some((n, stop)) = &s.stop_after_sends {
                    if sends == *n {
                        stop.request();
                    }
                }
            }
            Ok(())
        })
    }

    async fn clear(&self, locator: &Locator) -> DriverResult<()> {
        self.with(|s| {
            Self::guard(s)?;
            s.actions.push(Action::Clear(locator.clone()));
            Ok(())
        })
    }

    async fn type_text(&self, locator: &Locator, text: &str) -> DriverResult<()> {
        self.with(|s| {
            Self::guard(s)?;
            if *locator == self.sel.search_field {
                s.last_search = text.to_string();
            }
            s.actions.push(Action::Type(locator.clone(), text.to_string()));
            Ok(())
        })
    }

    async fn press(&self, locator: &Locator, chord: KeyChord) -> DriverResult<()> {
        self.with(|s| {
            Self::guard(s)?;
            s.actions.push(Action::Press(locator.clone(), chord));
            Ok(())
        })
    }

    async fn close(&self) -> DriverResult<()> {
        self.with(|s| {
            if !s.closed {
                s.closed = true;
                s.actions.push(Action::Close);
            }
            Ok(())
        })
    }
}

/// Hands out one pre-built [`ScriptedDriver`].
pub(crate) struct ScriptedLauncher {
    pub driver: Arc<ScriptedDriver>,
}

#[async_trait]
impl DriverLauncher for ScriptedLauncher {
    async fn launch(&self, _cfg: &RunConfig) -> DriverResult<Arc<dyn UiDriver>> {
        Ok(self.driver.clone())
    }
}

/// Config with every pause zeroed and logs under `logs_dir`.
pub(crate) fn fast_config(logs_dir: &std::path::Path) -> RunConfig {
    RunConfig {
        logs_dir: logs_dir.to_path_buf(),
        pacing: crate::model::PacingConfig::immediate(),
        login_settle: Duration::ZERO,
        teardown_grace: Duration::ZERO,
        ..RunConfig::default()
    }
}
