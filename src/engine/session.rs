//! Session controller: gets the browser to a logged-in messaging client.
//!
//! Logging in needs a person to scan a code, which can take arbitrarily long,
//! so the retry loop has no attempt limit. It ends on success or when the stop
//! signal is raised; the signal is checked once per cooldown cycle.

use super::driver::{DriverResult, UiDriver};
use super::CampaignObserver;
use crate::model::{RunConfig, SessionState};
use crate::recorder;
use crate::status::StopSignal;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthOutcome {
    /// Carries the run key used to name the outcome logs.
    Authenticated { run_key: String },
    StoppedByUser,
}

/// What one navigate-and-poll attempt observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    LoggedIn,
    AwaitingScan,
}

pub(crate) struct SessionController<'a> {
    driver: &'a dyn UiDriver,
    cfg: &'a RunConfig,
    stop: StopSignal,
    observer: &'a dyn CampaignObserver,
    state: SessionState,
}

impl<'a> SessionController<'a> {
    pub fn new(
        driver: &'a dyn UiDriver,
        cfg: &'a RunConfig,
        stop: StopSignal,
        observer: &'a dyn CampaignObserver,
    ) -> Self {
        Self {
            driver,
            cfg,
            stop,
            observer,
            state: SessionState::NotStarted,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub async fn authenticate(&mut self) -> AuthOutcome {
        self.observer
            .session_message("Opening the messaging client… scan the QR code if asked.");
        let mut attempt: u32 = 0;
        loop {
            if self.stop.is_set() {
                return AuthOutcome::StoppedByUser;
            }
            attempt += 1;
            self.state = SessionState::AwaitingAuthentication;

            match self.try_login().await {
                Ok(Attempt::LoggedIn) => {
                    info!(attempt, "logged in");
                    self.state = SessionState::Authenticated;
                    self.observer.session_message("Logged in. Loading chats…");
                    if self.stop.sleep(self.cfg.login_settle).await {
                        return AuthOutcome::StoppedByUser;
                    }
                    return AuthOutcome::Authenticated {
                        run_key: recorder::run_key_now(),
                    };
                }
                Ok(Attempt::AwaitingScan) => {
                    info!(attempt, "waiting for QR code to be scanned");
                    self.observer
                        .session_message("Waiting for the QR code to be scanned…");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "login attempt failed, retrying");
                    self.observer
                        .session_message("Could not reach the messaging client, retrying…");
                }
            }

            if self.stop.sleep(self.cfg.auth_cooldown).await {
                return AuthOutcome::StoppedByUser;
            }
        }
    }

    async fn try_login(&self) -> DriverResult<Attempt> {
        self.driver.navigate(&self.cfg.client_url).await?;
        let ready = self
            .driver
            .wait_for(&self.cfg.selectors.authenticated, self.cfg.auth_timeout)
            .await?;
        Ok(if ready {
            Attempt::LoggedIn
        } else {
            Attempt::AwaitingScan
        })
    }

    /// After a failed contact lookup: confirm the main view is back, and if
    /// the session was lost, log in again (keeping the original run key).
    pub async fn restore_main_view(&mut self) -> bool {
        match self
            .driver
            .wait_for(&self.cfg.selectors.authenticated, self.cfg.element_timeout)
            .await
        {
            Ok(true) => true,
            Ok(false) | Err(_) => {
                warn!("main view not restored, logging in again");
                matches!(self.authenticate().await, AuthOutcome::Authenticated { .. })
            }
        }
    }

    /// Close the browser. Safe to call on every exit path.
    pub async fn release(&mut self) {
        if let Err(e) = self.driver.close().await {
            warn!(error = %e, "closing browser failed");
        }
        self.state = SessionState::Closed;
    }
}
