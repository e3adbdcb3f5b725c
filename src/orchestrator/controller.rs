//! Campaign lifecycle controller.
//!
//! Owns start/status/stop/reset/logs for presentation layers. At most one
//! campaign runs at a time; its engine lives on its own task and talks back
//! only through the [`StatusBoard`].

use crate::contacts::{self, ContactFileError};
use crate::engine::driver::{DriverLauncher, UiDriver};
use crate::engine::{CampaignEngine, CampaignObserver, CampaignReport};
use crate::model::{ContactRecord, OutcomeLog, RunConfig, SharedStatus, StartRequest, TerminalStatus};
use crate::recorder;
use crate::status::{RunHandle, StatusBoard};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("a campaign is already running")]
    AlreadyRunning,

    #[error("cannot reset while a campaign is running")]
    CampaignRunning,

    #[error(transparent)]
    ContactFile(#[from] ContactFileError),

    #[error("cannot list outcome logs: {0:#}")]
    Logs(anyhow::Error),

    #[error("campaign task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The browser session of the active run, tagged with the run id, reachable
/// by the stop action.
type DriverSlot = Arc<Mutex<Option<(u64, Arc<dyn UiDriver>)>>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Empty the slot only if it still holds `run`'s driver.
fn release_slot(slot: &DriverSlot, run: u64) -> Option<Arc<dyn UiDriver>> {
    let mut guard = lock(slot);
    match guard.as_ref() {
        Some((owner, _)) if *owner == run => guard.take().map(|(_, driver)| driver),
        _ => None,
    }
}

pub struct CampaignController {
    board: StatusBoard,
    launcher: Arc<dyn DriverLauncher>,
    base: RunConfig,
    driver: DriverSlot,
    handle: Mutex<Option<JoinHandle<Option<CampaignReport>>>>,
}

impl CampaignController {
    pub fn new(base: RunConfig, launcher: Arc<dyn DriverLauncher>) -> Self {
        Self {
            board: StatusBoard::new(),
            launcher,
            base,
            driver: Arc::new(Mutex::new(None)),
            handle: Mutex::new(None),
        }
    }

    /// Parse the contact file and launch a run. Returns the contact count.
    pub fn start(&self, req: StartRequest) -> Result<usize, ControlError> {
        if self.board.is_running() {
            return Err(ControlError::AlreadyRunning);
        }
        let contacts = contacts::load(&req.contacts_path)?;
        let total = contacts.len();
        let Some(run) = self.board.begin_run(total, req.with_media, started_at_now()) else {
            return Err(ControlError::AlreadyRunning);
        };
        info!(
            run = run.id(),
            contacts = total,
            with_media = req.with_media,
            start_from = req.start_from,
            file = %req.contacts_path.display(),
            "campaign started"
        );

        let cfg = RunConfig {
            with_media: req.with_media,
            ..self.base.clone()
        };
        let inner = tokio::spawn(run_campaign(
            self.launcher.clone(),
            cfg,
            run.clone(),
            self.driver.clone(),
            contacts,
            req.start_from,
        ));

        // Supervisor: a panicking engine still ends in `error` with the browser released.
        let slot = self.driver.clone();
        let handle = tokio::spawn(async move {
            match inner.await {
                Ok(report) => report,
                Err(e) => {
                    error!(error = %e, "campaign task failed");
                    if let Some(driver) = release_slot(&slot, run.id()) {
                        let _ = driver.close().await;
                    }
                    run.finish(&TerminalStatus::Error(
                        "Campaign aborted unexpectedly.".to_string(),
                    ));
                    None
                }
            }
        });
        *lock(&self.handle) = Some(handle);
        Ok(total)
    }

    pub fn status(&self) -> SharedStatus {
        self.board.read()
    }

    /// Raise the stop signal, close the browser right away, and publish idle.
    /// Repeating it only republishes idle.
    pub async fn stop(&self) {
        self.board.request_stop();
        let driver = lock(&self.driver).take();
        if let Some((_, driver)) = driver {
            if let Err(e) = driver.close().await {
                warn!(error = %e, "closing browser on stop failed");
            }
        }
        self.board.force_idle(&TerminalStatus::Stopped.to_message());
    }

    pub fn reset(&self) -> Result<(), ControlError> {
        if self.board.reset() {
            Ok(())
        } else {
            Err(ControlError::CampaignRunning)
        }
    }

    pub fn logs(&self, limit: usize) -> Result<Vec<OutcomeLog>, ControlError> {
        recorder::list_recent(&self.base.logs_dir, limit).map_err(ControlError::Logs)
    }

    /// Wait for the current run's task. `None` if nothing was started or the
    /// run never reached the engine.
    pub async fn wait(&self) -> Result<Option<CampaignReport>, ControlError> {
        let handle = lock(&self.handle).take();
        match handle {
            Some(h) => Ok(h.await?),
            None => Ok(None),
        }
    }
}

async fn run_campaign(
    launcher: Arc<dyn DriverLauncher>,
    cfg: RunConfig,
    run: RunHandle,
    slot: DriverSlot,
    contacts: Vec<ContactRecord>,
    start_from: usize,
) -> Option<CampaignReport> {
    run.session_message("Launching browser…");
    let driver = match launcher.launch(&cfg).await {
        Ok(driver) => driver,
        Err(e) => {
            error!(error = %e, "browser launch failed");
            run.finish(&TerminalStatus::Error(
                "Could not start the browser.".to_string(),
            ));
            return None;
        }
    };
    *lock(&slot) = Some((run.id(), driver.clone()));

    let stop = run.stop_signal();
    let engine = CampaignEngine::new(cfg, driver, Arc::new(run.clone()), stop);
    let report = engine.run(&contacts, start_from).await;

    release_slot(&slot, run.id());
    Some(report)
}

fn started_at_now() -> String {
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
