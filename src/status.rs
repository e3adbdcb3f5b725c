//! Shared campaign status and the cooperative stop signal.
//!
//! [`StatusBoard`] is the only channel between the engine's task and whoever
//! watches it. Every write happens inside one short critical section and every
//! read returns a full copy, so observers never see a half-applied update.

use crate::engine::CampaignObserver;
use crate::model::{CampaignStatus, ContactOutcome, ContactRecord, SharedStatus, TerminalStatus};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative cancellation flag. Cloning shares the same flag.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Debug, Default)]
struct StopInner {
    flag: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag. Returns `true` only for the call that raised it.
    pub fn request(&self) -> bool {
        let first = !self.inner.flag.swap(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
        first
    }

    pub fn is_set(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `dur`, waking early if a stop is requested.
    /// Returns whether the stop flag is set afterwards.
    pub async fn sleep(&self, dur: Duration) -> bool {
        if dur.is_zero() {
            return self.is_set();
        }
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_set() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(dur) => {}
            _ = notified => {}
        }
        self.is_set()
    }
}

/// Lock-guarded [`SharedStatus`] plus the active run's id and [`StopSignal`].
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    state: Arc<Mutex<Board>>,
}

#[derive(Debug, Default)]
struct Board {
    status: SharedStatus,
    run: u64,
    stop: StopSignal,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Consistent copy of the current status.
    pub fn read(&self) -> SharedStatus {
        self.lock().status.clone()
    }

    /// Raise the active run's stop flag. Idempotent.
    pub fn request_stop(&self) {
        let stop = self.lock().stop.clone();
        if stop.request() {
            tracing::info!("stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.lock().status.status == CampaignStatus::Running
    }

    /// Move to `running` unless a campaign already is. The check, the
    /// transition and the new run's id and stop flag share one critical
    /// section so two starts cannot both win.
    pub fn begin_run(&self, total: usize, with_media: bool, started_at: String) -> Option<RunHandle> {
        let mut guard = self.lock();
        if guard.status.status == CampaignStatus::Running {
            return None;
        }
        guard.status = SharedStatus {
            status: CampaignStatus::Running,
            progress: 0,
            total,
            current_contact: String::new(),
            message: "Starting campaign…".to_string(),
            started_at: Some(started_at),
            with_media,
        };
        guard.run += 1;
        guard.stop = StopSignal::new();
        Some(RunHandle {
            board: self.clone(),
            run: guard.run,
            stop: guard.stop.clone(),
        })
    }

    /// Authoritative idle published by the stop action.
    pub fn force_idle(&self, message: &str) {
        let mut guard = self.lock();
        guard.status.status = CampaignStatus::Idle;
        guard.status.message = message.to_string();
    }

    /// Back to the initial shape. Refused while a campaign is running.
    pub fn reset(&self) -> bool {
        let mut guard = self.lock();
        if guard.status.status == CampaignStatus::Running {
            return false;
        }
        guard.status = SharedStatus::default();
        true
    }
}

/// One run's view of the board. Its writes land only while that run is
/// still the active one and still `running`, so a run that outlives a Stop
/// cannot touch the status of the run started after it.
#[derive(Debug, Clone)]
pub struct RunHandle {
    board: StatusBoard,
    run: u64,
    stop: StopSignal,
}

impl RunHandle {
    pub fn id(&self) -> u64 {
        self.run
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    fn write<F: FnOnce(&mut SharedStatus)>(&self, update: F) -> bool {
        let mut guard = self.board.lock();
        if guard.run != self.run || guard.status.status != CampaignStatus::Running {
            return false;
        }
        update(&mut guard.status);
        if guard.status.progress > guard.status.total {
            guard.status.progress = guard.status.total;
        }
        true
    }

    /// Publish the terminal state, unless something else ended the run
    /// first (a forced idle from Stop must not be overwritten).
    pub fn finish(&self, terminal: &TerminalStatus) -> bool {
        self.write(|s| {
            s.status = terminal.status();
            s.message = terminal.to_message();
            s.current_contact.clear();
        })
    }
}

impl CampaignObserver for RunHandle {
    fn session_message(&self, message: &str) {
        self.write(|s| s.message = message.to_string());
    }

    fn contact_started(&self, _position: usize, contact: &ContactRecord) {
        self.write(|s| {
            s.current_contact = contact.identifier.clone();
            s.message = format!("Sending to {}…", contact.identifier);
        });
    }

    fn contact_finished(&self, _position: usize, _contact: &ContactRecord, _outcome: ContactOutcome) {
        self.write(|s| s.progress += 1);
    }

    fn campaign_finished(&self, terminal: &TerminalStatus) {
        self.finish(terminal);
    }
}
