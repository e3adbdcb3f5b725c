#[cfg(feature = "browser")]
pub mod chromium;
pub mod cursor;
mod dispatcher;
pub mod driver;
mod pacing;
mod resolver;
pub mod selectors;
mod session;
#[cfg(test)]
pub(crate) mod testing;

use crate::model::{ContactOutcome, ContactRecord, RunConfig, TerminalStatus};
use crate::recorder::OutcomeRecorder;
use crate::status::StopSignal;
use cursor::CampaignCursor;
use dispatcher::MessageDispatcher;
use driver::{DriverError, UiDriver};
use pacing::Pacer;
use resolver::ContactResolver;
use session::{AuthOutcome, SessionController};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Receives progress from the runner's per-contact step.
pub trait CampaignObserver: Send + Sync {
    fn session_message(&self, message: &str);
    fn contact_started(&self, position: usize, contact: &ContactRecord);
    fn contact_finished(&self, position: usize, contact: &ContactRecord, outcome: ContactOutcome);
    fn campaign_finished(&self, terminal: &TerminalStatus);
}

/// Failures that end a run with `error` status.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("cannot write outcome log: {0}")]
    Recorder(#[from] std::io::Error),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CampaignError {
    /// Short message for the status surface; raw detail only goes to the log.
    pub fn user_message(&self) -> String {
        match self {
            CampaignError::Recorder(_) => {
                "Campaign aborted: the outcome logs could not be written.".to_string()
            }
            CampaignError::Driver(_) => {
                "Campaign aborted: the browser session stopped responding.".to_string()
            }
        }
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignReport {
    pub terminal: TerminalStatus,
    pub processed: usize,
    pub sent: usize,
    pub not_sent: usize,
    pub recoveries: usize,
    /// Key of the outcome logs; `None` if the session never authenticated.
    pub run_key: Option<String>,
}

#[derive(Debug, Default)]
struct Tally {
    processed: usize,
    sent: usize,
    not_sent: usize,
    recoveries: usize,
    run_key: Option<String>,
}

/// The campaign runner: one instance per run, on its own task.
pub struct CampaignEngine {
    cfg: RunConfig,
    driver: Arc<dyn UiDriver>,
    observer: Arc<dyn CampaignObserver>,
    stop: StopSignal,
}

impl CampaignEngine {
    pub fn new(
        cfg: RunConfig,
        driver: Arc<dyn UiDriver>,
        observer: Arc<dyn CampaignObserver>,
        stop: StopSignal,
    ) -> Self {
        Self {
            cfg,
            driver,
            observer,
            stop,
        }
    }

    /// Run the campaign to a terminal state. The driver is released on every
    /// exit path, and a raised stop signal outranks any error.
    pub async fn run(self, contacts: &[ContactRecord], start_from: usize) -> CampaignReport {
        let mut tally = Tally::default();
        let mut session = SessionController::new(
            self.driver.as_ref(),
            &self.cfg,
            self.stop.clone(),
            self.observer.as_ref(),
        );
        let result = self
            .drive(&mut session, contacts, start_from, &mut tally)
            .await;

        if result.is_ok() && !self.stop.is_set() {
            let _ = self.stop.sleep(self.cfg.teardown_grace).await;
        }
        let reached = session.state();
        session.release().await;

        let terminal = match result {
            _ if self.stop.is_set() => TerminalStatus::Stopped,
            Ok(()) => TerminalStatus::Completed,
            Err(e) => {
                error!(error = %e, "campaign aborted");
                TerminalStatus::Error(e.user_message())
            }
        };
        info!(
            status = terminal.status().as_str(),
            processed = tally.processed,
            sent = tally.sent,
            not_sent = tally.not_sent,
            session = ?reached,
            "campaign finished"
        );
        self.observer.campaign_finished(&terminal);

        CampaignReport {
            terminal,
            processed: tally.processed,
            sent: tally.sent,
            not_sent: tally.not_sent,
            recoveries: tally.recoveries,
            run_key: tally.run_key,
        }
    }

    /// Returns `Ok` both on completion and when a stop is observed.
    async fn drive(
        &self,
        session: &mut SessionController<'_>,
        contacts: &[ContactRecord],
        start_from: usize,
        tally: &mut Tally,
    ) -> Result<(), CampaignError> {
        let cfg = &self.cfg;
        let driver = self.driver.as_ref();
        let observer = self.observer.as_ref();

        let run_key = match session.authenticate().await {
            AuthOutcome::Authenticated { run_key } => run_key,
            AuthOutcome::StoppedByUser => return Ok(()),
        };
        let recorder = OutcomeRecorder::new(&cfg.logs_dir, &run_key)?;
        tally.run_key = Some(run_key);

        let pacer = Pacer::new(cfg.pacing, self.stop.clone());
        let dispatcher = MessageDispatcher {
            driver,
            selectors: &cfg.selectors,
            resolver: ContactResolver {
                driver,
                selectors: &cfg.selectors,
                pacer: &pacer,
                dial_prefix: &cfg.dial_prefix,
                element_timeout: cfg.element_timeout,
                probe_timeout: cfg.probe_timeout,
            },
            pacer: &pacer,
            element_timeout: cfg.element_timeout,
            with_media: cfg.with_media,
        };

        let mut cursor = CampaignCursor::new(start_from, contacts.len());
        while !cursor.is_exhausted() {
            if self.stop.is_set() {
                info!(position = cursor.position(), "stop observed");
                return Ok(());
            }
            let position = cursor.position();
            let contact = &contacts[position];
            observer.contact_started(position, contact);
            info!(contact = %contact.identifier, position, "sending");

            let outcome = dispatcher.send(contact).await;
            // A stop that tore the browser down mid-send is not a contact failure.
            if outcome == ContactOutcome::Failed && self.stop.is_set() {
                return Ok(());
            }

            recorder.record(&contact.identifier, outcome.is_failure())?;
            tally.processed += 1;
            if outcome.is_failure() {
                tally.not_sent += 1;
            } else {
                tally.sent += 1;
            }
            observer.contact_finished(position, contact, outcome);
            cursor.commit();

            if outcome == ContactOutcome::Unreachable {
                // The search UI may be left half-open: rebuild from the main
                // view, then carry on at the cursor.
                tally.recoveries += 1;
                warn!(
                    contact = %contact.identifier,
                    resume_at = cursor.position(),
                    recoveries = tally.recoveries,
                    "contact unreachable, restoring main view"
                );
                observer.session_message("Contact not found, returning to the main view…");
                if !session.restore_main_view().await {
                    return Ok(());
                }
            }

            pacer.between_contacts().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{fast_config, ScriptedDriver};
    use crate::model::{CampaignStatus, SharedStatus};
    use crate::recorder::{log_paths, read_identifiers};
    use crate::status::{RunHandle, StatusBoard};
    use std::path::Path;
    use std::sync::Mutex;

    /// Forwards to a run's board and keeps every intermediate snapshot.
    struct Tap {
        board: StatusBoard,
        run: RunHandle,
        seen: Mutex<Vec<SharedStatus>>,
        finished: Mutex<usize>,
    }

    impl Tap {
        fn new(board: StatusBoard, run: RunHandle) -> Self {
            Self {
                board,
                run,
                seen: Mutex::new(Vec::new()),
                finished: Mutex::new(0),
            }
        }

        fn snap(&self) {
            self.seen.lock().unwrap().push(self.board.read());
        }
    }

    impl CampaignObserver for Tap {
        fn session_message(&self, message: &str) {
            self.run.session_message(message);
            self.snap();
        }
        fn contact_started(&self, position: usize, contact: &ContactRecord) {
            self.run.contact_started(position, contact);
            self.snap();
        }
        fn contact_finished(&self, position: usize, contact: &ContactRecord, outcome: ContactOutcome) {
            self.run.contact_finished(position, contact, outcome);
            *self.finished.lock().unwrap() += 1;
            self.snap();
        }
        fn campaign_finished(&self, terminal: &TerminalStatus) {
            self.run.campaign_finished(terminal);
            self.snap();
        }
    }

    fn contacts(ids: &[&str]) -> Vec<ContactRecord> {
        ids.iter()
            .map(|id| ContactRecord {
                identifier: id.to_string(),
                body: format!("hello {id}"),
            })
            .collect()
    }

    struct Harness {
        board: StatusBoard,
        tap: Arc<Tap>,
        driver: Arc<ScriptedDriver>,
        stop: StopSignal,
        cfg: RunConfig,
    }

    impl Harness {
        fn new(logs: &Path, total: usize, script: impl FnOnce(StopSignal) -> ScriptedDriver) -> Self {
            let board = StatusBoard::new();
            let run = board.begin_run(total, false, "t0".into()).unwrap();
            Self {
                driver: Arc::new(script(run.stop_signal())),
                stop: run.stop_signal(),
                tap: Arc::new(Tap::new(board.clone(), run)),
                board,
                cfg: fast_config(logs),
            }
        }

        async fn run(&self, list: &[ContactRecord], start_from: usize) -> CampaignReport {
            let engine = CampaignEngine::new(
                self.cfg.clone(),
                self.driver.clone(),
                self.tap.clone(),
                self.stop.clone(),
            );
            engine.run(list, start_from).await
        }
    }

    fn logs(report: &CampaignReport, dir: &Path) -> (Vec<String>, Vec<String>) {
        let (sent, not_sent) = log_paths(dir, report.run_key.as_deref().unwrap());
        (
            read_identifiers(&sent).unwrap(),
            read_identifiers(&not_sent).unwrap(),
        )
    }

    #[tokio::test]
    async fn completes_and_records_every_contact() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3"]);
        let h = Harness::new(dir.path(), list.len(), |_| ScriptedDriver::new());

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Completed);
        let status = h.board.read();
        assert_eq!(status.status, CampaignStatus::Completed);
        assert_eq!(status.progress, 3);
        assert_eq!(status.progress, *h.tap.finished.lock().unwrap());
        let (sent, not_sent) = logs(&report, dir.path());
        assert_eq!(sent, vec!["1", "2", "3"]);
        assert!(not_sent.is_empty());
        assert!(h.driver.is_closed());
    }

    #[tokio::test]
    async fn unreachable_contact_is_logged_once_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3"]);
        let h = Harness::new(dir.path(), list.len(), |_| {
            ScriptedDriver::new().unreachable("+22")
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Completed);
        assert_eq!(report.recoveries, 1);
        let (sent, not_sent) = logs(&report, dir.path());
        assert_eq!(sent, vec!["1", "3"]);
        assert_eq!(not_sent, vec!["2"]);
        assert_eq!(h.board.read().progress, 3);
    }

    #[tokio::test]
    async fn repeated_recoveries_neither_resend_nor_skip() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3", "4", "5"]);
        let h = Harness::new(dir.path(), list.len(), |_| {
            ScriptedDriver::new().unreachable("+22").unreachable("+23")
        });

        let report = h.run(&list, 0).await;

        let (sent, not_sent) = logs(&report, dir.path());
        assert_eq!(sent, vec!["1", "4", "5"]);
        assert_eq!(not_sent, vec!["2", "3"]);
        assert_eq!(report.recoveries, 2);
        let sel = h.driver.selectors().clone();
        assert_eq!(h.driver.clicks_on(&sel.send_button), 3);
    }

    #[tokio::test]
    async fn progress_never_exceeds_total() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3", "4"]);
        let h = Harness::new(dir.path(), list.len(), |_| {
            ScriptedDriver::new().unreachable("+23")
        });

        h.run(&list, 0).await;

        let seen = h.tap.seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|s| s.progress <= s.total && s.total == 4));
    }

    #[tokio::test]
    async fn failed_send_goes_to_not_sent_log() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2"]);
        let sel = crate::engine::selectors::Selectors::default();
        let h = Harness::new(dir.path(), list.len(), |_| {
            ScriptedDriver::new().broken(sel.send_button)
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Completed);
        let (sent, not_sent) = logs(&report, dir.path());
        assert!(sent.is_empty());
        assert_eq!(not_sent, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn stop_is_observed_at_the_next_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3"]);
        let h = Harness::new(dir.path(), list.len(), |stop| {
            ScriptedDriver::new().stop_after_sends(1, stop)
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Stopped);
        assert_eq!(report.processed, 1);
        let (sent, not_sent) = logs(&report, dir.path());
        assert_eq!(sent, vec!["1"]);
        assert!(not_sent.is_empty());
        let status = h.board.read();
        assert_eq!(status.status, CampaignStatus::Stopped);
        assert_eq!(status.progress, 1);
        assert!(h.driver.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_login_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1"]);
        let h = Harness::new(dir.path(), list.len(), |stop| {
            ScriptedDriver::new()
                .auth_misses(usize::MAX)
                .stop_on_navigate(2, stop)
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Stopped);
        assert_eq!(report.run_key, None);
        assert_eq!(report.processed, 0);
        assert!(h.driver.is_closed());
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn unwritable_logs_end_in_error_and_release_driver() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("logs");
        std::fs::write(&blocker, "not a directory").unwrap();
        let list = contacts(&["1"]);
        let h = Harness::new(&blocker, list.len(), |_| ScriptedDriver::new());

        let report = h.run(&list, 0).await;

        match &report.terminal {
            TerminalStatus::Error(msg) => assert!(msg.contains("outcome logs")),
            other => panic!("expected error, got {other:?}"),
        }
        let status = h.board.read();
        assert_eq!(status.status, CampaignStatus::Error);
        assert!(!status.message.contains("os error"));
        assert!(h.driver.is_closed());
    }

    #[tokio::test]
    async fn send_failure_during_stop_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2"]);
        let send = crate::engine::selectors::Selectors::default().send_button;
        let h = Harness::new(dir.path(), list.len(), |stop| {
            ScriptedDriver::new()
                .broken(send.clone())
                .on_click(send, move || {
                    stop.request();
                })
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Stopped);
        assert_eq!(report.processed, 0);
        let (sent, not_sent) = logs(&report, dir.path());
        assert!(sent.is_empty());
        assert!(not_sent.is_empty());
        assert_eq!(h.board.read().status, CampaignStatus::Stopped);
        assert!(h.driver.is_closed());
    }

    #[tokio::test]
    async fn stop_outranks_a_log_write_failure() {
        let dir = tempfile::tempdir().unwrap();
        let logs_dir = dir.path().join("logs");
        let list = contacts(&["1", "2"]);
        let send = crate::engine::selectors::Selectors::default().send_button;
        let blocked = logs_dir.clone();
        let h = Harness::new(&logs_dir, list.len(), |stop| {
            ScriptedDriver::new().on_click(send, move || {
                stop.request();
                // Swap the logs directory for a file so the next append fails.
                std::fs::remove_dir_all(&blocked).unwrap();
                std::fs::write(&blocked, "not a directory").unwrap();
            })
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Stopped);
        let status = h.board.read();
        assert_eq!(status.status, CampaignStatus::Stopped);
        assert_eq!(status.message, TerminalStatus::Stopped.to_message());
        assert!(h.driver.is_closed());
    }

    #[tokio::test]
    async fn unreachable_contact_is_logged_even_when_stop_lands() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2"]);
        let clear = crate::engine::selectors::Selectors::default().search_clear_button;
        let h = Harness::new(dir.path(), list.len(), |stop| {
            ScriptedDriver::new()
                .unreachable("+21")
                .on_click(clear, move || {
                    stop.request();
                })
        });

        let report = h.run(&list, 0).await;

        assert_eq!(report.terminal, TerminalStatus::Stopped);
        assert_eq!(report.processed, 1);
        let (sent, not_sent) = logs(&report, dir.path());
        assert!(sent.is_empty());
        assert_eq!(not_sent, vec!["1"]);
    }

    #[tokio::test]
    async fn start_from_skips_earlier_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let list = contacts(&["1", "2", "3", "4"]);
        let h = Harness::new(dir.path(), list.len(), |_| ScriptedDriver::new());

        let report = h.run(&list, 2).await;

        let (sent, _) = logs(&report, dir.path());
        assert_eq!(sent, vec!["3", "4"]);
        assert_eq!(h.board.read().progress, 2);
    }

    #[tokio::test]
    async fn empty_list_completes_after_login() {
        let dir = tempfile::tempdir().unwrap();
        let h = Harness::new(dir.path(), 0, |_| ScriptedDriver::new());

        let report = h.run(&[], 0).await;

        assert_eq!(report.terminal, TerminalStatus::Completed);
        assert_eq!(h.driver.navigations(), 1);
        assert!(h.driver.is_closed());
    }
}
