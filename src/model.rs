use crate::engine::selectors::Selectors;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// One row of the contact file. Order in the file is the send order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRecord {
    pub identifier: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Idle,
    Running,
    Completed,
    Error,
    Stopped,
}

impl CampaignStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CampaignStatus::Idle => "idle",
            CampaignStatus::Running => "running",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Error => "error",
            CampaignStatus::Stopped => "stopped",
        }
    }
}

/// Snapshot of campaign progress as seen by status observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedStatus {
    pub status: CampaignStatus,
    pub progress: usize,
    pub total: usize,
    pub current_contact: String,
    pub message: String,
    pub started_at: Option<String>,
    pub with_media: bool,
}

impl Default for SharedStatus {
    fn default() -> Self {
        Self {
            status: CampaignStatus::Idle,
            progress: 0,
            total: 0,
            current_contact: String::new(),
            message: String::new(),
            started_at: None,
            with_media: false,
        }
    }
}

/// Result of one contact attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactOutcome {
    Sent,
    Failed,
    /// Neither search probe found the contact.
    Unreachable,
}

impl ContactOutcome {
    /// Whether the contact goes to the not-sent log.
    pub fn is_failure(self) -> bool {
        !matches!(self, ContactOutcome::Sent)
    }
}

/// How a campaign run ended, as decided by the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    /// Carries the user-facing message, never raw driver text.
    Error(String),
    Stopped,
}

impl TerminalStatus {
    pub fn status(&self) -> CampaignStatus {
        match self {
            TerminalStatus::Completed => CampaignStatus::Completed,
            TerminalStatus::Error(_) => CampaignStatus::Error,
            TerminalStatus::Stopped => CampaignStatus::Stopped,
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            TerminalStatus::Completed => "All messages processed.".to_string(),
            TerminalStatus::Error(msg) => msg.clone(),
            TerminalStatus::Stopped => "Campaign stopped by user.".to_string(),
        }
    }
}

/// Lifecycle of the authenticated browser session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    NotStarted,
    AwaitingAuthentication,
    Authenticated,
    Closed,
}

/// Inclusive range a randomized pause is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    #[serde(with = "humantime_serde")]
    pub min: Duration,
    #[serde(with = "humantime_serde")]
    pub max: Duration,
}

impl DelayRange {
    pub const fn millis(min: u64, max: u64) -> Self {
        Self {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    pub const fn zero() -> Self {
        Self::millis(0, 0)
    }
}

/// Randomized pauses that make the session look like a person typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingConfig {
    pub click_settle: DelayRange,
    pub before_compose: DelayRange,
    pub after_send: DelayRange,
    pub between_contacts: DelayRange,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            click_settle: DelayRange::millis(100, 200),
            before_compose: DelayRange::millis(400, 500),
            after_send: DelayRange::millis(400, 600),
            between_contacts: DelayRange::millis(3_000, 4_000),
        }
    }
}

impl PacingConfig {
    /// No pauses at all; used when timing is irrelevant.
    pub fn immediate() -> Self {
        Self {
            click_settle: DelayRange::zero(),
            before_compose: DelayRange::zero(),
            after_send: DelayRange::zero(),
            between_contacts: DelayRange::zero(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub client_url: String,
    pub profile_dir: PathBuf,
    pub headless: bool,
    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    pub logs_dir: PathBuf,
    pub dial_prefix: String,
    #[serde(with = "humantime_serde")]
    pub element_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub probe_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub auth_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub auth_cooldown: Duration,
    #[serde(with = "humantime_serde")]
    pub login_settle: Duration,
    #[serde(with = "humantime_serde")]
    pub teardown_grace: Duration,
    pub pacing: PacingConfig,
    pub with_media: bool,
    pub selectors: Selectors,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            client_url: "https://web.whatsapp.com".to_string(),
            profile_dir: default_profile_dir(),
            headless: false,
            chrome_executable: None,
            logs_dir: PathBuf::from("logs"),
            dial_prefix: "+2".to_string(),
            element_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(500),
            auth_timeout: Duration::from_secs(30),
            auth_cooldown: Duration::from_secs(25),
            login_settle: Duration::from_secs(5),
            teardown_grace: Duration::from_millis(3_500),
            pacing: PacingConfig::default(),
            with_media: false,
            selectors: Selectors::default(),
        }
    }
}

/// Browser profile location; keeps the QR login across restarts.
pub fn default_profile_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wa-campaign").join("profile"))
        .unwrap_or_else(|| PathBuf::from("browser-profile"))
}

/// Parameters accepted by the control surface's start action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    pub contacts_path: PathBuf,
    #[serde(default)]
    pub with_media: bool,
    #[serde(default)]
    pub start_from: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Sent,
    NotSent,
}

/// One outcome log file, read back for listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeLog {
    pub filename: String,
    pub kind: LogKind,
    pub count: usize,
    pub identifiers: Vec<String>,
}
