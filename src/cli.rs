use crate::engine::driver::DriverLauncher;
use crate::engine::selectors::Selectors;
use crate::model::{default_profile_dir, CampaignStatus, RunConfig, StartRequest};
use crate::orchestrator::{process_run_completion, CampaignController};
use crate::recorder;
use crate::text_summary;
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "wa-campaign",
    version,
    about = "Send a personalised message to every contact in a CSV file through WhatsApp Web"
)]
pub struct Cli {
    /// CSV file: header row, then identifier and message body per row
    #[arg(long, required_unless_present = "list_logs")]
    pub contacts: Option<PathBuf>,

    /// Paste the clipboard into each chat and send the body as its caption
    #[arg(long)]
    pub with_media: bool,

    /// Skip the first N contacts of the file
    #[arg(long, default_value_t = 0)]
    pub start_from: usize,

    /// Print the final status as JSON
    #[arg(long)]
    pub json: bool,

    /// List recent outcome logs and exit
    #[arg(long)]
    pub list_logs: bool,

    /// How many log files --list-logs shows
    #[arg(long, default_value_t = recorder::RECENT_LOG_LIMIT)]
    pub log_limit: usize,

    /// Directory for the sent/not-sent logs
    #[arg(long, default_value = "logs")]
    pub logs_dir: PathBuf,

    /// Browser profile directory (keeps the QR login between runs)
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,

    /// Run the browser without a window (only once already logged in)
    #[arg(long)]
    pub headless: bool,

    /// Path to the Chrome/Chromium executable
    #[arg(long)]
    pub chrome: Option<PathBuf>,

    /// Messaging client URL
    #[arg(long, default_value = "https://web.whatsapp.com")]
    pub client_url: String,

    /// Prefix applied to identifiers that do not start with '+'
    #[arg(long, default_value = "+2")]
    pub dial_prefix: String,

    /// Wait for elements that are expected to appear
    #[arg(long, default_value = "30s")]
    pub element_timeout: humantime::Duration,

    /// Wait for each contact search probe
    #[arg(long, default_value = "500ms")]
    pub probe_timeout: humantime::Duration,

    /// Wait for the logged-in view per login attempt
    #[arg(long, default_value = "30s")]
    pub auth_timeout: humantime::Duration,

    /// Pause between login attempts
    #[arg(long, default_value = "25s")]
    pub auth_cooldown: humantime::Duration,

    /// JSON file overriding the element locators
    #[arg(long)]
    pub selectors: Option<PathBuf>,

    /// How often progress is polled
    #[arg(long, default_value = "1s")]
    pub poll_interval: humantime::Duration,

    /// Debug logging (RUST_LOG still wins when set)
    #[arg(long, short)]
    pub verbose: bool,
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<RunConfig> {
    let selectors = match args.selectors.as_deref() {
        Some(path) => Selectors::load(path)?,
        None => Selectors::default(),
    };
    Ok(RunConfig {
        client_url: args.client_url.clone(),
        profile_dir: args.profile_dir.clone().unwrap_or_else(default_profile_dir),
        headless: args.headless,
        chrome_executable: args.chrome.clone(),
        logs_dir: args.logs_dir.clone(),
        dial_prefix: args.dial_prefix.clone(),
        element_timeout: Duration::from(args.element_timeout),
        probe_timeout: Duration::from(args.probe_timeout),
        auth_timeout: Duration::from(args.auth_timeout),
        auth_cooldown: Duration::from(args.auth_cooldown),
        with_media: args.with_media,
        selectors,
        ..RunConfig::default()
    })
}

#[cfg(feature = "browser")]
fn launcher() -> Arc<dyn DriverLauncher> {
    Arc::new(crate::engine::chromium::ChromiumLauncher)
}

#[cfg(not(feature = "browser"))]
fn launcher() -> Arc<dyn DriverLauncher> {
    Arc::new(NoBrowser)
}

/// Launcher for builds without a browser driver. Log listing still works;
/// starting a campaign ends in `error`.
#[cfg(not(feature = "browser"))]
struct NoBrowser;

#[cfg(not(feature = "browser"))]
#[async_trait::async_trait]
impl DriverLauncher for NoBrowser {
    async fn launch(
        &self,
        _cfg: &RunConfig,
    ) -> crate::engine::driver::DriverResult<Arc<dyn crate::engine::driver::UiDriver>> {
        Err(crate::engine::driver::DriverError::Launch(
            "built without the `browser` feature".to_string(),
        ))
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args)?;
    let logs_dir = cfg.logs_dir.clone();
    let controller = CampaignController::new(cfg, launcher());
    if args.list_logs {
        return list_logs(&controller, &args);
    }
    let contacts_path = args
        .contacts
        .clone()
        .context("--contacts is required")?;

    let total = controller
        .start(StartRequest {
            contacts_path: contacts_path.clone(),
            with_media: args.with_media,
            start_from: args.start_from,
        })
        .with_context(|| format!("cannot start campaign from {}", contacts_path.display()))?;

    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stderr(format!(
        "Loaded {total} contacts from {}. Press Ctrl-C to stop.",
        contacts_path.display()
    )));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut ticker = tokio::time::interval(Duration::from(args.poll_interval));
    let mut last_line = String::new();
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                let _ = out_tx.send(OutputLine::Stderr("Stopping…".into()));
                controller.stop().await;
                break;
            }
            _ = ticker.tick() => {
                let status = controller.status();
                let line = text_summary::progress_line(&status);
                if line != last_line {
                    let _ = out_tx.send(OutputLine::Stderr(line.clone()));
                    last_line = line;
                }
                if status.status != CampaignStatus::Running {
                    break;
                }
            }
        }
    }

    let report = controller.wait().await.context("campaign task failed")?;
    let run = process_run_completion(&logs_dir, controller.status(), report);

    if args.json {
        let out = serde_json::to_string_pretty(&run.status)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    } else {
        for line in text_summary::build_text_summary(&run).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;

    if run.status.status == CampaignStatus::Error {
        anyhow::bail!("{}", run.status.message);
    }
    Ok(())
}

fn list_logs(controller: &CampaignController, args: &Cli) -> Result<()> {
    let logs = controller.logs(args.log_limit)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&logs)?);
    } else {
        for line in text_summary::build_logs_listing(&logs).lines {
            println!("{line}");
        }
    }
    Ok(())
}
