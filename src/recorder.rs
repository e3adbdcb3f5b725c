//! Append-only outcome logs.
//!
//! Each run writes `<key>_sent.txt` and `<key>_notsent.txt`, one identifier per
//! line, where `<key>` is the local time the session authenticated.

use crate::model::{LogKind, OutcomeLog};
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

const SENT_SUFFIX: &str = "_sent.txt";
const NOT_SENT_SUFFIX: &str = "_notsent.txt";

/// Default number of files returned by [`list_recent`].
pub const RECENT_LOG_LIMIT: usize = 20;

/// Log-file key for a run that authenticated now.
pub fn run_key_now() -> String {
    let fmt = time::macros::format_description!("[day]-[month]-[year]_[hour][minute][second]");
    let now = time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(fmt).unwrap_or_else(|_| "run".into())
}

pub struct OutcomeRecorder {
    sent_path: PathBuf,
    not_sent_path: PathBuf,
}

/// Sent and not-sent log paths for a run key.
pub fn log_paths(logs_dir: &Path, run_key: &str) -> (PathBuf, PathBuf) {
    (
        logs_dir.join(format!("{run_key}{SENT_SUFFIX}")),
        logs_dir.join(format!("{run_key}{NOT_SENT_SUFFIX}")),
    )
}

impl OutcomeRecorder {
    pub fn new(logs_dir: &Path, run_key: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let (sent_path, not_sent_path) = log_paths(logs_dir, run_key);
        Ok(Self {
            sent_path,
            not_sent_path,
        })
    }

    /// Append `identifier` to the sent or not-sent log.
    pub fn record(&self, identifier: &str, failed: bool) -> std::io::Result<()> {
        let path = if failed {
            &self.not_sent_path
        } else {
            &self.sent_path
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        writeln!(file, "{}", identifier.trim())
    }
}

fn kind_of(filename: &str) -> Option<LogKind> {
    if filename.ends_with(NOT_SENT_SUFFIX) {
        Some(LogKind::NotSent)
    } else if filename.ends_with(SENT_SUFFIX) {
        Some(LogKind::Sent)
    } else {
        None
    }
}

/// Read a log file back into identifiers, skipping blank lines.
pub fn read_identifiers(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Most recent outcome logs, newest file name first.
pub fn list_recent(logs_dir: &Path, limit: usize) -> Result<Vec<OutcomeLog>> {
    if !logs_dir.exists() {
        return Ok(Vec::new());
    }
    let mut names: Vec<String> = std::fs::read_dir(logs_dir)
        .with_context(|| format!("list {}", logs_dir.display()))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| kind_of(n).is_some())
        .collect();
    names.sort_by(|a, b| b.cmp(a));

    let mut out = Vec::new();
    for filename in names.into_iter().take(limit) {
        let Some(kind) = kind_of(&filename) else {
            continue;
        };
        let identifiers = read_identifiers(&logs_dir.join(&filename))?;
        out.push(OutcomeLog {
            filename,
            kind,
            count: identifiers.len(),
            identifiers,
        });
    }
    Ok(out)
}
