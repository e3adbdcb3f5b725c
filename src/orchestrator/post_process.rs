//! Post-run processing utilities.
//!
//! Reads the run's outcome logs back so the report reflects what actually
//! landed on disk, not just the engine's in-memory tally.

use crate::engine::CampaignReport;
use crate::model::SharedStatus;
use crate::recorder;
use std::path::{Path, PathBuf};

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub status: SharedStatus,
    pub report: Option<CampaignReport>,
    pub sent: Vec<String>,
    pub not_sent: Vec<String>,
    pub log_paths: Vec<PathBuf>,
    /// Problems reading the logs back; reported, never fatal.
    pub messages: Vec<String>,
}

/// Combine the final status with the run's outcome logs.
pub(crate) fn process_run_completion(
    logs_dir: &Path,
    status: SharedStatus,
    report: Option<CampaignReport>,
) -> ProcessedRun {
    let mut out = ProcessedRun {
        status,
        report,
        sent: Vec::new(),
        not_sent: Vec::new(),
        log_paths: Vec::new(),
        messages: Vec::new(),
    };
    let Some(key) = out.report.as_ref().and_then(|r| r.run_key.clone()) else {
        return out;
    };

    let (sent_path, not_sent_path) = recorder::log_paths(logs_dir, &key);
    for (path, into) in [(sent_path, &mut out.sent), (not_sent_path, &mut out.not_sent)] {
        match recorder::read_identifiers(&path) {
            Ok(ids) => *into = ids,
            Err(e) => out.messages.push(format!("Reading {} failed: {e:#}", path.display())),
        }
        if path.exists() {
            out.log_paths.push(path);
        }
    }
    out
}
