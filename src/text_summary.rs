//! Text summary builder for CLI output.
//!
//! This module formats human-readable lines for the end-of-run report and the
//! logs listing.

use crate::model::{LogKind, OutcomeLog, SharedStatus};
use crate::orchestrator::ProcessedRun;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// One-line progress for the polling loop.
pub(crate) fn progress_line(status: &SharedStatus) -> String {
    if status.current_contact.is_empty() {
        format!("[{}/{}] {}", status.progress, status.total, status.message)
    } else {
        format!(
            "[{}/{}] {} ({})",
            status.progress, status.total, status.message, status.current_contact
        )
    }
}

/// Build the end-of-run report.
pub(crate) fn build_text_summary(run: &ProcessedRun) -> TextSummary {
    let status = &run.status;
    let mut lines = vec![
        format!("Status: {} - {}", status.status.as_str(), status.message),
        format!("Processed: {}/{}", status.progress, status.total),
    ];
    if status.with_media {
        lines.push("Mode: media with caption".to_string());
    }
    if let Some(started) = status.started_at.as_deref() {
        lines.push(format!("Started: {started}"));
    }

    if let Some(report) = run.report.as_ref() {
        lines.push(format!(
            "Sent: {}  Not sent: {}",
            run.sent.len(),
            run.not_sent.len()
        ));
        if report.recoveries > 0 {
            lines.push(format!("View recoveries: {}", report.recoveries));
        }
        if report.run_key.is_none() {
            lines.push("Session never logged in; nothing was sent.".to_string());
        }
    }
    if !run.not_sent.is_empty() {
        lines.push(format!("Not sent to: {}", run.not_sent.join(", ")));
    }
    for path in &run.log_paths {
        lines.push(format!("Log: {}", path.display()));
    }
    lines.extend(run.messages.iter().cloned());

    TextSummary { lines }
}

/// Build the `--list-logs` output.
pub(crate) fn build_logs_listing(logs: &[OutcomeLog]) -> TextSummary {
    if logs.is_empty() {
        return TextSummary {
            lines: vec!["No outcome logs yet.".to_string()],
        };
    }
    let lines = logs
        .iter()
        .map(|log| {
            let kind = match log.kind {
                LogKind::Sent => "sent",
                LogKind::NotSent => "not sent",
            };
            format!("{:<32} {:<8} {:>5}", log.filename, kind, log.count)
        })
        .collect();
    TextSummary { lines }
}
