//! Application-level orchestration.
//!
//! This module owns campaign lifecycle control (start/status/stop/reset/logs)
//! and post-run processing. The CLI calls into it so the engine never sees
//! presentation concerns.

mod controller;
mod post_process;

pub(crate) use controller::CampaignController;
pub(crate) use post_process::{process_run_completion, ProcessedRun};
