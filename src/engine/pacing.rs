use crate::model::{DelayRange, PacingConfig};
use crate::status::StopSignal;
use rand::Rng;
use std::time::Duration;

/// Randomized human-like pauses. Every pause wakes early on a stop request.
#[derive(Debug, Clone)]
pub(crate) struct Pacer {
    cfg: PacingConfig,
    stop: StopSignal,
}

impl Pacer {
    pub fn new(cfg: PacingConfig, stop: StopSignal) -> Self {
        Self { cfg, stop }
    }

    pub async fn click_settle(&self) {
        self.pause(self.cfg.click_settle).await;
    }

    pub async fn before_compose(&self) {
        self.pause(self.cfg.before_compose).await;
    }

    pub async fn after_send(&self) {
        self.pause(self.cfg.after_send).await;
    }

    pub async fn between_contacts(&self) {
        self.pause(self.cfg.between_contacts).await;
    }

    async fn pause(&self, range: DelayRange) {
        let _ = self.stop.sleep(draw(range)).await;
    }
}

/// Uniform draw from `range`; a reversed range collapses to `min`.
pub(crate) fn draw(range: DelayRange) -> Duration {
    if range.max <= range.min {
        return range.min;
    }
    let ms = rand::thread_rng().gen_range(range.min.as_millis()..=range.max.as_millis());
    Duration::from_millis(ms as u64)
}
