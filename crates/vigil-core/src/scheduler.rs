use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::clock;
use crate::engine::UpdateEngine;
use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::settings::SettingsStore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

/// Background loop that fires update checks at the configured times.
///
/// The wall clock is polled rather than alarm-scheduled: a 30 second poll
/// against minute-granularity targets means a match is seen at least once
/// while the minute is current, and the date-qualified dedup key keeps it
/// from firing twice within the same minute. A tick missed because the host
/// slept through the minute is simply skipped.
pub struct Scheduler {
    engine: Arc<UpdateEngine>,
    settings: Arc<dyn SettingsStore>,
}

impl Scheduler {
    pub fn new(engine: Arc<UpdateEngine>, settings: Arc<dyn SettingsStore>) -> Self {
        Self { engine, settings }
    }

    /// Runs until the shutdown signal flips. Tick failures back off to a
    /// longer sleep instead of terminating the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!("scheduler started");
        let mut last_fired: Option<String> = None;

        loop {
            let delay = match self.tick(&mut last_fired).await {
                Ok(()) => POLL_INTERVAL,
                Err(tick_error) => {
                    error!(%tick_error, "scheduler tick failed");
                    ERROR_BACKOFF
                }
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("scheduler stopped");
    }

    async fn tick(&self, last_fired: &mut Option<String>) -> CoreResult<()> {
        if !self.settings.auto_check()? {
            return Ok(());
        }

        let (slot_key, minute) = clock::local_minute();
        let morning = self.settings.morning_check()?;
        let afternoon = self.settings.afternoon_check()?;

        if !due(&minute, &morning, &afternoon, last_fired.as_deref(), &slot_key) {
            return Ok(());
        }
        *last_fired = Some(slot_key);

        info!(%minute, "scheduled update check");
        let engine = self.engine.clone();
        tokio::task::spawn_blocking(move || engine.check_updates(false, None, None))
            .await
            .map_err(|join_error| {
                CoreError::new(
                    CoreErrorKind::Internal,
                    format!("scheduled check task failed: {join_error}"),
                )
            })?;

        Ok(())
    }
}

/// A check is due on an exact minute-string match that has not fired yet.
fn due(
    minute: &str,
    morning: &str,
    afternoon: &str,
    last_fired: Option<&str>,
    slot_key: &str,
) -> bool {
    (minute == morning || minute == afternoon) && last_fired != Some(slot_key)
}
