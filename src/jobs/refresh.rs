use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::app::error::LoadOutcome;
use crate::app::sync::SyncEngine;

/// Reload the active session on a fixed interval. Each tick is a single
/// attempt; a failed load waits for the next tick rather than retrying.
pub async fn run(engine: SyncEngine, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "notification refresh started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately; the session loads itself on sign-in.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if engine.current_user().is_none() {
            continue;
        }

        match engine.load().await {
            Ok(LoadOutcome::Applied { records, unread }) => {
                debug!(records, unread, "periodic refresh applied");
            }
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "periodic refresh failed");
            }
        }
    }
}
