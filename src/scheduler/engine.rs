use super::Poller;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Main polling loop. Polls immediately, then once per `interval`.
/// Runs until the task is dropped.
pub async fn run_poll_loop(poller: Poller, interval: Duration) {
    info!(interval_secs = interval.as_secs(), "Poller started");

    let mut ticker = tokio::time::interval(interval);
    // A slow backend should not cause a burst of catch-up polls.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        poller.poll_once().await;
    }
}
