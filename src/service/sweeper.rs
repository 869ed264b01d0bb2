use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{config::BookingConfig, service::booking_service::BookingService};

/// Periodically fails bookings stuck in pending payment so their seats and
/// zone units return to sale. Returns `None` when disabled in configuration.
pub fn spawn_pending_sweeper(
    booking_service: Arc<BookingService>,
    config: &BookingConfig,
) -> Option<JoinHandle<()>> {
    if config.sweep_interval_secs == 0 || config.pending_timeout_minutes <= 0 {
        tracing::info!("Pending booking sweeper disabled");
        return None;
    }

    let timeout = chrono::Duration::minutes(config.pending_timeout_minutes);
    let period = Duration::from_secs(config.sweep_interval_secs);

    tracing::info!(
        "Pending booking sweeper running every {}s, timeout {} minutes",
        config.sweep_interval_secs,
        config.pending_timeout_minutes
    );

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match booking_service.fail_stale_pending(timeout).await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Released {} stale pending bookings", count),
                Err(e) => tracing::error!("Pending booking sweep failed: {:?}", e),
            }
        }
    }))
}
