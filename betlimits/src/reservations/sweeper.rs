//! Background sweeper for expired reservations.
//!
//! Purely memory reclamation: [`ReservationLedger::reserved_amount`] already ignores expired
//! entries, so a late or skipped sweep never affects what callers see.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ledger::ReservationLedger;

/// Sweep `ledger` every `sweep_interval` until `shutdown` is cancelled.
pub async fn run_sweeper(ledger: Arc<ReservationLedger>, sweep_interval: Duration, shutdown: CancellationToken) {
    info!("Starting reservation sweeper with {:?} interval", sweep_interval);

    // First sweep one full period after start; a fresh ledger has nothing to reclaim
    let mut interval = tokio::time::interval_at(Instant::now() + sweep_interval, sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Reservation sweeper shutting down");
                break;
            }
            _ = interval.tick() => {
                let swept = ledger.sweep_expired();
                if swept > 0 {
                    debug!(swept, remaining = ledger.len(), "Swept expired reservations");
                }
            }
        }
    }
}
