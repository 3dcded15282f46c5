//! Reservation ledger metrics.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Why a reservation left the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Single release by token
    Explicit,
    /// Bulk release for a betting pool
    BettingPool,
    /// Removed by the sweeper after expiry
    Expired,
}

impl ReleaseReason {
    fn as_label(self) -> &'static str {
        match self {
            ReleaseReason::Explicit => "explicit",
            ReleaseReason::BettingPool => "betting_pool",
            ReleaseReason::Expired => "expired",
        }
    }
}

/// Record a newly created reservation
pub fn record_reservation_created() {
    counter!("betlimits_reservations_created_total").increment(1);
}

/// Record reservations leaving the ledger
pub fn record_reservations_released(reason: ReleaseReason, count: usize) {
    if count == 0 {
        return;
    }
    counter!("betlimits_reservations_released_total", "reason" => reason.as_label()).increment(count as u64);
}

/// Record the number of entries physically held by the ledger
pub fn set_active_reservations(count: usize) {
    gauge!("betlimits_reservations_active").set(count as f64);
}

/// Record how long one sweep pass held the ledger
pub fn record_sweep_duration(elapsed: Duration) {
    histogram!("betlimits_sweep_duration_seconds").record(elapsed.as_secs_f64());
}
