//! Bet-limit reservations.
//!
//! - [`ledger`]: the concurrent reservation table and its queries
//! - [`sweeper`]: periodic removal of expired reservations
//! - [`clock`]: injectable time source
//!
//! [`ReservationEngine`] ties the ledger and its sweeper to one owned lifecycle: start it once at
//! service start, hand [`ReservationEngine::ledger`] to whoever needs it, and call
//! [`ReservationEngine::shutdown`] on the way out.
//!
//! Reservations live in process memory only. Two service instances do not see each other's
//! holds, so this component must run as a single instance per deployment.

pub mod clock;
pub mod ledger;
pub mod sweeper;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::info;

use crate::config::ReservationsConfig;
use crate::errors::Result;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ledger::{Reservation, ReservationLedger};

/// Owns a [`ReservationLedger`] and the sweeper task that reclaims its expired entries.
///
/// Dropping the engine cancels the sweeper; [`shutdown`](Self::shutdown) additionally waits for
/// it to finish.
pub struct ReservationEngine {
    ledger: Arc<ReservationLedger>,
    sweeper: JoinHandle<()>,
    shutdown_token: CancellationToken,
    _drop_guard: DropGuard,
}

impl ReservationEngine {
    /// Build the ledger and spawn its sweeper on the current tokio runtime.
    pub fn start(config: &ReservationsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let ledger = Arc::new(ReservationLedger::new(config, clock)?);

        let shutdown_token = CancellationToken::new();
        let drop_guard = shutdown_token.clone().drop_guard();
        let sweeper = tokio::spawn(sweeper::run_sweeper(
            ledger.clone(),
            config.sweep_interval,
            shutdown_token.clone(),
        ));

        info!(ttl = ?config.ttl, sweep_interval = ?config.sweep_interval, "Reservation engine started");

        Ok(Self {
            ledger,
            sweeper,
            shutdown_token,
            _drop_guard: drop_guard,
        })
    }

    pub fn ledger(&self) -> Arc<ReservationLedger> {
        self.ledger.clone()
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown_token.cancel();
        if let Err(e) = self.sweeper.await {
            tracing::warn!("Reservation sweeper ended abnormally: {}", e);
        }
        info!(abandoned = self.ledger.len(), "Reservation engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use rust_decimal::Decimal;
    use std::time::Duration;

    fn test_config() -> ReservationsConfig {
        ReservationsConfig {
            ttl: Duration::from_secs(180),
            sweep_interval: Duration::from_millis(10),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_engine_sweeps_and_shuts_down() {
        let clock = Arc::new(ManualClock::starting_now());
        let engine = ReservationEngine::start(&test_config(), clock.clone()).unwrap();
        let ledger = engine.ledger();

        ledger.reserve(7, "07", 1, Decimal::from(40)).unwrap();
        ledger.reserve(7, "07", 2, Decimal::from(35)).unwrap();
        assert_eq!(ledger.reserved_amount(7, "07", None), Decimal::from(75));

        clock.advance(TimeDelta::minutes(3));
        assert_eq!(ledger.reserved_amount(7, "07", None), Decimal::ZERO);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(ledger.is_empty());

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_isolated_engines_do_not_share_state() {
        let a = ReservationEngine::start(&test_config(), Arc::new(SystemClock)).unwrap();
        let b = ReservationEngine::start(&test_config(), Arc::new(SystemClock)).unwrap();

        a.ledger().reserve(1, "12", 1, Decimal::from(10)).unwrap();
        assert_eq!(b.ledger().reserved_amount(1, "12", None), Decimal::ZERO);

        a.shutdown().await;
        b.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_fails_to_start() {
        let config = ReservationsConfig {
            ttl: Duration::ZERO,
            ..test_config()
        };
        assert!(ReservationEngine::start(&config, Arc::new(SystemClock)).is_err());
    }
}
