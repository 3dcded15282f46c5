//! Test utilities for router-level tests.

use std::sync::Arc;

use axum_test::TestServer;

use crate::config::Config;
use crate::reservations::{ManualClock, ReservationEngine};

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        // The Prometheus recorder is process-global; router tests leave it alone
        enable_metrics: false,
        ..Default::default()
    }
}

/// Build a test server backed by a fresh ledger on a manual clock.
///
/// The engine must be kept alive for the duration of the test: dropping it stops the sweeper.
pub fn create_test_app() -> (TestServer, ReservationEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());

    let app = crate::Application::with_clock(create_test_config(), clock.clone()).expect("Failed to create application");
    let (server, engine) = app.into_test_server();

    (server, engine, clock)
}
