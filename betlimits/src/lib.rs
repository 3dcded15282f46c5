//! # betlimits: Bet-limit reservation ledger
//!
//! `betlimits` keeps a process-wide, in-memory ledger of provisional holds ("reservations") placed
//! against a lottery play key, a `(draw, bet number)` pair, while a ticket sale is in flight. At
//! any instant it can answer "how much money is currently committed, sold or about to be sold,
//! against this number for this draw?" for the part that is not yet sold.
//!
//! ## Overview
//!
//! A point-of-sale flow reserves one amount per bet line, asks for the reserved amount (merging
//! it with sold totals it already knows), decides whether to accept the ticket, and finally
//! releases its holds, either one by one or all at once for the selling betting pool. Holds that
//! are never released stop counting after their TTL and are physically evicted by a background
//! sweeper.
//!
//! The limit policy itself, authentication and persistence of sold tickets live outside this
//! crate. Reservations are not persisted and are not shared across instances: run a single
//! instance per back-office.
//!
//! ## Architecture
//!
//! - **Ledger** ([`reservations::ReservationLedger`]): the table of active reservations plus
//!   secondary indexes by play key and by betting pool, all behind one lock
//! - **Engine** ([`reservations::ReservationEngine`]): owns the ledger and its sweeper task
//! - **HTTP surface** ([`api`]): a thin axum router over the ledger
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use betlimits::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = betlimits::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     betlimits::telemetry::init_telemetry()?;
//!
//!     Application::new(config)?
//!         .serve(async {
//!             tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!         })
//!         .await
//! }
//! ```
//!
//! Embedding the ledger without HTTP:
//!
//! ```no_run
//! use std::sync::Arc;
//! use betlimits::{config::ReservationsConfig, reservations::{ReservationEngine, SystemClock}};
//! use rust_decimal::Decimal;
//!
//! # async fn example() -> betlimits::errors::Result<()> {
//! let engine = ReservationEngine::start(&ReservationsConfig::default(), Arc::new(SystemClock))?;
//! let ledger = engine.ledger();
//!
//! let token = ledger.reserve(7, "07", 100, Decimal::from(40))?;
//! assert_eq!(ledger.reserved_amount(7, "07", None), Decimal::from(40));
//! ledger.release(token.as_str());
//!
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod reservations;
pub mod telemetry;
pub mod types;

#[cfg(test)]
pub mod test_utils;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use bon::Builder;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub use config::Config;

use crate::api::handlers::reservations as handlers;
use crate::reservations::{Clock, ReservationEngine, ReservationLedger, SystemClock};

/// Application state shared across all request handlers.
///
/// - `ledger`: the reservation ledger owned by the running [`ReservationEngine`]
/// - `config`: Application configuration loaded from environment/files
/// - `metrics_handle`: Prometheus handle, present when metrics are enabled
#[derive(Clone, Builder)]
pub struct AppState {
    pub ledger: Arc<ReservationLedger>,
    pub config: Config,
    pub metrics_handle: Option<PrometheusHandle>,
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let reservation_routes = Router::new()
        .route("/reserve", post(handlers::reserve_limit))
        .route("/release-pool", post(handlers::release_betting_pool))
        .route("/reserved-amount", get(handlers::get_reserved_amount))
        .route("/reserved-amounts", post(handlers::get_reserved_amounts))
        .route("/{reservation_id}", delete(handlers::release_reservation));

    let mut router = Router::new()
        .route("/healthz", get(handlers::health))
        .nest("/api/limit-reservations", reservation_routes);

    if let Some(handle) = state.metrics_handle.clone() {
        router = router.route(
            "/metrics",
            get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Main application struct that owns the router and the reservation engine.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] starts the engine (ledger plus sweeper) and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, drains connections and stops the sweeper
pub struct Application {
    router: Router,
    config: Config,
    engine: ReservationEngine,
}

impl Application {
    /// Create a new application instance on the system clock. Must be called within a tokio runtime.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        debug!("Starting bet-limit reservations with configuration: {:#?}", config);

        let engine = ReservationEngine::start(&config.reservations, clock)?;

        let metrics_handle = if config.enable_metrics {
            Some(metrics::get_or_install_prometheus_handle()?)
        } else {
            None
        };

        let app_state = AppState::builder()
            .ledger(engine.ledger())
            .config(config.clone())
            .maybe_metrics_handle(metrics_handle)
            .build();

        let router = build_router(app_state);

        Ok(Self { router, config, engine })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> (axum_test::TestServer, ReservationEngine) {
        let server = axum_test::TestServer::new(self.router).expect("Failed to create test server");
        (server, self.engine)
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Bet-limit reservations listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        // Stop the sweeper and wait for it to finish its current pass
        self.engine.shutdown().await;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{create_test_app, create_test_config};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let (server, _engine, _clock) = create_test_app();
        server.get("/api/limit-reservations/nope/extra").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route_absent_when_disabled() {
        let (server, _engine, _clock) = create_test_app();
        server.get("/metrics").await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_metrics_route_renders_prometheus_text() {
        let config = Config {
            enable_metrics: true,
            ..create_test_config()
        };
        let app = Application::new(config).expect("Failed to create application");
        let (server, engine) = app.into_test_server();

        server
            .post("/api/limit-reservations/reserve")
            .json(&serde_json::json!({
                "draw_id": 1,
                "bet_number": "13",
                "betting_pool_id": 1,
                "amount": "5",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server.get("/metrics").await;
        response.assert_status_ok();
        assert!(response.text().contains("betlimits_reservations_created_total"));

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_application_rejects_zero_ttl() {
        let mut config = create_test_config();
        config.reservations.ttl = std::time::Duration::ZERO;
        assert!(Application::new(config).is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown_signal() {
        let app = Application::new(create_test_config()).expect("Failed to create application");
        // Resolves immediately: the server should bind, drain and return cleanly
        app.serve(async {}).await.expect("serve should return Ok");
    }
}
