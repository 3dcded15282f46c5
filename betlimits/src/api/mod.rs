//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//!
//! # API Structure
//!
//! - **Reservations** (`/api/limit-reservations/*`): reserve, release, bulk release and
//!   reserved-amount queries against the in-memory ledger
//! - **Health** (`/healthz`): liveness plus the number of entries held
//! - **Metrics** (`/metrics`): Prometheus exposition, when enabled
//!
//! The limit policy itself (comparing reserved plus sold against a configured limit) is not
//! served here; callers combine [`reserved_amount`](handlers::reservations::get_reserved_amount)
//! with their own sales totals.

pub mod handlers;
pub mod models;
