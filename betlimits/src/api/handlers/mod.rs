//! HTTP request handlers for all API endpoints.

pub mod reservations;
