//! API request and response data models.
//!
//! These models define the public JSON contract and are kept separate from the ledger's own
//! [`Reservation`](crate::reservations::Reservation) type.

pub mod reservations;
