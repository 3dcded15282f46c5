//! Common type definitions shared by the ledger and the HTTP surface.
//!
//! # ID Types
//!
//! Draws and betting pools are owned by the back-office database, so the ledger only ever
//! sees their integer identifiers:
//!
//! - [`DrawId`]: lottery draw identifier
//! - [`BettingPoolId`]: selling outlet (banca) identifier
//!
//! Reservations are identified by an opaque [`ReservationToken`] minted by the ledger.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type DrawId = i32;
pub type BettingPoolId = i32;

/// Normalize a bet number the way every ledger lookup expects it.
///
/// Point-of-sale terminals send numbers with stray padding, so "07 " and "07" must land on the
/// same key. No numeric interpretation is performed.
pub fn normalize_bet_number(bet_number: &str) -> &str {
    bet_number.trim()
}

/// The (draw, bet number) pair a reservation is held against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlayKey {
    pub draw_id: DrawId,
    pub bet_number: String,
}

impl PlayKey {
    pub fn new(draw_id: DrawId, bet_number: impl AsRef<str>) -> Self {
        Self {
            draw_id,
            bet_number: normalize_bet_number(bet_number.as_ref()).to_string(),
        }
    }

    /// Compare against a raw pair without allocating.
    pub fn matches(&self, draw_id: DrawId, bet_number: &str) -> bool {
        self.draw_id == draw_id && normalize_bet_number(&self.bet_number) == bet_number
    }
}

impl fmt::Display for PlayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.draw_id, self.bet_number)
    }
}

/// Opaque handle returned by a reservation and used to release it later.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationToken(String);

impl ReservationToken {
    /// Mint a fresh random token (UUID v4, hex without dashes).
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ReservationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets the ledger's maps be queried with a plain `&str`
impl Borrow<str> for ReservationToken {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ReservationToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Abbreviate a token to its first 8 characters for more readable logs and traces
pub fn abbrev_token(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
