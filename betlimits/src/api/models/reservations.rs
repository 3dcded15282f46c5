use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::reservations::Reservation;
use crate::types::{BettingPoolId, DrawId, PlayKey, ReservationToken};

/// Request payload for holding an amount against a bet number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveLimitRequest {
    pub draw_id: DrawId,
    /// Bet number as typed at the terminal; surrounding whitespace is ignored
    pub bet_number: String,
    pub betting_pool_id: BettingPoolId,
    pub amount: Decimal,
}

/// Response for a successful reservation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveLimitResponse {
    /// Token to pass back when releasing
    pub reservation_id: ReservationToken,
    pub draw_id: DrawId,
    pub bet_number: String,
    pub betting_pool_id: BettingPoolId,
    pub amount: Decimal,
    pub expires_at: DateTime<Utc>,
    /// Total reserved for the play key, this reservation included
    pub reserved_amount: Decimal,
}

impl ReserveLimitResponse {
    pub fn new(reservation: Reservation, reserved_amount: Decimal) -> Self {
        Self {
            reservation_id: reservation.token,
            draw_id: reservation.draw_id,
            bet_number: reservation.bet_number,
            betting_pool_id: reservation.betting_pool_id,
            amount: reservation.amount,
            expires_at: reservation.expires_at,
            reserved_amount,
        }
    }
}

/// Release every reservation held by a betting pool, optionally only those matching `plays`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePoolRequest {
    pub betting_pool_id: BettingPoolId,
    /// When present, only reservations for these play keys are released
    #[serde(default)]
    pub plays: Option<Vec<PlayKey>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleasePoolResponse {
    pub released: usize,
}

/// Query parameters for the reserved-amount lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedAmountQuery {
    pub draw_id: DrawId,
    pub bet_number: String,
    /// Leave this reservation out of the sum (e.g. the caller's own hold)
    #[serde(default)]
    pub exclude_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedAmountResponse {
    pub draw_id: DrawId,
    pub bet_number: String,
    pub reserved_amount: Decimal,
}

impl From<(PlayKey, Decimal)> for ReservedAmountResponse {
    fn from((play, reserved_amount): (PlayKey, Decimal)) -> Self {
        Self {
            draw_id: play.draw_id,
            bet_number: play.bet_number,
            reserved_amount,
        }
    }
}

/// Batch lookup: one entry per ticket line or per draw of a play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservedAmountsRequest {
    pub plays: Vec<PlayKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_reservations: usize,
}
