//! The reservation ledger.
//!
//! A [`ReservationLedger`] provisionally holds money against a (draw, bet number) key while a
//! ticket sale is in flight. Callers reserve every candidate line, add the reserved total to the
//! amount already sold for that number, compare against the configured limit, and finally release
//! the holds once the ticket is saved or abandoned. Holds that are never released expire after the
//! configured TTL.
//!
//! All state lives behind a single [`parking_lot::RwLock`]: the primary table keyed by token plus
//! two secondary indexes (by play key and by betting pool). Every mutation updates the three maps
//! under the write lock, so concurrent reservations on the same key are never lost and a read
//! always sees a consistent snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::config::ReservationsConfig;
use crate::errors::{Error, Result};
use crate::metrics::reservations::{self as metrics, ReleaseReason};
use crate::reservations::clock::Clock;
use crate::types::{BettingPoolId, DrawId, PlayKey, ReservationToken, abbrev_token, normalize_bet_number};

/// A provisional hold of `amount` against a play key. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub token: ReservationToken,
    pub draw_id: DrawId,
    pub bet_number: String,
    pub betting_pool_id: BettingPoolId,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// A reservation counts toward the reserved amount strictly before its expiry instant.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn play_key(&self) -> PlayKey {
        PlayKey::new(self.draw_id, &self.bet_number)
    }

    fn matches_any(&self, plays: &[PlayKey]) -> bool {
        plays.iter().any(|play| play.matches(self.draw_id, &self.bet_number))
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    entries: HashMap<ReservationToken, Reservation>,
    by_play: HashMap<PlayKey, HashSet<ReservationToken>>,
    by_pool: HashMap<BettingPoolId, HashSet<ReservationToken>>,
}

impl LedgerState {
    fn insert(&mut self, reservation: Reservation) {
        self.by_play
            .entry(reservation.play_key())
            .or_default()
            .insert(reservation.token.clone());
        self.by_pool
            .entry(reservation.betting_pool_id)
            .or_default()
            .insert(reservation.token.clone());
        self.entries.insert(reservation.token.clone(), reservation);
    }

    fn remove(&mut self, token: &str) -> Option<Reservation> {
        let reservation = self.entries.remove(token)?;

        let play_key = reservation.play_key();
        if let Some(tokens) = self.by_play.get_mut(&play_key) {
            tokens.remove(token);
            if tokens.is_empty() {
                self.by_play.remove(&play_key);
            }
        }

        if let Some(tokens) = self.by_pool.get_mut(&reservation.betting_pool_id) {
            tokens.remove(token);
            if tokens.is_empty() {
                self.by_pool.remove(&reservation.betting_pool_id);
            }
        }

        Some(reservation)
    }

    /// Must be called with the write guard held.
    fn publish_active(&self) {
        metrics::set_active_reservations(self.entries.len());
    }

    fn live_sum(&self, key: &PlayKey, exclude: Option<&str>, now: DateTime<Utc>) -> Decimal {
        let Some(tokens) = self.by_play.get(key) else {
            return Decimal::ZERO;
        };

        tokens
            .iter()
            .filter(|token| exclude != Some(token.as_str()))
            .filter_map(|token| self.entries.get(token))
            .filter(|reservation| reservation.is_live_at(now))
            .map(|reservation| reservation.amount)
            .sum()
    }
}

/// Reject a play key no reservation could ever be held against. Returns the normalized bet number.
pub fn validate_play_key(draw_id: DrawId, bet_number: &str) -> Result<&str> {
    if draw_id <= 0 {
        return Err(Error::invalid_argument(format!("draw_id must be positive, got {draw_id}")));
    }

    let bet_number = normalize_bet_number(bet_number);
    if bet_number.is_empty() {
        return Err(Error::invalid_argument("bet_number must not be empty"));
    }

    Ok(bet_number)
}

fn validate_betting_pool(betting_pool_id: BettingPoolId) -> Result<()> {
    if betting_pool_id <= 0 {
        return Err(Error::invalid_argument(format!(
            "betting_pool_id must be positive, got {betting_pool_id}"
        )));
    }
    Ok(())
}

/// Reject input the ledger must never hold. Returns the normalized bet number.
fn validate_reservation(draw_id: DrawId, bet_number: &str, betting_pool_id: BettingPoolId, amount: Decimal) -> Result<&str> {
    let bet_number = validate_play_key(draw_id, bet_number)?;
    validate_betting_pool(betting_pool_id)?;
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::invalid_argument(format!("amount must not be negative, got {amount}")));
    }

    Ok(bet_number)
}

/// Process-wide table of in-flight bet reservations.
///
/// Construct one per service and share it behind an `Arc`. See [`super::ReservationEngine`] for
/// the owned component that also runs the expiry sweeper.
#[derive(Debug)]
pub struct ReservationLedger {
    state: RwLock<LedgerState>,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ReservationLedger {
    pub fn new(config: &ReservationsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let ttl = TimeDelta::from_std(config.ttl)
            .map_err(|e| Error::invalid_argument(format!("reservation ttl out of range: {e}")))?;
        if ttl <= TimeDelta::zero() {
            return Err(Error::invalid_argument("reservation ttl must be positive"));
        }

        Ok(Self {
            state: RwLock::new(LedgerState::default()),
            ttl,
            clock,
        })
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Hold `amount` against (`draw_id`, `bet_number`) for the configured TTL.
    ///
    /// The reservation is visible to [`reserved_amount`](Self::reserved_amount) as soon as this
    /// returns. Fails only on malformed input.
    pub fn reserve(
        &self,
        draw_id: DrawId,
        bet_number: &str,
        betting_pool_id: BettingPoolId,
        amount: Decimal,
    ) -> Result<ReservationToken> {
        self.hold(draw_id, bet_number, betting_pool_id, amount)
            .map(|reservation| reservation.token)
    }

    /// Same as [`reserve`](Self::reserve) but returns the stored reservation, expiry included.
    #[instrument(skip(self), fields(token), err)]
    pub fn hold(
        &self,
        draw_id: DrawId,
        bet_number: &str,
        betting_pool_id: BettingPoolId,
        amount: Decimal,
    ) -> Result<Reservation> {
        let bet_number = validate_reservation(draw_id, bet_number, betting_pool_id, amount)?;

        let created_at = self.clock.now();
        let mut reservation = Reservation {
            token: ReservationToken::generate(),
            draw_id,
            bet_number: bet_number.to_string(),
            betting_pool_id,
            amount,
            created_at,
            expires_at: created_at + self.ttl,
        };

        let active = {
            let mut state = self.state.write();
            while state.entries.contains_key(reservation.token.as_str()) {
                reservation.token = ReservationToken::generate();
            }
            state.insert(reservation.clone());
            state.publish_active();
            state.entries.len()
        };

        tracing::Span::current().record("token", abbrev_token(reservation.token.as_str()));
        debug!(expires_at = %reservation.expires_at, active, "Reserved limit");
        metrics::record_reservation_created();

        Ok(reservation)
    }

    /// Drop the reservation identified by `token`.
    ///
    /// Returns `false` when the token is unknown, which is expected when racing the sweeper.
    #[instrument(skip(self, token), fields(token = abbrev_token(token)))]
    pub fn release(&self, token: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let removed = state.remove(token);
            if removed.is_some() {
                state.publish_active();
            }
            removed
        };

        match removed {
            Some(reservation) => {
                debug!(play = %reservation.play_key(), amount = %reservation.amount, "Released reservation");
                metrics::record_reservations_released(ReleaseReason::Explicit, 1);
                true
            }
            None => {
                trace!("Reservation not found");
                false
            }
        }
    }

    /// Drop every reservation opened by `betting_pool_id`.
    ///
    /// When `plays` is given only reservations whose play key appears in it are dropped; the
    /// pool's other holds stay in place. Returns how many entries were removed.
    ///
    /// Fails with [`Error::InvalidArgument`] for a non-positive pool id or a malformed play key,
    /// without removing anything.
    #[instrument(skip(self, plays), fields(plays = ?plays.map(|p| p.len())), err)]
    pub fn release_all_for_betting_pool(&self, betting_pool_id: BettingPoolId, plays: Option<&[PlayKey]>) -> Result<usize> {
        validate_betting_pool(betting_pool_id)?;
        for play in plays.unwrap_or_default() {
            validate_play_key(play.draw_id, &play.bet_number)?;
        }

        let released = {
            let mut state = self.state.write();

            let doomed: Vec<ReservationToken> = match state.by_pool.get(&betting_pool_id) {
                Some(tokens) => tokens
                    .iter()
                    .filter(|token| match plays {
                        None => true,
                        Some(plays) => state
                            .entries
                            .get(token.as_str())
                            .is_some_and(|reservation| reservation.matches_any(plays)),
                    })
                    .cloned()
                    .collect(),
                None => Vec::new(),
            };

            let released = doomed.iter().filter(|token| state.remove(token.as_str()).is_some()).count();
            if released > 0 {
                state.publish_active();
            }
            released
        };

        if released > 0 {
            debug!(released, "Released betting pool reservations");
            metrics::record_reservations_released(ReleaseReason::BettingPool, released);
        }

        Ok(released)
    }

    /// Sum of live reservations on (`draw_id`, `bet_number`), optionally excluding one token.
    ///
    /// Expiry is checked against the clock on every call, so an expired reservation is never
    /// counted even if the sweeper has not removed it yet.
    pub fn reserved_amount(&self, draw_id: DrawId, bet_number: &str, exclude: Option<&str>) -> Decimal {
        let key = PlayKey::new(draw_id, bet_number);
        let state = self.state.read();
        state.live_sum(&key, exclude, self.clock.now())
    }

    /// [`reserved_amount`](Self::reserved_amount) for several play keys against one snapshot.
    pub fn reserved_amounts(&self, plays: &[PlayKey]) -> Vec<(PlayKey, Decimal)> {
        let keys: Vec<PlayKey> = plays.iter().map(|play| PlayKey::new(play.draw_id, &play.bet_number)).collect();

        let state = self.state.read();
        let now = self.clock.now();
        keys.into_iter()
            .map(|key| {
                let amount = state.live_sum(&key, None, now);
                (key, amount)
            })
            .collect()
    }

    /// Look up a live reservation. Expired entries are reported as absent.
    pub fn get(&self, token: &str) -> Option<Reservation> {
        let state = self.state.read();
        let now = self.clock.now();
        state.entries.get(token).filter(|r| r.is_live_at(now)).cloned()
    }

    /// Physically remove every reservation whose expiry has passed. Returns the count removed.
    pub fn sweep_expired(&self) -> usize {
        let started = Instant::now();
        let now = self.clock.now();

        let swept = {
            let mut state = self.state.write();
            let expired: Vec<ReservationToken> = state
                .entries
                .values()
                .filter(|reservation| !reservation.is_live_at(now))
                .map(|reservation| reservation.token.clone())
                .collect();

            for token in &expired {
                state.remove(token.as_str());
            }
            state.publish_active();
            expired.len()
        };

        metrics::record_sweep_duration(started.elapsed());
        metrics::record_reservations_released(ReleaseReason::Expired, swept);

        swept
    }

    /// Number of entries physically held, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }
}
