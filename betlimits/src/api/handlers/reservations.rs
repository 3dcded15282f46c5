//! HTTP handlers for the limit-reservation endpoints.
//!
//! Each handler is a thin shim over [`ReservationLedger`](crate::reservations::ReservationLedger):
//! validation errors surface as 400, an unknown token on release as 404.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::reservations::{
        HealthResponse, ReleasePoolRequest, ReleasePoolResponse, ReserveLimitRequest, ReserveLimitResponse, ReservedAmountQuery,
        ReservedAmountResponse, ReservedAmountsRequest,
    },
    errors::{Error, Result},
    reservations::ledger::validate_play_key,
};

/// Hold an amount against a (draw, bet number) pair for the configured TTL.
#[tracing::instrument(skip_all, fields(draw_id = request.draw_id, betting_pool_id = request.betting_pool_id))]
pub async fn reserve_limit(
    State(state): State<AppState>,
    Json(request): Json<ReserveLimitRequest>,
) -> Result<(StatusCode, Json<ReserveLimitResponse>)> {
    let reservation = state
        .ledger
        .hold(request.draw_id, &request.bet_number, request.betting_pool_id, request.amount)?;
    let reserved_amount = state
        .ledger
        .reserved_amount(reservation.draw_id, &reservation.bet_number, None);

    Ok((StatusCode::CREATED, Json(ReserveLimitResponse::new(reservation, reserved_amount))))
}

/// Release a single reservation by its token.
#[tracing::instrument(skip_all)]
pub async fn release_reservation(State(state): State<AppState>, Path(reservation_id): Path<String>) -> Result<StatusCode> {
    if state.ledger.release(&reservation_id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::NotFound {
            resource: "Reservation".to_string(),
            id: reservation_id,
        })
    }
}

/// Release a betting pool's reservations, typically right after its ticket is saved.
#[tracing::instrument(skip_all, fields(betting_pool_id = request.betting_pool_id))]
pub async fn release_betting_pool(
    State(state): State<AppState>,
    Json(request): Json<ReleasePoolRequest>,
) -> Result<Json<ReleasePoolResponse>> {
    let released = state
        .ledger
        .release_all_for_betting_pool(request.betting_pool_id, request.plays.as_deref())?;

    Ok(Json(ReleasePoolResponse { released }))
}

#[tracing::instrument(skip_all, fields(draw_id = query.draw_id))]
pub async fn get_reserved_amount(
    State(state): State<AppState>,
    Query(query): Query<ReservedAmountQuery>,
) -> Result<Json<ReservedAmountResponse>> {
    let bet_number = validate_play_key(query.draw_id, &query.bet_number)?;

    let reserved_amount = state
        .ledger
        .reserved_amount(query.draw_id, bet_number, query.exclude_token.as_deref());

    Ok(Json(ReservedAmountResponse {
        draw_id: query.draw_id,
        bet_number: bet_number.to_string(),
        reserved_amount,
    }))
}

#[tracing::instrument(skip_all, fields(plays = request.plays.len()))]
pub async fn get_reserved_amounts(
    State(state): State<AppState>,
    Json(request): Json<ReservedAmountsRequest>,
) -> Result<Json<Vec<ReservedAmountResponse>>> {
    for play in &request.plays {
        validate_play_key(play.draw_id, &play.bet_number)?;
    }

    let amounts = state
        .ledger
        .reserved_amounts(&request.plays)
        .into_iter()
        .map(ReservedAmountResponse::from)
        .collect();

    Ok(Json(amounts))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        active_reservations: state.ledger.len(),
    })
}

#[cfg(test)]
mod tests {
    use crate::api::models::reservations::{
        HealthResponse, ReleasePoolResponse, ReserveLimitResponse, ReservedAmountResponse,
    };
    use crate::reservations::Clock;
    use crate::test_utils::create_test_app;
    use axum::http::StatusCode;
    use chrono::TimeDelta;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};

    async fn reserve(
        server: &axum_test::TestServer,
        draw_id: i32,
        bet_number: &str,
        betting_pool_id: i32,
        amount: &str,
    ) -> ReserveLimitResponse {
        let response = server
            .post("/api/limit-reservations/reserve")
            .json(&json!({
                "draw_id": draw_id,
                "bet_number": bet_number,
                "betting_pool_id": betting_pool_id,
                "amount": amount,
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json()
    }

    #[tokio::test]
    async fn test_reserve_returns_token_and_running_total() {
        let (server, _engine, clock) = create_test_app();

        let first = reserve(&server, 7, "07", 100, "40").await;
        assert_eq!(first.reserved_amount, Decimal::from(40));
        assert_eq!(first.expires_at, clock.now() + TimeDelta::minutes(3));

        let second = reserve(&server, 7, " 07 ", 200, "35").await;
        assert_eq!(second.bet_number, "07");
        assert_eq!(second.reserved_amount, Decimal::from(75));
        assert_ne!(first.reservation_id, second.reservation_id);
    }

    #[tokio::test]
    async fn test_reserve_rejects_invalid_input() {
        let (server, _engine, _clock) = create_test_app();

        let response = server
            .post("/api/limit-reservations/reserve")
            .json(&json!({
                "draw_id": 7,
                "bet_number": "   ",
                "betting_pool_id": 100,
                "amount": "10",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("bet_number"));

        let response = server
            .post("/api/limit-reservations/reserve")
            .json(&json!({
                "draw_id": 7,
                "bet_number": "07",
                "betting_pool_id": 100,
                "amount": "-1",
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_release_reservation() {
        let (server, _engine, _clock) = create_test_app();
        let held = reserve(&server, 7, "07", 100, "40").await;

        server
            .delete(&format!("/api/limit-reservations/{}", held.reservation_id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // Second release is a miss
        server
            .delete(&format!("/api/limit-reservations/{}", held.reservation_id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_release_swept_reservation_is_not_found() {
        let (server, engine, clock) = create_test_app();
        let held = reserve(&server, 7, "07", 100, "40").await;

        clock.advance(TimeDelta::minutes(3));
        assert_eq!(engine.ledger().sweep_expired(), 1);

        server
            .delete(&format!("/api/limit-reservations/{}", held.reservation_id))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_release_pool_scoped_to_plays() {
        let (server, _engine, _clock) = create_test_app();
        reserve(&server, 7, "07", 100, "10").await;
        reserve(&server, 7, "08", 100, "10").await;
        reserve(&server, 7, "07", 200, "10").await;

        let response = server
            .post("/api/limit-reservations/release-pool")
            .json(&json!({
                "betting_pool_id": 100,
                "plays": [{ "draw_id": 7, "bet_number": "07" }],
            }))
            .await;
        response.assert_status_ok();
        let body: ReleasePoolResponse = response.json();
        assert_eq!(body.released, 1);

        // Unscoped release takes the rest of the pool
        let response = server
            .post("/api/limit-reservations/release-pool")
            .json(&json!({ "betting_pool_id": 100 }))
            .await;
        let body: ReleasePoolResponse = response.json();
        assert_eq!(body.released, 1);

        let response = server
            .get("/api/limit-reservations/reserved-amount")
            .add_query_param("draw_id", 7)
            .add_query_param("bet_number", "07")
            .await;
        let body: ReservedAmountResponse = response.json();
        assert_eq!(body.reserved_amount, Decimal::from(10));
    }

    #[tokio::test]
    async fn test_release_pool_rejects_non_positive_id() {
        let (server, _engine, _clock) = create_test_app();

        server
            .post("/api/limit-reservations/release-pool")
            .json(&json!({ "betting_pool_id": 0 }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_release_pool_rejects_malformed_plays() {
        let (server, engine, _clock) = create_test_app();
        reserve(&server, 7, "07", 100, "10").await;

        server
            .post("/api/limit-reservations/release-pool")
            .json(&json!({
                "betting_pool_id": 100,
                "plays": [
                    { "draw_id": 7, "bet_number": "07" },
                    { "draw_id": 7, "bet_number": "  " },
                ],
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        assert_eq!(engine.ledger().len(), 1);
    }

    #[tokio::test]
    async fn test_reserved_amount_rejects_invalid_play_key() {
        let (server, _engine, _clock) = create_test_app();

        for draw_id in [0, -1] {
            server
                .get("/api/limit-reservations/reserved-amount")
                .add_query_param("draw_id", draw_id)
                .add_query_param("bet_number", "07")
                .await
                .assert_status(StatusCode::BAD_REQUEST);
        }

        server
            .get("/api/limit-reservations/reserved-amount")
            .add_query_param("draw_id", 7)
            .add_query_param("bet_number", "  ")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reserved_amounts_rejects_invalid_play_key() {
        let (server, _engine, _clock) = create_test_app();

        let response = server
            .post("/api/limit-reservations/reserved-amounts")
            .json(&json!({
                "plays": [
                    { "draw_id": 7, "bet_number": "07" },
                    { "draw_id": 7, "bet_number": "  " },
                ],
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].as_str().unwrap().contains("bet_number"));

        server
            .post("/api/limit-reservations/reserved-amounts")
            .json(&json!({ "plays": [{ "draw_id": -1, "bet_number": "07" }] }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_reserved_amount_with_exclude_token() {
        let (server, _engine, _clock) = create_test_app();
        let own = reserve(&server, 7, "07", 100, "40").await;
        reserve(&server, 7, "07", 200, "35").await;

        let response = server
            .get("/api/limit-reservations/reserved-amount")
            .add_query_param("draw_id", 7)
            .add_query_param("bet_number", "07")
            .add_query_param("exclude_token", own.reservation_id.as_str())
            .await;
        response.assert_status_ok();
        let body: ReservedAmountResponse = response.json();
        assert_eq!(body.reserved_amount, Decimal::from(35));
    }

    #[tokio::test]
    async fn test_reserved_amount_ignores_expired() {
        let (server, _engine, clock) = create_test_app();
        reserve(&server, 7, "07", 100, "40").await;

        clock.advance(TimeDelta::minutes(3));

        let response = server
            .get("/api/limit-reservations/reserved-amount")
            .add_query_param("draw_id", 7)
            .add_query_param("bet_number", "07")
            .await;
        let body: ReservedAmountResponse = response.json();
        assert_eq!(body.reserved_amount, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_reserved_amounts_batch() {
        let (server, _engine, _clock) = create_test_app();
        reserve(&server, 7, "07", 100, "40").await;
        reserve(&server, 8, "07", 100, "5").await;

        let response = server
            .post("/api/limit-reservations/reserved-amounts")
            .json(&json!({
                "plays": [
                    { "draw_id": 7, "bet_number": "07" },
                    { "draw_id": 8, "bet_number": "07" },
                    { "draw_id": 9, "bet_number": "07" },
                ],
            }))
            .await;
        response.assert_status_ok();
        let body: Vec<ReservedAmountResponse> = response.json();
        let amounts: Vec<Decimal> = body.iter().map(|entry| entry.reserved_amount).collect();
        assert_eq!(amounts, vec![Decimal::from(40), Decimal::from(5), Decimal::ZERO]);
    }

    #[tokio::test]
    async fn test_health_reports_active_reservations() {
        let (server, _engine, _clock) = create_test_app();
        reserve(&server, 7, "07", 100, "40").await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        let body: HealthResponse = response.json();
        assert_eq!(body.status, "ok");
        assert_eq!(body.active_reservations, 1);
    }
}
