use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use podium_core::slot::UserReservation;
use serde_json::{json, Value};

use crate::error::{parse_id, AppError};
use crate::middleware::{require_user, AuthClaims};
use crate::speaker_bookings::BookingRef;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", get(my_bookings))
        .route("/book", post(book))
        .route("/delete", post(delete))
        .route_layer(from_fn_with_state(state, require_user))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<Vec<UserReservation>>, AppError> {
    Ok(Json(state.engine.user_reservations(claims.user_id).await?))
}

async fn book(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    WithRejection(Json(req), _): WithRejection<Json<BookingRef>, AppError>,
) -> Result<(StatusCode, Json<UserReservation>), AppError> {
    let slot_id = parse_id(&req.booking_id)?;
    let reservation = state.engine.reserve_for_user(claims.user_id, slot_id).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    WithRejection(Json(req), _): WithRejection<Json<BookingRef>, AppError>,
) -> Result<Json<Value>, AppError> {
    let slot_id = parse_id(&req.booking_id)?;
    let reservation = state
        .engine
        .cancel_user_reservation(claims.user_id, slot_id)
        .await?;

    Ok(Json(json!({
        "message": "Reservation deleted",
        "reservation": reservation,
    })))
}
