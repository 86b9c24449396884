use axum::{
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use podium_core::slot::{Slot, SpeakerReservation};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::bookings::{invalidate, reserve_speaker_slot, CreateSlotRequest};
use crate::error::{parse_id, AppError};
use crate::middleware::{require_speaker, AuthClaims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRef {
    pub booking_id: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/bookings", get(my_bookings))
        .route("/book", post(book))
        .route("/delete", post(delete))
        .route_layer(from_fn_with_state(state, require_speaker))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
) -> Result<Json<Vec<SpeakerReservation>>, AppError> {
    Ok(Json(state.engine.speaker_reservations(claims.user_id).await?))
}

async fn book(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateSlotRequest>, AppError>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    reserve_speaker_slot(&state, claims.user_id, req).await
}

async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    WithRejection(Json(req), _): WithRejection<Json<BookingRef>, AppError>,
) -> Result<Json<Value>, AppError> {
    let slot_id = parse_id(&req.booking_id)?;
    let slot = state
        .engine
        .cancel_speaker_reservation(claims.user_id, slot_id)
        .await?;
    invalidate(&state, Some(slot_id)).await;

    Ok(Json(json!({
        "message": "Booking deleted",
        "booking": slot,
    })))
}
