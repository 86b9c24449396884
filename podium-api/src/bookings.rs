use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use chrono::{DateTime, Utc};
use podium_core::bounded;
use podium_core::identity::Role;
use podium_core::slot::{Slot, TimeWindow};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::{parse_id, AppError};
use crate::middleware::{require_auth, require_speaker, AuthClaims};
use crate::state::AppState;

pub const ALL_BOOKINGS_KEY: &str = "bookings:all";

pub fn slot_key(id: &Ulid) -> String {
    format!("bookings:{}", id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
}

impl CreateSlotRequest {
    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.session_start_time, self.session_end_time)
    }
}

pub fn routes(state: AppState) -> Router<AppState> {
    let speaker_only = Router::new()
        .route("/create", post(create_booking))
        .route_layer(from_fn_with_state(state.clone(), require_speaker));

    let authenticated = Router::new()
        .route("/cancel/{id}", post(cancel_booking))
        .route_layer(from_fn_with_state(state, require_auth));

    Router::new()
        .route("/", get(list_bookings))
        .route("/{id}", get(get_booking))
        .merge(speaker_only)
        .merge(authenticated)
}

// ============================================================================
// Response cache (fails open)
// ============================================================================

async fn cache_read<T: serde::de::DeserializeOwned>(state: &AppState, key: &str) -> Option<T> {
    let io_timeout = state.business_rules.io_timeout();
    match bounded(io_timeout, "cache read", state.cache.get(key)).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => {
                debug!("Cache hit: {}", key);
                Some(value)
            }
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!("Cache read failed for {}, falling back to database: {}", key, e);
            None
        }
    }
}

async fn cache_write<T: serde::Serialize>(state: &AppState, key: &str, value: &T) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Could not serialize {} for cache: {}", key, e);
            return;
        }
    };
    let io_timeout = state.business_rules.io_timeout();
    let ttl = state.business_rules.cache_ttl_seconds;
    if let Err(e) = bounded(io_timeout, "cache write", state.cache.set_ex(key, &raw, ttl)).await {
        warn!("Cache write failed for {}: {}", key, e);
    }
}

/// Drops the listing and, when given, one slot entry.
pub async fn invalidate(state: &AppState, slot_id: Option<Ulid>) {
    let io_timeout = state.business_rules.io_timeout();
    let mut keys = vec![ALL_BOOKINGS_KEY.to_string()];
    if let Some(id) = slot_id {
        keys.push(slot_key(&id));
    }

    for key in keys {
        if let Err(e) = bounded(io_timeout, "cache invalidation", state.cache.delete(&key)).await {
            warn!("Cache invalidation failed for {}: {}", key, e);
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<Slot>>, AppError> {
    if let Some(slots) = cache_read::<Vec<Slot>>(&state, ALL_BOOKINGS_KEY).await {
        return Ok(Json(slots));
    }

    let slots = state.engine.list_slots().await?;
    cache_write(&state, ALL_BOOKINGS_KEY, &slots).await;
    Ok(Json(slots))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Slot>, AppError> {
    let id = parse_id(&id)?;
    let key = slot_key(&id);
    if let Some(slot) = cache_read::<Slot>(&state, &key).await {
        return Ok(Json(slot));
    }

    let slot = state.engine.get_slot(id).await?;
    cache_write(&state, &key, &slot).await;
    Ok(Json(slot))
}

/// Shared by `/bookings/create` and `/speaker-booking/book`.
pub async fn reserve_speaker_slot(
    state: &AppState,
    speaker_id: Ulid,
    req: CreateSlotRequest,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    let slot = state.engine.reserve_for_speaker(speaker_id, req.window()).await?;
    invalidate(state, Some(slot.id)).await;
    Ok((StatusCode::CREATED, Json(slot)))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    WithRejection(Json(req), _): WithRejection<Json<CreateSlotRequest>, AppError>,
) -> Result<(StatusCode, Json<Slot>), AppError> {
    reserve_speaker_slot(&state, claims.user_id, req).await
}

/// Speakers cancel the whole slot; users give up their own seat.
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let slot_id = parse_id(&id)?;

    match claims.role {
        Role::Speaker => {
            let slot = state
                .engine
                .cancel_speaker_reservation(claims.user_id, slot_id)
                .await?;
            invalidate(&state, Some(slot_id)).await;
            Ok(Json(json!({
                "message": "Booking cancelled",
                "booking": slot,
            })))
        }
        Role::User => {
            let reservation = state
                .engine
                .cancel_user_reservation(claims.user_id, slot_id)
                .await?;
            Ok(Json(json!({
                "message": "Reservation cancelled",
                "reservation": reservation,
            })))
        }
    }
}
