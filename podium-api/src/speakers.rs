use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use axum_extra::extract::WithRejection;
use podium_accounts::SpeakerUpdateRequest;
use podium_core::identity::Speaker;
use serde_json::{json, Value};

use crate::auth;
use crate::error::{parse_id, AppError};
use crate::middleware::{require_speaker, AuthClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/update/{id}", put(update_speaker))
        .route("/delete/{id}", delete(delete_speaker))
        .route_layer(from_fn_with_state(state, require_speaker));

    Router::new()
        .route("/", get(list_speakers))
        .route("/{id}", get(get_speaker))
        .route("/signup", post(auth::speaker_signup))
        .route("/login", post(auth::speaker_login))
        .route("/send-otp/{id}", post(auth::speaker_send_otp))
        .route("/verify/{id}", post(auth::speaker_verify))
        .merge(protected)
}

async fn list_speakers(State(state): State<AppState>) -> Result<Json<Vec<Speaker>>, AppError> {
    Ok(Json(state.accounts.list_speakers().await?))
}

async fn get_speaker(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Speaker>, AppError> {
    let id = parse_id(&id)?;
    Ok(Json(state.accounts.get_speaker(id).await?))
}

async fn update_speaker(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<SpeakerUpdateRequest>, AppError>,
) -> Result<Json<Speaker>, AppError> {
    let id = parse_id(&id)?;
    claims.ensure_self(id)?;
    Ok(Json(state.accounts.update_speaker(id, req).await?))
}

async fn delete_speaker(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(&id)?;
    claims.ensure_self(id)?;
    let speaker = state.accounts.delete_speaker(id).await?;
    Ok(Json(json!({
        "message": "Speaker deleted",
        "speaker": speaker,
    })))
}
