use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{get, post},
    Extension, Json, Router,
};
use podium_core::identity::Identity;

use crate::auth;
use crate::error::{parse_id, AppError};
use crate::middleware::{require_auth, AuthClaims};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(list_users))
        .route("/user/{id}", get(get_user))
        .route_layer(from_fn_with_state(state, require_auth));

    Router::new()
        .route("/signup", post(auth::user_signup))
        .route("/login", post(auth::user_login))
        .route("/send-otp/{id}", post(auth::user_send_otp))
        .route("/verify/{id}", post(auth::user_verify))
        .merge(protected)
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<Identity>>, AppError> {
    Ok(Json(state.accounts.list_users().await?))
}

async fn get_user(
    State(state): State<AppState>,
    Extension(claims): Extension<AuthClaims>,
    Path(id): Path<String>,
) -> Result<Json<Identity>, AppError> {
    let id = parse_id(&id)?;
    claims.ensure_self(id)?;
    Ok(Json(state.accounts.get_user(id).await?))
}
