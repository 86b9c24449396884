use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::extract::WithRejection;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use podium_accounts::{LoginRequest, SignupRequest, SpeakerSignupRequest, VerifyOtpRequest};
use podium_core::identity::{Identity, Role, Speaker};
use serde::Serialize;
use serde_json::{json, Value};
use ulid::Ulid;

use crate::error::{parse_id, AppError};
use crate::middleware::auth::AuthClaims;
use crate::state::{AppState, AuthConfig};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: Identity,
}

pub fn issue_token(auth: &AuthConfig, id: Ulid, role: Role) -> Result<String, AppError> {
    let claims = AuthClaims {
        user_id: id,
        role,
        exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(auth.secret.as_bytes()))
        .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
}

// ============================================================================
// Signup
// ============================================================================

pub async fn user_signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SignupRequest>, AppError>,
) -> Result<(StatusCode, Json<Identity>), AppError> {
    let user = state.accounts.signup_user(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn speaker_signup(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<SpeakerSignupRequest>, AppError>,
) -> Result<(StatusCode, Json<Speaker>), AppError> {
    let speaker = state.accounts.signup_speaker(req).await?;
    Ok((StatusCode::CREATED, Json(speaker)))
}

// ============================================================================
// Login
// ============================================================================

async fn login(state: &AppState, role: Role, req: LoginRequest) -> Result<Json<AuthResponse>, AppError> {
    let identity = state.accounts.login(role, req).await?;
    let token = issue_token(&state.auth, identity.id, role)?;
    Ok(Json(AuthResponse { token, user: identity }))
}

pub async fn user_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<AuthResponse>, AppError> {
    login(&state, Role::User, req).await
}

pub async fn speaker_login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<Json<AuthResponse>, AppError> {
    login(&state, Role::Speaker, req).await
}

// ============================================================================
// OTP
// ============================================================================

async fn send_otp(state: &AppState, role: Role, raw_id: &str) -> Result<Json<Value>, AppError> {
    let id = parse_id(raw_id)?;
    let expires_in = state.accounts.send_otp(role, id).await?;
    Ok(Json(json!({
        "message": "OTP sent to your email",
        "expiresInSeconds": expires_in,
    })))
}

pub async fn user_send_otp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    send_otp(&state, Role::User, &id).await
}

pub async fn speaker_send_otp(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    send_otp(&state, Role::Speaker, &id).await
}

async fn verify(
    state: &AppState,
    role: Role,
    raw_id: &str,
    req: VerifyOtpRequest,
) -> Result<Json<Value>, AppError> {
    let id = parse_id(raw_id)?;
    let identity = state.accounts.verify(role, id, req).await?;
    Ok(Json(json!({
        "message": "Email verified successfully",
        "user": identity,
    })))
}

pub async fn user_verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<VerifyOtpRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    verify(&state, Role::User, &id, req).await
}

pub async fn speaker_verify(
    State(state): State<AppState>,
    Path(id): Path<String>,
    WithRejection(Json(req), _): WithRejection<Json<VerifyOtpRequest>, AppError>,
) -> Result<Json<Value>, AppError> {
    verify(&state, Role::Speaker, &id, req).await
}
