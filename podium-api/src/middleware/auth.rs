use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use jsonwebtoken::{decode, DecodingKey, Validation};
use podium_core::identity::Role;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuthClaims {
    #[serde(rename = "userId")]
    pub user_id: Ulid,
    pub role: Role,
    pub exp: usize,
}

impl AuthClaims {
    /// Callers may only act on their own account.
    pub fn ensure_self(&self, id: Ulid) -> Result<(), AppError> {
        if self.user_id != id {
            return Err(AppError::AuthorizationError(
                "You can only access your own account".to_string(),
            ));
        }
        Ok(())
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthClaims, AppError> {
    // 1. Bearer token
    let Authorization(bearer) = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::AuthenticationError("Authentication required".to_string()))?;

    // 2. Signature + expiry
    let token_data = decode::<AuthClaims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        AppError::AuthenticationError("Invalid or expired token".to_string())
    })?;

    Ok(token_data.claims)
}

async fn guard(
    state: &AppState,
    allowed: Option<Role>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(state, req.headers())?;

    // 3. Role scope
    if let Some(role) = allowed {
        if claims.role != role {
            return Err(AppError::AuthorizationError(format!(
                "Only {}s can access this resource",
                role
            )));
        }
    }

    // 4. Hand claims to the handler
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

// ============================================================================
// Middlewares
// ============================================================================

pub async fn require_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&state, None, req, next).await
}

pub async fn require_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&state, Some(Role::User), req, next).await
}

pub async fn require_speaker(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    guard(&state, Some(Role::Speaker), req, next).await
}
