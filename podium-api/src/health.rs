use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use podium_core::bounded;
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/health", get(health))
}

async fn welcome() -> &'static str {
    "Welcome to the Podium booking API"
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let io_timeout = state.business_rules.io_timeout();
    let database = bounded(io_timeout, "database ping", state.slots.ping()).await;
    let cache = bounded(io_timeout, "cache ping", state.cache.ping()).await;

    let status = if database.is_ok() && cache.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let label = |ok: bool| if ok { "up" } else { "down" };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": label(database.is_ok()),
            "cache": label(cache.is_ok()),
        })),
    )
}
