use axum::{http::Method, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod bookings;
pub mod error;
pub mod health;
pub mod middleware;
pub mod speaker_bookings;
pub mod speakers;
pub mod state;
pub mod user_bookings;
pub mod users;
pub mod worker;

pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let api = Router::new()
        .nest("/user", users::routes(state.clone()))
        .nest("/speaker", speakers::routes(state.clone()))
        .nest("/bookings", bookings::routes(state.clone()))
        .nest("/speaker-booking", speaker_bookings::routes(state.clone()))
        .nest("/user-booking", user_bookings::routes(state.clone()));

    Router::new()
        .merge(health::routes())
        .nest("/api/v1", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
