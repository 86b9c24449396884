pub mod auth;

pub use auth::{require_auth, require_speaker, require_user, AuthClaims};
