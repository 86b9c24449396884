pub mod app_config;
pub mod database;
pub mod redis_repo;
pub mod identity_repo;
pub mod slot_repo;
pub mod mailer;
pub mod memory;

pub use database::DbClient;
pub use identity_repo::PgIdentityRepository;
pub use mailer::{LogMailer, SmtpMailer};
pub use redis_repo::RedisClient;
pub use slot_repo::PgSlotRepository;

use podium_core::CoreError;

/// Maps a sqlx failure onto the domain taxonomy. Unique and foreign-key
/// violations become conflicts; everything else is a persistence failure.
pub(crate) fn map_db_error(context: &str, err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            // unique_violation
            Some("23505") => {
                return CoreError::ConflictError(format!("{}: already exists", context));
            }
            // foreign_key_violation
            Some("23503") => {
                return CoreError::ConflictError(format!("{}: referenced row missing or still in use", context));
            }
            _ => {}
        }
    }
    tracing::error!("{} failed: {}", context, err);
    CoreError::PersistenceError(format!("{} failed", context))
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503"))
}

pub(crate) fn parse_id(raw: &str) -> Result<ulid::Ulid, CoreError> {
    ulid::Ulid::from_string(raw)
        .map_err(|e| CoreError::PersistenceError(format!("Stored id '{}' is not a ULID: {}", raw, e)))
}
