use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podium_core::identity::{Identity, NewIdentity, Role, Speaker, SpeakerProfile, SpeakerUpdate};
use podium_core::repository::IdentityRepository;
use podium_core::{CoreError, CoreResult};
use sqlx::PgPool;
use tracing::info;
use ulid::Ulid;

use crate::{map_db_error, parse_id};

const IDENTITY_COLUMNS: &str =
    "id, first_name, last_name, email, password, is_verified, created_at, updated_at";

const SPEAKER_COLUMNS: &str = "id, first_name, last_name, email, password, is_verified, \
     created_at, updated_at, price_per_session::TEXT AS price_per_session, bio";

pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn table(role: Role) -> &'static str {
    match role {
        Role::User => "users",
        Role::Speaker => "speakers",
    }
}

#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
    password: String,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_identity(self, role: Role) -> CoreResult<Identity> {
        Ok(Identity {
            id: parse_id(&self.id)?,
            role,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash: self.password,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SpeakerRow {
    #[sqlx(flatten)]
    identity: IdentityRow,
    price_per_session: String,
    bio: Option<String>,
}

impl SpeakerRow {
    fn into_speaker(self) -> CoreResult<Speaker> {
        Ok(Speaker {
            identity: self.identity.into_identity(Role::Speaker)?,
            price_per_session: self.price_per_session,
            bio: self.bio,
        })
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn create_user(&self, new_user: NewIdentity) -> CoreResult<Identity> {
        let id = Ulid::new();
        let sql = format!(
            "INSERT INTO users (id, first_name, last_name, email, password) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            IDENTITY_COLUMNS
        );

        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id.to_string())
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| email_conflict("Create user", e))?;

        info!("User {} created", id);
        row.into_identity(Role::User)
    }

    async fn create_speaker(
        &self,
        new_speaker: NewIdentity,
        profile: SpeakerProfile,
    ) -> CoreResult<Speaker> {
        let id = Ulid::new();
        let sql = format!(
            "INSERT INTO speakers (id, first_name, last_name, email, password, price_per_session, bio) \
             VALUES ($1, $2, $3, $4, $5, $6::NUMERIC, $7) RETURNING {}",
            SPEAKER_COLUMNS
        );

        let row = sqlx::query_as::<_, SpeakerRow>(&sql)
            .bind(id.to_string())
            .bind(&new_speaker.first_name)
            .bind(&new_speaker.last_name)
            .bind(&new_speaker.email)
            .bind(&new_speaker.password_hash)
            .bind(&profile.price_per_session)
            .bind(&profile.bio)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| email_conflict("Create speaker", e))?;

        info!("Speaker {} created", id);
        row.into_speaker()
    }

    async fn find_by_id(&self, role: Role, id: Ulid) -> CoreResult<Option<Identity>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", IDENTITY_COLUMNS, table(role));
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Find identity", e))?;

        row.map(|r| r.into_identity(role)).transpose()
    }

    async fn find_by_email(&self, role: Role, email: &str) -> CoreResult<Option<Identity>> {
        let sql = format!("SELECT {} FROM {} WHERE email = $1", IDENTITY_COLUMNS, table(role));
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Find identity by email", e))?;

        row.map(|r| r.into_identity(role)).transpose()
    }

    async fn list_users(&self) -> CoreResult<Vec<Identity>> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at", IDENTITY_COLUMNS);
        let rows = sqlx::query_as::<_, IdentityRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("List users", e))?;

        rows.into_iter().map(|r| r.into_identity(Role::User)).collect()
    }

    async fn mark_verified(&self, role: Role, id: Ulid) -> CoreResult<Identity> {
        let sql = format!(
            "UPDATE {} SET is_verified = TRUE, updated_at = NOW() WHERE id = $1 RETURNING {}",
            table(role),
            IDENTITY_COLUMNS
        );
        let row = sqlx::query_as::<_, IdentityRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Mark verified", e))?
            .ok_or_else(|| CoreError::NotFoundError(format!("{} {} not found", role, id)))?;

        row.into_identity(role)
    }

    async fn get_speaker(&self, id: Ulid) -> CoreResult<Option<Speaker>> {
        let sql = format!("SELECT {} FROM speakers WHERE id = $1", SPEAKER_COLUMNS);
        let row = sqlx::query_as::<_, SpeakerRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Get speaker", e))?;

        row.map(SpeakerRow::into_speaker).transpose()
    }

    async fn list_speakers(&self) -> CoreResult<Vec<Speaker>> {
        let sql = format!("SELECT {} FROM speakers ORDER BY created_at", SPEAKER_COLUMNS);
        let rows = sqlx::query_as::<_, SpeakerRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("List speakers", e))?;

        rows.into_iter().map(SpeakerRow::into_speaker).collect()
    }

    async fn update_speaker(&self, id: Ulid, update: SpeakerUpdate) -> CoreResult<Speaker> {
        // NULL binds keep the current column value
        let sql = format!(
            "UPDATE speakers SET \
                first_name = COALESCE($2, first_name), \
                last_name = COALESCE($3, last_name), \
                email = COALESCE($4, email), \
                price_per_session = COALESCE($5::NUMERIC, price_per_session), \
                bio = COALESCE($6, bio), \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            SPEAKER_COLUMNS
        );

        let row = sqlx::query_as::<_, SpeakerRow>(&sql)
            .bind(id.to_string())
            .bind(&update.first_name)
            .bind(&update.last_name)
            .bind(&update.email)
            .bind(&update.price_per_session)
            .bind(&update.bio)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| email_conflict("Update speaker", e))?
            .ok_or_else(|| CoreError::NotFoundError(format!("Speaker {} not found", id)))?;

        info!("Speaker {} updated", id);
        row.into_speaker()
    }

    async fn delete_speaker(&self, id: Ulid) -> CoreResult<Speaker> {
        let sql = format!("DELETE FROM speakers WHERE id = $1 RETURNING {}", SPEAKER_COLUMNS);
        let row = sqlx::query_as::<_, SpeakerRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match map_db_error("Delete speaker", e) {
                CoreError::ConflictError(_) => CoreError::ConflictError(
                    "Speaker still owns booked slots; cancel them first".to_string(),
                ),
                other => other,
            })?
            .ok_or_else(|| CoreError::NotFoundError(format!("Speaker {} not found", id)))?;

        info!("Speaker {} deleted", id);
        row.into_speaker()
    }
}

fn email_conflict(context: &str, err: sqlx::Error) -> CoreError {
    match map_db_error(context, err) {
        CoreError::ConflictError(_) => {
            CoreError::ConflictError("Email is already registered".to_string())
        }
        other => other,
    }
}
