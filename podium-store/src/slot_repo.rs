use async_trait::async_trait;
use chrono::{DateTime, Utc};
use podium_core::repository::SlotRepository;
use podium_core::slot::{CollisionPolicy, Slot, SpeakerReservation, TimeWindow, UserReservation};
use podium_core::{CoreError, CoreResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use ulid::Ulid;

use crate::{is_foreign_key_violation, map_db_error, parse_id};

/// Advisory lock key serializing overlap checks across connections.
const SLOT_WRITE_LOCK: i64 = 0x706f_6469_756d;

const SLOT_COLUMNS: &str = "id, session_start_time, session_end_time, created_at";

pub struct PgSlotRepository {
    pool: PgPool,
}

impl PgSlotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: String,
    session_start_time: DateTime<Utc>,
    session_end_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<SlotRow> for Slot {
    type Error = CoreError;

    fn try_from(row: SlotRow) -> Result<Self, Self::Error> {
        Ok(Slot {
            id: parse_id(&row.id)?,
            session_start_time: row.session_start_time,
            session_end_time: row.session_end_time,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SpeakerLinkRow {
    booking_id: String,
    speaker_id: String,
}

#[derive(sqlx::FromRow)]
struct UserLinkRow {
    booking_id: String,
    user_id: String,
}

fn slot_taken(err: CoreError) -> CoreError {
    match err {
        CoreError::ConflictError(_) => CoreError::ConflictError("slot already taken".to_string()),
        other => other,
    }
}

async fn colliding_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    window: &TimeWindow,
) -> CoreResult<Option<SlotRow>> {
    let sql = format!(
        "SELECT {} FROM bookings \
         WHERE session_start_time < $2 AND $1 < session_end_time \
         ORDER BY session_start_time LIMIT 1",
        SLOT_COLUMNS
    );
    sqlx::query_as::<_, SlotRow>(&sql)
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_db_error("Overlap check", e))
}

#[async_trait]
impl SlotRepository for PgSlotRepository {
    async fn find_slot(&self, id: Ulid) -> CoreResult<Option<Slot>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", SLOT_COLUMNS);
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_db_error("Find slot", e))?;

        row.map(Slot::try_from).transpose()
    }

    async fn list_slots(&self) -> CoreResult<Vec<Slot>> {
        let sql = format!("SELECT {} FROM bookings ORDER BY session_start_time", SLOT_COLUMNS);
        let rows = sqlx::query_as::<_, SlotRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_db_error("List slots", e))?;

        rows.into_iter().map(Slot::try_from).collect()
    }

    async fn find_colliding(
        &self,
        window: &TimeWindow,
        policy: CollisionPolicy,
    ) -> CoreResult<Option<Slot>> {
        let row = match policy {
            CollisionPolicy::ExactStart => {
                let sql = format!(
                    "SELECT {} FROM bookings WHERE session_start_time = $1 LIMIT 1",
                    SLOT_COLUMNS
                );
                sqlx::query_as::<_, SlotRow>(&sql)
                    .bind(window.start)
                    .fetch_optional(&self.pool)
                    .await
            }
            CollisionPolicy::Overlap => {
                let sql = format!(
                    "SELECT {} FROM bookings \
                     WHERE session_start_time < $2 AND $1 < session_end_time \
                     ORDER BY session_start_time LIMIT 1",
                    SLOT_COLUMNS
                );
                sqlx::query_as::<_, SlotRow>(&sql)
                    .bind(window.start)
                    .bind(window.end)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .map_err(|e| map_db_error("Collision check", e))?;

        row.map(Slot::try_from).transpose()
    }

    async fn insert_speaker_slot(
        &self,
        slot: &Slot,
        speaker_id: Ulid,
        policy: CollisionPolicy,
    ) -> CoreResult<SpeakerReservation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Begin reservation", e))?;

        // 1. Overlap mode: serialize writers, then re-check under the lock
        if policy == CollisionPolicy::Overlap {
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(SLOT_WRITE_LOCK)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_db_error("Acquire slot lock", e))?;

            if let Some(existing) = colliding_in_tx(&mut tx, &slot.window()).await? {
                warn!("Window overlaps slot {} at write time", existing.id);
                return Err(CoreError::ConflictError("slot already taken".to_string()));
            }
        }

        // 2. Slot row. UNIQUE(session_start_time) rejects concurrent duplicates.
        sqlx::query(
            "INSERT INTO bookings (id, session_start_time, session_end_time, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(slot.id.to_string())
        .bind(slot.session_start_time)
        .bind(slot.session_end_time)
        .bind(slot.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| slot_taken(map_db_error("Insert slot", e)))?;

        // 3. Speaker link
        sqlx::query("INSERT INTO booking_speakers (booking_id, speaker_id) VALUES ($1, $2)")
            .bind(slot.id.to_string())
            .bind(speaker_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Insert speaker reservation", e))?;

        tx.commit()
            .await
            .map_err(|e| slot_taken(map_db_error("Commit reservation", e)))?;

        info!("Slot {} reserved by speaker {}", slot.id, speaker_id);
        Ok(SpeakerReservation {
            booking_id: slot.id,
            speaker_id,
        })
    }

    async fn insert_user_reservation(
        &self,
        slot_id: Ulid,
        user_id: Ulid,
    ) -> CoreResult<UserReservation> {
        sqlx::query("INSERT INTO booking_users (booking_id, user_id) VALUES ($1, $2)")
            .bind(slot_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                // Slot cancelled (or user removed) since the caller looked it up
                if is_foreign_key_violation(&e) {
                    return CoreError::NotFoundError(format!(
                        "Booking {} or user {} not found",
                        slot_id, user_id
                    ));
                }
                match map_db_error("Insert user reservation", e) {
                    CoreError::ConflictError(_) => {
                        CoreError::ConflictError("User already holds this slot".to_string())
                    }
                    other => other,
                }
            })?;

        info!("User {} joined slot {}", user_id, slot_id);
        Ok(UserReservation {
            booking_id: slot_id,
            user_id,
        })
    }

    async fn list_speaker_reservations(&self, speaker_id: Ulid) -> CoreResult<Vec<SpeakerReservation>> {
        let rows = sqlx::query_as::<_, SpeakerLinkRow>(
            "SELECT bs.booking_id, bs.speaker_id FROM booking_speakers bs \
             JOIN bookings b ON b.id = bs.booking_id \
             WHERE bs.speaker_id = $1 ORDER BY b.session_start_time",
        )
        .bind(speaker_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("List speaker reservations", e))?;

        rows.into_iter()
            .map(|r| {
                Ok(SpeakerReservation {
                    booking_id: parse_id(&r.booking_id)?,
                    speaker_id: parse_id(&r.speaker_id)?,
                })
            })
            .collect()
    }

    async fn list_user_reservations(&self, user_id: Ulid) -> CoreResult<Vec<UserReservation>> {
        let rows = sqlx::query_as::<_, UserLinkRow>(
            "SELECT bu.booking_id, bu.user_id FROM booking_users bu \
             JOIN bookings b ON b.id = bu.booking_id \
             WHERE bu.user_id = $1 ORDER BY b.session_start_time",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_db_error("List user reservations", e))?;

        rows.into_iter()
            .map(|r| {
                Ok(UserReservation {
                    booking_id: parse_id(&r.booking_id)?,
                    user_id: parse_id(&r.user_id)?,
                })
            })
            .collect()
    }

    async fn delete_speaker_reservation(&self, speaker_id: Ulid, slot_id: Ulid) -> CoreResult<Slot> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_db_error("Begin cancellation", e))?;

        // 1. Speaker link; nothing else is touched when it does not match
        let removed = sqlx::query(
            "DELETE FROM booking_speakers WHERE booking_id = $1 AND speaker_id = $2",
        )
        .bind(slot_id.to_string())
        .bind(speaker_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_db_error("Delete speaker reservation", e))?;

        if removed.rows_affected() == 0 {
            return Err(CoreError::NotFoundError(format!(
                "No reservation for slot {} held by speaker {}",
                slot_id, speaker_id
            )));
        }

        // 2. Attendee links
        let attendees = sqlx::query("DELETE FROM booking_users WHERE booking_id = $1")
            .bind(slot_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_db_error("Delete user reservations", e))?;

        // 3. The slot itself
        let sql = format!("DELETE FROM bookings WHERE id = $1 RETURNING {}", SLOT_COLUMNS);
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(slot_id.to_string())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_db_error("Delete slot", e))?;

        tx.commit()
            .await
            .map_err(|e| map_db_error("Commit cancellation", e))?;

        info!(
            "Slot {} cancelled by speaker {} ({} attendee reservations removed)",
            slot_id,
            speaker_id,
            attendees.rows_affected()
        );
        Slot::try_from(row)
    }

    async fn delete_user_reservation(&self, user_id: Ulid, slot_id: Ulid) -> CoreResult<UserReservation> {
        let removed = sqlx::query("DELETE FROM booking_users WHERE booking_id = $1 AND user_id = $2")
            .bind(slot_id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Delete user reservation", e))?;

        if removed.rows_affected() == 0 {
            return Err(CoreError::NotFoundError(format!(
                "No reservation for slot {} held by user {}",
                slot_id, user_id
            )));
        }

        info!("User {} left slot {}", user_id, slot_id);
        Ok(UserReservation {
            booking_id: slot_id,
            user_id,
        })
    }

    async fn ping(&self) -> CoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error("Database ping", e))?;
        Ok(())
    }
}
