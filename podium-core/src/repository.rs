use async_trait::async_trait;
use ulid::Ulid;

use crate::identity::{Identity, NewIdentity, Role, Speaker, SpeakerProfile, SpeakerUpdate};
use crate::slot::{CollisionPolicy, Slot, SpeakerReservation, TimeWindow, UserReservation};
use crate::CoreResult;

/// Repository trait for user and speaker accounts
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Fails with `ConflictError` when the email is already registered.
    async fn create_user(&self, new_user: NewIdentity) -> CoreResult<Identity>;

    async fn create_speaker(
        &self,
        new_speaker: NewIdentity,
        profile: SpeakerProfile,
    ) -> CoreResult<Speaker>;

    async fn find_by_id(&self, role: Role, id: Ulid) -> CoreResult<Option<Identity>>;

    async fn find_by_email(&self, role: Role, email: &str) -> CoreResult<Option<Identity>>;

    async fn list_users(&self) -> CoreResult<Vec<Identity>>;

    /// Flips `is_verified` to true. `NotFoundError` when the id is unknown.
    async fn mark_verified(&self, role: Role, id: Ulid) -> CoreResult<Identity>;

    async fn get_speaker(&self, id: Ulid) -> CoreResult<Option<Speaker>>;

    async fn list_speakers(&self) -> CoreResult<Vec<Speaker>>;

    async fn update_speaker(&self, id: Ulid, update: SpeakerUpdate) -> CoreResult<Speaker>;

    /// `ConflictError` while the speaker still owns reservations.
    async fn delete_speaker(&self, id: Ulid) -> CoreResult<Speaker>;
}

/// Repository trait for slots and their reservation rows
#[async_trait]
pub trait SlotRepository: Send + Sync {
    async fn find_slot(&self, id: Ulid) -> CoreResult<Option<Slot>>;

    /// All slots ordered by start time.
    async fn list_slots(&self) -> CoreResult<Vec<Slot>>;

    /// First existing slot that collides with `window` under `policy`.
    async fn find_colliding(
        &self,
        window: &TimeWindow,
        policy: CollisionPolicy,
    ) -> CoreResult<Option<Slot>>;

    /// Inserts the slot and its speaker row as one unit: either both rows
    /// exist afterwards or neither does. A collision detected at write time
    /// is reported as `ConflictError`.
    async fn insert_speaker_slot(
        &self,
        slot: &Slot,
        speaker_id: Ulid,
        policy: CollisionPolicy,
    ) -> CoreResult<SpeakerReservation>;

    /// `ConflictError` when the user already holds this slot.
    async fn insert_user_reservation(
        &self,
        slot_id: Ulid,
        user_id: Ulid,
    ) -> CoreResult<UserReservation>;

    async fn list_speaker_reservations(&self, speaker_id: Ulid) -> CoreResult<Vec<SpeakerReservation>>;

    async fn list_user_reservations(&self, user_id: Ulid) -> CoreResult<Vec<UserReservation>>;

    /// Removes the speaker row, every user row of the slot, then the slot.
    /// `NotFoundError` (nothing removed) when the speaker does not own it.
    async fn delete_speaker_reservation(&self, speaker_id: Ulid, slot_id: Ulid) -> CoreResult<Slot>;

    /// `NotFoundError` when the user holds no reservation on the slot.
    async fn delete_user_reservation(&self, user_id: Ulid, slot_id: Ulid) -> CoreResult<UserReservation>;

    async fn ping(&self) -> CoreResult<()>;
}

/// String key-value store with expiry (response cache and OTP codes)
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()>;

    async fn delete(&self, key: &str) -> CoreResult<()>;

    /// Deletes `key` only if it currently holds `expected`, atomically.
    /// Returns whether the delete happened.
    async fn take_if_equals(&self, key: &str, expected: &str) -> CoreResult<bool>;

    async fn ping(&self) -> CoreResult<()>;
}
