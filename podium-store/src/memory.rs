//! In-process backends with the same observable contract as the Postgres and
//! Redis implementations. Used by unit and HTTP tests.

use async_trait::async_trait;
use chrono::Utc;
use podium_core::identity::{Identity, NewIdentity, Role, Speaker, SpeakerProfile, SpeakerUpdate};
use podium_core::mailer::{Mailer, OutboundEmail};
use podium_core::repository::{IdentityRepository, KeyValueStore, SlotRepository};
use podium_core::slot::{CollisionPolicy, Slot, SpeakerReservation, TimeWindow, UserReservation};
use podium_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use ulid::Ulid;

#[derive(Default)]
struct Tables {
    users: Vec<Identity>,
    speakers: Vec<Speaker>,
    slots: Vec<Slot>,
    speaker_links: Vec<SpeakerReservation>,
    user_links: Vec<(Ulid, Ulid)>,
}

impl Tables {
    fn email_taken(&self, role: Role, email: &str, except: Option<Ulid>) -> bool {
        match role {
            Role::User => self.users.iter().any(|u| u.email == email && Some(u.id) != except),
            Role::Speaker => self
                .speakers
                .iter()
                .any(|s| s.identity.email == email && Some(s.identity.id) != except),
        }
    }

    fn identity_mut(&mut self, role: Role, id: Ulid) -> Option<&mut Identity> {
        match role {
            Role::User => self.users.iter_mut().find(|u| u.id == id),
            Role::Speaker => self
                .speakers
                .iter_mut()
                .map(|s| &mut s.identity)
                .find(|i| i.id == id),
        }
    }
}

/// Identity and slot tables behind one lock, so a reservation write and its
/// constraint checks happen atomically like a database transaction.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every slot operation sleeps this long first. Lets tests exercise
    /// I/O timeouts.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            latency: Some(latency),
        }
    }

    fn tables(&self) -> CoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CoreError::InternalError("In-memory store lock poisoned".to_string()))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    pub fn slot_count(&self) -> usize {
        self.tables.lock().map(|t| t.slots.len()).unwrap_or(0)
    }

    pub fn user_reservation_count(&self) -> usize {
        self.tables.lock().map(|t| t.user_links.len()).unwrap_or(0)
    }
}

fn new_identity(role: Role, input: NewIdentity) -> Identity {
    let now = Utc::now();
    Identity {
        id: Ulid::new(),
        role,
        first_name: input.first_name,
        last_name: input.last_name,
        email: input.email,
        password_hash: input.password_hash,
        is_verified: false,
        created_at: now,
        updated_at: now,
    }
}

fn email_conflict() -> CoreError {
    CoreError::ConflictError("Email is already registered".to_string())
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    async fn create_user(&self, new_user: NewIdentity) -> CoreResult<Identity> {
        let mut tables = self.tables()?;
        if tables.email_taken(Role::User, &new_user.email, None) {
            return Err(email_conflict());
        }
        let user = new_identity(Role::User, new_user);
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn create_speaker(
        &self,
        new_speaker: NewIdentity,
        profile: SpeakerProfile,
    ) -> CoreResult<Speaker> {
        let mut tables = self.tables()?;
        if tables.email_taken(Role::Speaker, &new_speaker.email, None) {
            return Err(email_conflict());
        }
        let speaker = Speaker {
            identity: new_identity(Role::Speaker, new_speaker),
            price_per_session: profile.price_per_session,
            bio: profile.bio,
        };
        tables.speakers.push(speaker.clone());
        Ok(speaker)
    }

    async fn find_by_id(&self, role: Role, id: Ulid) -> CoreResult<Option<Identity>> {
        let mut tables = self.tables()?;
        Ok(tables.identity_mut(role, id).map(|i| i.clone()))
    }

    async fn find_by_email(&self, role: Role, email: &str) -> CoreResult<Option<Identity>> {
        let tables = self.tables()?;
        let found = match role {
            Role::User => tables.users.iter().find(|u| u.email == email).cloned(),
            Role::Speaker => tables
                .speakers
                .iter()
                .find(|s| s.identity.email == email)
                .map(|s| s.identity.clone()),
        };
        Ok(found)
    }

    async fn list_users(&self) -> CoreResult<Vec<Identity>> {
        Ok(self.tables()?.users.clone())
    }

    async fn mark_verified(&self, role: Role, id: Ulid) -> CoreResult<Identity> {
        let mut tables = self.tables()?;
        let identity = tables
            .identity_mut(role, id)
            .ok_or_else(|| CoreError::NotFoundError(format!("{} {} not found", role, id)))?;
        identity.is_verified = true;
        identity.updated_at = Utc::now();
        Ok(identity.clone())
    }

    async fn get_speaker(&self, id: Ulid) -> CoreResult<Option<Speaker>> {
        let tables = self.tables()?;
        Ok(tables.speakers.iter().find(|s| s.identity.id == id).cloned())
    }

    async fn list_speakers(&self) -> CoreResult<Vec<Speaker>> {
        Ok(self.tables()?.speakers.clone())
    }

    async fn update_speaker(&self, id: Ulid, update: SpeakerUpdate) -> CoreResult<Speaker> {
        let mut tables = self.tables()?;
        if let Some(email) = &update.email {
            if tables.email_taken(Role::Speaker, email, Some(id)) {
                return Err(email_conflict());
            }
        }

        let speaker = tables
            .speakers
            .iter_mut()
            .find(|s| s.identity.id == id)
            .ok_or_else(|| CoreError::NotFoundError(format!("Speaker {} not found", id)))?;

        if let Some(first_name) = update.first_name {
            speaker.identity.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            speaker.identity.last_name = last_name;
        }
        if let Some(email) = update.email {
            speaker.identity.email = email;
        }
        if let Some(price) = update.price_per_session {
            speaker.price_per_session = price;
        }
        if let Some(bio) = update.bio {
            speaker.bio = Some(bio);
        }
        speaker.identity.updated_at = Utc::now();
        Ok(speaker.clone())
    }

    async fn delete_speaker(&self, id: Ulid) -> CoreResult<Speaker> {
        let mut tables = self.tables()?;
        if tables.speaker_links.iter().any(|l| l.speaker_id == id) {
            return Err(CoreError::ConflictError(
                "Speaker still owns booked slots; cancel them first".to_string(),
            ));
        }
        let index = tables
            .speakers
            .iter()
            .position(|s| s.identity.id == id)
            .ok_or_else(|| CoreError::NotFoundError(format!("Speaker {} not found", id)))?;
        Ok(tables.speakers.remove(index))
    }
}

#[async_trait]
impl SlotRepository for InMemoryStore {
    async fn find_slot(&self, id: Ulid) -> CoreResult<Option<Slot>> {
        self.simulate_latency().await;
        Ok(self.tables()?.slots.iter().find(|s| s.id == id).cloned())
    }

    async fn list_slots(&self) -> CoreResult<Vec<Slot>> {
        self.simulate_latency().await;
        let mut slots = self.tables()?.slots.clone();
        slots.sort_by_key(|s| s.session_start_time);
        Ok(slots)
    }

    async fn find_colliding(
        &self,
        window: &TimeWindow,
        policy: CollisionPolicy,
    ) -> CoreResult<Option<Slot>> {
        self.simulate_latency().await;
        let tables = self.tables()?;
        Ok(tables
            .slots
            .iter()
            .find(|s| policy.collides(&s.window(), window))
            .cloned())
    }

    async fn insert_speaker_slot(
        &self,
        slot: &Slot,
        speaker_id: Ulid,
        policy: CollisionPolicy,
    ) -> CoreResult<SpeakerReservation> {
        self.simulate_latency().await;
        let mut tables = self.tables()?;

        // Mirrors UNIQUE(session_start_time) plus the locked overlap re-check
        let requested = slot.window();
        let taken = tables.slots.iter().any(|s| {
            s.session_start_time == slot.session_start_time
                || (policy == CollisionPolicy::Overlap && s.window().overlaps(&requested))
        });
        if taken {
            return Err(CoreError::ConflictError("slot already taken".to_string()));
        }
        if !tables.speakers.iter().any(|s| s.identity.id == speaker_id) {
            return Err(CoreError::ConflictError(format!(
                "Insert speaker reservation: speaker {} missing",
                speaker_id
            )));
        }

        let reservation = SpeakerReservation {
            booking_id: slot.id,
            speaker_id,
        };
        tables.slots.push(slot.clone());
        tables.speaker_links.push(reservation.clone());
        Ok(reservation)
    }

    async fn insert_user_reservation(
        &self,
        slot_id: Ulid,
        user_id: Ulid,
    ) -> CoreResult<UserReservation> {
        self.simulate_latency().await;
        let mut tables = self.tables()?;

        if !tables.slots.iter().any(|s| s.id == slot_id) || !tables.users.iter().any(|u| u.id == user_id) {
            return Err(CoreError::NotFoundError(format!(
                "Booking {} or user {} not found",
                slot_id, user_id
            )));
        }
        if tables.user_links.contains(&(slot_id, user_id)) {
            return Err(CoreError::ConflictError("User already holds this slot".to_string()));
        }

        tables.user_links.push((slot_id, user_id));
        Ok(UserReservation {
            booking_id: slot_id,
            user_id,
        })
    }

    async fn list_speaker_reservations(&self, speaker_id: Ulid) -> CoreResult<Vec<SpeakerReservation>> {
        self.simulate_latency().await;
        let tables = self.tables()?;
        Ok(tables
            .speaker_links
            .iter()
            .filter(|l| l.speaker_id == speaker_id)
            .cloned()
            .collect())
    }

    async fn list_user_reservations(&self, user_id: Ulid) -> CoreResult<Vec<UserReservation>> {
        self.simulate_latency().await;
        let tables = self.tables()?;
        Ok(tables
            .user_links
            .iter()
            .filter(|(_, u)| *u == user_id)
            .map(|(slot, user)| UserReservation {
                booking_id: *slot,
                user_id: *user,
            })
            .collect())
    }

    async fn delete_speaker_reservation(&self, speaker_id: Ulid, slot_id: Ulid) -> CoreResult<Slot> {
        self.simulate_latency().await;
        let mut tables = self.tables()?;

        let link = tables
            .speaker_links
            .iter()
            .position(|l| l.booking_id == slot_id && l.speaker_id == speaker_id)
            .ok_or_else(|| {
                CoreError::NotFoundError(format!(
                    "No reservation for slot {} held by speaker {}",
                    slot_id, speaker_id
                ))
            })?;

        tables.speaker_links.remove(link);
        tables.user_links.retain(|(slot, _)| *slot != slot_id);
        let index = tables
            .slots
            .iter()
            .position(|s| s.id == slot_id)
            .ok_or_else(|| CoreError::PersistenceError(format!("Slot {} vanished", slot_id)))?;
        Ok(tables.slots.remove(index))
    }

    async fn delete_user_reservation(&self, user_id: Ulid, slot_id: Ulid) -> CoreResult<UserReservation> {
        self.simulate_latency().await;
        let mut tables = self.tables()?;
        let before = tables.user_links.len();
        tables.user_links.retain(|link| *link != (slot_id, user_id));

        if tables.user_links.len() == before {
            return Err(CoreError::NotFoundError(format!(
                "No reservation for slot {} held by user {}",
                slot_id, user_id
            )));
        }
        Ok(UserReservation {
            booking_id: slot_id,
            user_id,
        })
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Expiring string map standing in for Redis.
#[derive(Default)]
pub struct InMemoryKeyValueStore {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> CoreResult<MutexGuard<'_, HashMap<String, (String, Instant)>>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| CoreError::InternalError("In-memory cache lock poisoned".to_string()))?;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        Ok(entries)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().map(|e| e.contains_key(key)).unwrap_or(false)
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries()?.get(key).map(|(value, _)| value.clone()))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> CoreResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries()?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> CoreResult<()> {
        self.entries()?.remove(key);
        Ok(())
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> CoreResult<bool> {
        let mut entries = self.entries()?;
        match entries.get(key) {
            Some((value, _)) if value == expected => {
                entries.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn ping(&self) -> CoreResult<()> {
        Ok(())
    }
}

/// Keeps every message it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: OutboundEmail) -> CoreResult<()> {
        self.sent
            .lock()
            .map_err(|_| CoreError::InternalError("Recording mailer lock poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn window(hour: u32) -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 10, hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 10, hour + 1, 0, 0).unwrap(),
        )
    }

    async fn speaker(store: &InMemoryStore) -> Speaker {
        store
            .create_speaker(
                NewIdentity {
                    first_name: "Grace".to_string(),
                    last_name: "Hopper".to_string(),
                    email: "grace@example.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                SpeakerProfile {
                    price_per_session: "50.00".to_string(),
                    bio: None,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = InMemoryStore::new();
        speaker(&store).await;

        let again = store
            .create_speaker(
                NewIdentity {
                    first_name: "Other".to_string(),
                    last_name: "Person".to_string(),
                    email: "grace@example.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                SpeakerProfile {
                    price_per_session: "10".to_string(),
                    bio: None,
                },
            )
            .await;
        assert!(matches!(again, Err(CoreError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_speaker_cancellation_cascades() {
        let store = InMemoryStore::new();
        let speaker = speaker(&store).await;
        let user = store
            .create_user(NewIdentity {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let slot = Slot::new(window(9));
        store
            .insert_speaker_slot(&slot, speaker.identity.id, CollisionPolicy::ExactStart)
            .await
            .unwrap();
        store.insert_user_reservation(slot.id, user.id).await.unwrap();

        let removed = store
            .delete_speaker_reservation(speaker.identity.id, slot.id)
            .await
            .unwrap();
        assert_eq!(removed.id, slot.id);
        assert_eq!(store.slot_count(), 0);
        assert_eq!(store.user_reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_seat_on_cancelled_slot_is_not_found() {
        let store = InMemoryStore::new();
        let speaker = speaker(&store).await;
        let user = store
            .create_user(NewIdentity {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let slot = Slot::new(window(11));
        store
            .insert_speaker_slot(&slot, speaker.identity.id, CollisionPolicy::ExactStart)
            .await
            .unwrap();
        store
            .delete_speaker_reservation(speaker.identity.id, slot.id)
            .await
            .unwrap();

        let result = store.insert_user_reservation(slot.id, user.id).await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
        assert_eq!(store.user_reservation_count(), 0);
    }

    #[tokio::test]
    async fn test_speaker_with_slots_cannot_be_deleted() {
        let store = InMemoryStore::new();
        let speaker = speaker(&store).await;
        store
            .insert_speaker_slot(&Slot::new(window(10)), speaker.identity.id, CollisionPolicy::ExactStart)
            .await
            .unwrap();

        let result = store.delete_speaker(speaker.identity.id).await;
        assert!(matches!(result, Err(CoreError::ConflictError(_))));
    }

    #[tokio::test]
    async fn test_take_if_equals_consumes_once() {
        let kv = InMemoryKeyValueStore::new();
        kv.set_ex("otp:1", "123456", 60).await.unwrap();

        assert!(!kv.take_if_equals("otp:1", "654321").await.unwrap());
        assert!(kv.take_if_equals("otp:1", "123456").await.unwrap());
        assert!(!kv.take_if_equals("otp:1", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_zero_ttl_entries_expire() {
        let kv = InMemoryKeyValueStore::new();
        kv.set_ex("bookings:all", "[]", 0).await.unwrap();
        assert_eq!(kv.get("bookings:all").await.unwrap(), None);
    }
}
