use chrono::Utc;
use podium_core::identity::{Identity, Role};
use podium_core::notify::{Notification, Notifier};
use podium_core::repository::{IdentityRepository, SlotRepository};
use podium_core::slot::{CollisionPolicy, Slot, SpeakerReservation, TimeWindow, UserReservation};
use podium_core::{bounded, CoreError, CoreResult};
use podium_shared::models::events::SlotReservedEvent;
use podium_shared::Masked;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ulid::Ulid;

use crate::rules::SlotRules;

/// Creates, lists and cancels slots. All rule checks run before any write;
/// store calls are bounded by `io_timeout`.
pub struct ReservationEngine {
    slots: Arc<dyn SlotRepository>,
    identities: Arc<dyn IdentityRepository>,
    notifier: Notifier,
    rules: SlotRules,
    policy: CollisionPolicy,
    io_timeout: Duration,
}

impl ReservationEngine {
    pub fn new(
        slots: Arc<dyn SlotRepository>,
        identities: Arc<dyn IdentityRepository>,
        notifier: Notifier,
        rules: SlotRules,
        policy: CollisionPolicy,
        io_timeout: Duration,
    ) -> Self {
        Self {
            slots,
            identities,
            notifier,
            rules,
            policy,
            io_timeout,
        }
    }

    async fn require_identity(&self, role: Role, id: Ulid) -> CoreResult<Identity> {
        bounded(self.io_timeout, "identity lookup", self.identities.find_by_id(role, id))
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("{} {} not found", role, id)))
    }

    fn announce(&self, slot: &Slot, recipient: &Identity) {
        let event = SlotReservedEvent {
            slot_id: slot.id,
            recipient_email: Masked(recipient.email.clone()),
            recipient_name: recipient.first_name.clone(),
            session_start_time: slot.session_start_time,
            session_end_time: slot.session_end_time,
            timestamp: Utc::now().timestamp(),
        };
        // A dropped notification never undoes the reservation
        if !self.notifier.notify(Notification::SlotReserved(event)) {
            warn!("Slot {} reserved without confirmation email", slot.id);
        }
    }

    /// Validates `window`, then atomically creates the slot and its speaker row.
    pub async fn reserve_for_speaker(&self, speaker_id: Ulid, window: TimeWindow) -> CoreResult<Slot> {
        // 1. Business rules
        self.rules.check(&window)?;

        // 2. Speaker must exist
        let speaker = self.require_identity(Role::Speaker, speaker_id).await?;

        // 3. Collision pre-check. The store re-enforces this at write time.
        let existing = bounded(
            self.io_timeout,
            "collision check",
            self.slots.find_colliding(&window, self.policy),
        )
        .await?;
        if let Some(existing) = existing {
            info!("Requested window collides with slot {}", existing.id);
            return Err(CoreError::ConflictError("slot already taken".to_string()));
        }

        // 4. Slot + speaker row in one transaction
        let slot = Slot::new(window);
        bounded(
            self.io_timeout,
            "slot insert",
            self.slots.insert_speaker_slot(&slot, speaker_id, self.policy),
        )
        .await?;

        info!(
            "Speaker {} reserved slot {} ({} - {})",
            speaker_id, slot.id, slot.session_start_time, slot.session_end_time
        );

        // 5. Confirmation + invite
        self.announce(&slot, &speaker);
        Ok(slot)
    }

    /// Attaches a user to an existing slot. Slot rules are not re-checked.
    pub async fn reserve_for_user(&self, user_id: Ulid, slot_id: Ulid) -> CoreResult<UserReservation> {
        let user = self.require_identity(Role::User, user_id).await?;
        let slot = self.get_slot(slot_id).await?;

        let reservation = bounded(
            self.io_timeout,
            "user reservation insert",
            self.slots.insert_user_reservation(slot.id, user_id),
        )
        .await?;

        info!("User {} reserved a seat on slot {}", user_id, slot.id);
        self.announce(&slot, &user);
        Ok(reservation)
    }

    /// Destroys the slot along with every reservation on it.
    pub async fn cancel_speaker_reservation(&self, speaker_id: Ulid, slot_id: Ulid) -> CoreResult<Slot> {
        let slot = bounded(
            self.io_timeout,
            "speaker cancellation",
            self.slots.delete_speaker_reservation(speaker_id, slot_id),
        )
        .await?;

        info!("Speaker {} cancelled slot {}", speaker_id, slot_id);
        Ok(slot)
    }

    /// Removes only the caller's seat; the slot stays.
    pub async fn cancel_user_reservation(&self, user_id: Ulid, slot_id: Ulid) -> CoreResult<UserReservation> {
        let reservation = bounded(
            self.io_timeout,
            "user cancellation",
            self.slots.delete_user_reservation(user_id, slot_id),
        )
        .await?;

        info!("User {} cancelled seat on slot {}", user_id, slot_id);
        Ok(reservation)
    }

    pub async fn get_slot(&self, slot_id: Ulid) -> CoreResult<Slot> {
        bounded(self.io_timeout, "slot lookup", self.slots.find_slot(slot_id))
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("Booking {} not found", slot_id)))
    }

    pub async fn list_slots(&self) -> CoreResult<Vec<Slot>> {
        bounded(self.io_timeout, "slot listing", self.slots.list_slots()).await
    }

    pub async fn speaker_reservations(&self, speaker_id: Ulid) -> CoreResult<Vec<SpeakerReservation>> {
        bounded(
            self.io_timeout,
            "speaker reservation listing",
            self.slots.list_speaker_reservations(speaker_id),
        )
        .await
    }

    pub async fn user_reservations(&self, user_id: Ulid) -> CoreResult<Vec<UserReservation>> {
        bounded(
            self.io_timeout,
            "user reservation listing",
            self.slots.list_user_reservations(user_id),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};
    use podium_core::identity::{NewIdentity, SpeakerProfile};
    use podium_store::memory::InMemoryStore;
    use tokio::sync::mpsc;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, hour, 0, 0).unwrap()
    }

    fn hour_window(hour: u32) -> TimeWindow {
        TimeWindow::new(at(hour), at(hour + 1))
    }

    struct Harness {
        engine: Arc<ReservationEngine>,
        store: Arc<InMemoryStore>,
        rx: mpsc::Receiver<Notification>,
        speaker_id: Ulid,
        user_id: Ulid,
    }

    async fn harness_with(store: InMemoryStore, policy: CollisionPolicy, io_timeout: Duration) -> Harness {
        let store = Arc::new(store);
        let speaker = store
            .create_speaker(
                NewIdentity {
                    first_name: "Grace".to_string(),
                    last_name: "Hopper".to_string(),
                    email: "grace@example.com".to_string(),
                    password_hash: "hash".to_string(),
                },
                SpeakerProfile {
                    price_per_session: "75.00".to_string(),
                    bio: None,
                },
            )
            .await
            .unwrap();
        let user = store
            .create_user(NewIdentity {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                password_hash: "hash".to_string(),
            })
            .await
            .unwrap();

        let (notifier, rx) = Notifier::channel(16);
        let engine = ReservationEngine::new(
            store.clone(),
            store.clone(),
            notifier,
            SlotRules::default(),
            policy,
            io_timeout,
        );

        Harness {
            engine: Arc::new(engine),
            store,
            rx,
            speaker_id: speaker.identity.id,
            user_id: user.id,
        }
    }

    async fn harness() -> Harness {
        harness_with(InMemoryStore::new(), CollisionPolicy::ExactStart, Duration::from_secs(1)).await
    }

    #[tokio::test]
    async fn test_valid_reservation_creates_slot_and_notifies() {
        let mut h = harness().await;

        let slot = h.engine.reserve_for_speaker(h.speaker_id, hour_window(9)).await.unwrap();
        assert_eq!(slot.id.to_string().len(), 26);

        let fetched = h.engine.get_slot(slot.id).await.unwrap();
        assert_eq!(fetched.session_start_time, at(9));
        assert_eq!(fetched.session_end_time, at(10));

        match h.rx.try_recv().unwrap() {
            Notification::SlotReserved(event) => {
                assert_eq!(event.slot_id, slot.id);
                assert_eq!(event.recipient_email.expose(), "grace@example.com");
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rule_violations_do_not_write() {
        let h = harness().await;

        let two_hours = TimeWindow::new(at(9), at(11));
        let too_early = hour_window(8);

        for window in [two_hours, too_early] {
            let result = h.engine.reserve_for_speaker(h.speaker_id, window).await;
            assert!(matches!(result, Err(CoreError::ValidationError(_))));
        }
        assert_eq!(h.store.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_repeat_start_conflicts() {
        let h = harness().await;

        h.engine.reserve_for_speaker(h.speaker_id, hour_window(9)).await.unwrap();
        let again = h.engine.reserve_for_speaker(h.speaker_id, hour_window(9)).await;

        match again {
            Err(CoreError::ConflictError(msg)) => assert_eq!(msg, "slot already taken"),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert_eq!(h.store.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_speaker_is_not_found() {
        let h = harness().await;
        let result = h.engine.reserve_for_speaker(Ulid::new(), hour_window(10)).await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_concurrent_identical_start_yields_one_slot() {
        let h = harness().await;

        let a = {
            let engine = h.engine.clone();
            let speaker = h.speaker_id;
            tokio::spawn(async move { engine.reserve_for_speaker(speaker, hour_window(11)).await })
        };
        let b = {
            let engine = h.engine.clone();
            let speaker = h.speaker_id;
            tokio::spawn(async move { engine.reserve_for_speaker(speaker, hour_window(11)).await })
        };

        let (a, b) = tokio::join!(a, b);
        let outcomes = [a.unwrap(), b.unwrap()];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(outcomes
            .iter()
            .any(|r| matches!(r, Err(CoreError::ConflictError(_)))));
        assert_eq!(h.store.slot_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_reservation_leaves_store_unchanged() {
        let h = harness().await;
        let slot = h.engine.reserve_for_speaker(h.speaker_id, hour_window(12)).await.unwrap();

        let stranger = Ulid::new();
        let result = h.engine.cancel_speaker_reservation(stranger, slot.id).await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
        assert_eq!(h.store.slot_count(), 1);

        let result = h.engine.cancel_user_reservation(h.user_id, slot.id).await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_user_seat_lifecycle() {
        let mut h = harness().await;
        let slot = h.engine.reserve_for_speaker(h.speaker_id, hour_window(13)).await.unwrap();
        let _speaker_notice = h.rx.try_recv().unwrap();

        let seat = h.engine.reserve_for_user(h.user_id, slot.id).await.unwrap();
        assert_eq!(seat.booking_id, slot.id);
        assert!(matches!(h.rx.try_recv(), Ok(Notification::SlotReserved(_))));

        let duplicate = h.engine.reserve_for_user(h.user_id, slot.id).await;
        assert!(matches!(duplicate, Err(CoreError::ConflictError(_))));

        assert_eq!(h.engine.user_reservations(h.user_id).await.unwrap().len(), 1);

        h.engine.cancel_user_reservation(h.user_id, slot.id).await.unwrap();
        assert!(h.engine.user_reservations(h.user_id).await.unwrap().is_empty());
        // The slot outlives the user's seat
        assert!(h.engine.get_slot(slot.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_speaker_cancel_removes_attendees() {
        let h = harness().await;
        let slot = h.engine.reserve_for_speaker(h.speaker_id, hour_window(14)).await.unwrap();
        h.engine.reserve_for_user(h.user_id, slot.id).await.unwrap();

        h.engine.cancel_speaker_reservation(h.speaker_id, slot.id).await.unwrap();

        assert!(matches!(h.engine.get_slot(slot.id).await, Err(CoreError::NotFoundError(_))));
        assert_eq!(h.store.user_reservation_count(), 0);
        assert!(h.engine.speaker_reservations(h.speaker_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_reservation_on_missing_slot() {
        let h = harness().await;
        let result = h.engine.reserve_for_user(h.user_id, Ulid::new()).await;
        assert!(matches!(result, Err(CoreError::NotFoundError(_))));
    }

    #[tokio::test]
    async fn test_overlap_policy_rejects_intersecting_window() {
        let h = harness_with(InMemoryStore::new(), CollisionPolicy::Overlap, Duration::from_secs(1)).await;
        h.engine.reserve_for_speaker(h.speaker_id, hour_window(9)).await.unwrap();

        // Rules only admit on-the-hour windows, so seed an off-grid slot directly
        let odd = Slot::new(TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 10, 10, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 10, 11, 30, 0).unwrap(),
        ));
        h.store
            .insert_speaker_slot(&odd, h.speaker_id, CollisionPolicy::ExactStart)
            .await
            .unwrap();

        let result = h.engine.reserve_for_speaker(h.speaker_id, hour_window(11)).await;
        assert!(matches!(result, Err(CoreError::ConflictError(_))));

        let exact = harness_with(InMemoryStore::new(), CollisionPolicy::ExactStart, Duration::from_secs(1)).await;
        exact
            .store
            .insert_speaker_slot(&odd, exact.speaker_id, CollisionPolicy::ExactStart)
            .await
            .unwrap();
        assert!(exact.engine.reserve_for_speaker(exact.speaker_id, hour_window(11)).await.is_ok());
    }

    #[tokio::test]
    async fn test_slow_store_maps_to_unavailable() {
        let h = harness_with(
            InMemoryStore::with_latency(Duration::from_millis(200)),
            CollisionPolicy::ExactStart,
            Duration::from_millis(20),
        )
        .await;

        let result = h.engine.list_slots().await;
        assert!(matches!(result, Err(CoreError::UnavailableError(_))));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_start() {
        let h = harness().await;
        for hour in [15, 9, 12] {
            h.engine.reserve_for_speaker(h.speaker_id, hour_window(hour)).await.unwrap();
        }

        let starts: Vec<_> = h
            .engine
            .list_slots()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.session_start_time)
            .collect();
        assert_eq!(starts, vec![at(9), at(12), at(15)]);
    }
}
