use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// A reserved time interval: the unit being booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: Ulid,
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Slot {
    pub fn new(window: TimeWindow) -> Self {
        Self {
            id: Ulid::new(),
            session_start_time: window.start,
            session_end_time: window.end,
            created_at: Utc::now(),
        }
    }

    pub fn window(&self) -> TimeWindow {
        TimeWindow::new(self.session_start_time, self.session_end_time)
    }
}

/// Binds the owning speaker to a slot. At most one per slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerReservation {
    pub booking_id: Ulid,
    pub speaker_id: Ulid,
}

/// Binds an attending user to a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReservation {
    pub booking_id: Ulid,
    pub user_id: Ulid,
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// How a requested window is compared against slots that already exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Only an identical start timestamp collides. Overlapping windows with
    /// different starts are accepted.
    #[default]
    ExactStart,
    /// Any intersection with an existing slot collides.
    Overlap,
}

impl CollisionPolicy {
    pub fn collides(&self, existing: &TimeWindow, requested: &TimeWindow) -> bool {
        match self {
            CollisionPolicy::ExactStart => existing.start == requested.start,
            CollisionPolicy::Overlap => existing.overlaps(requested),
        }
    }
}
