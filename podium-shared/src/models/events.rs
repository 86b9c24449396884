use chrono::{DateTime, Utc};
use ulid::Ulid;

use crate::pii::Masked;

/// A slot was reserved (by its speaker or by an attending user) and the
/// party should receive a confirmation plus a calendar invite.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SlotReservedEvent {
    pub slot_id: Ulid,
    pub recipient_email: Masked<String>,
    pub recipient_name: String,
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
    pub timestamp: i64,
}

/// A one-time verification code was issued for an account.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequestedEvent {
    pub identity_id: Ulid,
    pub recipient_email: Masked<String>,
    pub code: Masked<String>,
    pub expires_in_seconds: u64,
    pub timestamp: i64,
}
