use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use ulid::Ulid;

use crate::repository::KeyValueStore;
use crate::{bounded, CoreError, CoreResult};

pub const DEFAULT_OTP_TTL_SECONDS: u64 = 600;

/// Issues and checks 6-digit verification codes kept under `otp:<id>`.
///
/// A new code replaces any outstanding one. A successful check consumes the
/// code. There is no attempt counter.
pub struct OtpService {
    store: Arc<dyn KeyValueStore>,
    ttl_seconds: u64,
    io_timeout: Duration,
}

impl OtpService {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl_seconds: u64, io_timeout: Duration) -> Self {
        Self {
            store,
            ttl_seconds,
            io_timeout,
        }
    }

    pub fn key(identity_id: &Ulid) -> String {
        format!("otp:{}", identity_id)
    }

    pub fn generate_code() -> String {
        rand::thread_rng().gen_range(100_000..=999_999).to_string()
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub async fn issue(&self, identity_id: Ulid) -> CoreResult<String> {
        let code = Self::generate_code();
        let key = Self::key(&identity_id);

        bounded(
            self.io_timeout,
            "otp store",
            self.store.set_ex(&key, &code, self.ttl_seconds),
        )
        .await?;

        tracing::info!("OTP issued for {} (ttl {}s)", identity_id, self.ttl_seconds);
        Ok(code)
    }

    pub async fn verify(&self, identity_id: Ulid, code: &str) -> CoreResult<()> {
        let key = Self::key(&identity_id);
        let matched = bounded(
            self.io_timeout,
            "otp check",
            self.store.take_if_equals(&key, code.trim()),
        )
        .await?;

        if !matched {
            tracing::info!("OTP check failed for {}", identity_id);
            return Err(CoreError::InvalidOtp);
        }
        Ok(())
    }
}
