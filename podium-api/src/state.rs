use podium_accounts::AccountService;
use podium_booking::{ReservationEngine, SlotRules};
use podium_core::notify::Notifier;
use podium_core::otp::OtpService;
use podium_core::repository::{IdentityRepository, KeyValueStore, SlotRepository};
use podium_store::app_config::BusinessRules;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Storage handles the application is wired against. Postgres/Redis in the
/// binary, in-memory backends in tests.
pub struct Backends {
    pub identities: Arc<dyn IdentityRepository>,
    pub slots: Arc<dyn SlotRepository>,
    pub kv: Arc<dyn KeyValueStore>,
}

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub engine: Arc<ReservationEngine>,
    pub slots: Arc<dyn SlotRepository>,
    pub cache: Arc<dyn KeyValueStore>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
}

impl AppState {
    pub fn new(
        backends: Backends,
        notifier: Notifier,
        auth: AuthConfig,
        business_rules: BusinessRules,
    ) -> Self {
        let io_timeout = business_rules.io_timeout();

        let otp = OtpService::new(backends.kv.clone(), business_rules.otp_ttl_seconds, io_timeout);
        let accounts = AccountService::new(
            backends.identities.clone(),
            otp,
            notifier.clone(),
            io_timeout,
        );

        let rules = SlotRules::new(
            business_rules.business_day_start_hour,
            business_rules.business_day_end_hour,
            business_rules.slot_duration_minutes,
        );
        let engine = ReservationEngine::new(
            backends.slots.clone(),
            backends.identities,
            notifier,
            rules,
            business_rules.collision_policy,
            io_timeout,
        );

        Self {
            accounts: Arc::new(accounts),
            engine: Arc::new(engine),
            slots: backends.slots,
            cache: backends.kv,
            auth,
            business_rules,
        }
    }
}
