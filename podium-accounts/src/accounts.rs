use chrono::Utc;
use podium_core::identity::{
    hash_password, verify_password, Identity, NewIdentity, Role, Speaker, SpeakerProfile,
    SpeakerUpdate,
};
use podium_core::notify::{Notification, Notifier};
use podium_core::otp::OtpService;
use podium_core::repository::IdentityRepository;
use podium_core::{bounded, CoreError, CoreResult};
use podium_shared::models::events::VerificationRequestedEvent;
use podium_shared::Masked;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use ulid::Ulid;

use crate::validation::{
    check, LoginRequest, SignupRequest, SpeakerSignupRequest, SpeakerUpdateRequest,
    VerifyOtpRequest,
};

/// Signup, login, email verification and profile management for both roles.
pub struct AccountService {
    identities: Arc<dyn IdentityRepository>,
    otp: OtpService,
    notifier: Notifier,
    io_timeout: Duration,
}

fn invalid_credentials() -> CoreError {
    CoreError::AuthError("Invalid credentials".to_string())
}

// Keeps argon2 off the async workers
async fn hash_off_runtime(password: String) -> CoreResult<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CoreError::InternalError(format!("Hashing task failed: {}", e)))?
}

async fn verify_off_runtime(password: String, stored: String) -> CoreResult<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored))
        .await
        .map_err(|e| CoreError::InternalError(format!("Verification task failed: {}", e)))
}

impl AccountService {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        otp: OtpService,
        notifier: Notifier,
        io_timeout: Duration,
    ) -> Self {
        Self {
            identities,
            otp,
            notifier,
            io_timeout,
        }
    }

    async fn require(&self, role: Role, id: Ulid) -> CoreResult<Identity> {
        bounded(self.io_timeout, "identity lookup", self.identities.find_by_id(role, id))
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("{} {} not found", role, id)))
    }

    // ====================================================================
    // Signup / Login
    // ====================================================================

    pub async fn signup_user(&self, req: SignupRequest) -> CoreResult<Identity> {
        check(&req)?;
        let password_hash = hash_off_runtime(req.password).await?;

        let user = bounded(
            self.io_timeout,
            "user insert",
            self.identities.create_user(NewIdentity {
                first_name: req.first_name,
                last_name: req.last_name,
                email: req.email,
                password_hash,
            }),
        )
        .await?;

        info!("User {} signed up", user.id);
        Ok(user)
    }

    pub async fn signup_speaker(&self, req: SpeakerSignupRequest) -> CoreResult<Speaker> {
        check(&req)?;
        let password_hash = hash_off_runtime(req.password).await?;

        let speaker = bounded(
            self.io_timeout,
            "speaker insert",
            self.identities.create_speaker(
                NewIdentity {
                    first_name: req.first_name,
                    last_name: req.last_name,
                    email: req.email,
                    password_hash,
                },
                SpeakerProfile {
                    price_per_session: req.price_per_session,
                    bio: req.bio,
                },
            ),
        )
        .await?;

        info!("Speaker {} signed up", speaker.identity.id);
        Ok(speaker)
    }

    /// Unknown email and wrong password fail identically.
    pub async fn login(&self, role: Role, req: LoginRequest) -> CoreResult<Identity> {
        check(&req).map_err(|_| invalid_credentials())?;

        let identity = bounded(
            self.io_timeout,
            "identity lookup",
            self.identities.find_by_email(role, &req.email),
        )
        .await?
        .ok_or_else(invalid_credentials)?;

        if !verify_off_runtime(req.password, identity.password_hash.clone()).await? {
            warn!("Failed {} login for {}", role, identity.id);
            return Err(invalid_credentials());
        }

        info!("{} {} logged in", role, identity.id);
        Ok(identity)
    }

    // ====================================================================
    // Email verification
    // ====================================================================

    /// Issues a fresh code and queues the verification email. Returns the
    /// code's lifetime in seconds.
    pub async fn send_otp(&self, role: Role, id: Ulid) -> CoreResult<u64> {
        let identity = self.require(role, id).await?;
        let code = self.otp.issue(identity.id).await?;

        let queued = self
            .notifier
            .notify(Notification::VerificationRequested(VerificationRequestedEvent {
                identity_id: identity.id,
                recipient_email: Masked(identity.email),
                code: Masked(code),
                expires_in_seconds: self.otp.ttl_seconds(),
                timestamp: Utc::now().timestamp(),
            }));
        if !queued {
            return Err(CoreError::UnavailableError(
                "Verification email could not be queued".to_string(),
            ));
        }

        Ok(self.otp.ttl_seconds())
    }

    pub async fn verify(&self, role: Role, id: Ulid, req: VerifyOtpRequest) -> CoreResult<Identity> {
        check(&req).map_err(|_| CoreError::InvalidOtp)?;
        // Unknown ids fail as NotFound before a code is consumed
        self.require(role, id).await?;
        self.otp.verify(id, &req.otp).await?;

        let identity = bounded(
            self.io_timeout,
            "verification update",
            self.identities.mark_verified(role, id),
        )
        .await?;

        info!("{} {} verified", role, id);
        Ok(identity)
    }

    // ====================================================================
    // Profiles
    // ====================================================================

    pub async fn list_speakers(&self) -> CoreResult<Vec<Speaker>> {
        bounded(self.io_timeout, "speaker listing", self.identities.list_speakers()).await
    }

    pub async fn get_speaker(&self, id: Ulid) -> CoreResult<Speaker> {
        bounded(self.io_timeout, "speaker lookup", self.identities.get_speaker(id))
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("Speaker {} not found", id)))
    }

    pub async fn update_speaker(&self, id: Ulid, req: SpeakerUpdateRequest) -> CoreResult<Speaker> {
        check(&req)?;
        let update = SpeakerUpdate {
            first_name: req.first_name,
            last_name: req.last_name,
            email: req.email,
            price_per_session: req.price_per_session,
            bio: req.bio,
        };
        if update.is_empty() {
            return Err(CoreError::ValidationError("No fields to update".to_string()));
        }

        bounded(
            self.io_timeout,
            "speaker update",
            self.identities.update_speaker(id, update),
        )
        .await
    }

    pub async fn delete_speaker(&self, id: Ulid) -> CoreResult<Speaker> {
        let speaker = bounded(
            self.io_timeout,
            "speaker delete",
            self.identities.delete_speaker(id),
        )
        .await?;
        info!("Speaker {} removed their account", id);
        Ok(speaker)
    }

    pub async fn get_user(&self, id: Ulid) -> CoreResult<Identity> {
        self.require(Role::User, id).await
    }

    pub async fn list_users(&self) -> CoreResult<Vec<Identity>> {
        bounded(self.io_timeout, "user listing", self.identities.list_users()).await
    }
}
