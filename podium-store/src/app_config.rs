use podium_core::slot::CollisionPolicy;
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub auth: AuthConfig,
    pub smtp: SmtpConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub business_day_start_hour: u32,
    pub business_day_end_hour: u32,
    pub slot_duration_minutes: i64,
    #[serde(default)]
    pub collision_policy: CollisionPolicy,
    pub cache_ttl_seconds: u64,
    pub otp_ttl_seconds: u64,
    pub io_timeout_ms: u64,
    #[serde(default = "default_queue_capacity")]
    pub notification_queue_capacity: usize,
}

fn default_queue_capacity() -> usize { 1024 }

impl BusinessRules {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Rejects values the runtime cannot start with.
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.notification_queue_capacity == 0 {
            return Err(config::ConfigError::Message(
                "business_rules.notification_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.business_day_start_hour >= self.business_day_end_hour || self.business_day_end_hour > 24 {
            return Err(config::ConfigError::Message(format!(
                "business_rules hours {}-{} do not form a business day",
                self.business_day_start_hour, self.business_day_end_hour
            )));
        }
        if self.slot_duration_minutes <= 0 {
            return Err(config::ConfigError::Message(
                "business_rules.slot_duration_minutes must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            business_day_start_hour: 9,
            business_day_end_hour: 16,
            slot_duration_minutes: 60,
            collision_policy: CollisionPolicy::ExactStart,
            cache_ttl_seconds: 3600,
            otp_ttl_seconds: 600,
            io_timeout_ms: 5000,
            notification_queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_expiration_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 { 5 }

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmtpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub sender: String,
    /// STARTTLS relay when true, plaintext (local catchers) when false.
    #[serde(default = "default_starttls")]
    pub starttls: bool,
}

fn default_starttls() -> bool { true }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. PODIUM__AUTH__JWT_SECRET=...
            .add_source(config::Environment::with_prefix("PODIUM").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.business_rules.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_rules_from_toml() {
        let raw = r#"
            business_day_start_hour = 8
            business_day_end_hour = 18
            slot_duration_minutes = 30
            collision_policy = "overlap"
            cache_ttl_seconds = 60
            otp_ttl_seconds = 600
            io_timeout_ms = 250
        "#;
        let rules: BusinessRules = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(rules.business_day_start_hour, 8);
        assert_eq!(rules.collision_policy, CollisionPolicy::Overlap);
        assert_eq!(rules.io_timeout(), Duration::from_millis(250));
        assert_eq!(rules.notification_queue_capacity, 1024);
    }

    #[test]
    fn test_collision_policy_defaults_to_exact_start() {
        let raw = r#"
            business_day_start_hour = 9
            business_day_end_hour = 16
            slot_duration_minutes = 60
            cache_ttl_seconds = 3600
            otp_ttl_seconds = 600
            io_timeout_ms = 5000
        "#;
        let rules: BusinessRules = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(rules.collision_policy, CollisionPolicy::ExactStart);
    }

    #[test]
    fn test_zero_queue_capacity_is_rejected() {
        let raw = r#"
            business_day_start_hour = 9
            business_day_end_hour = 16
            slot_duration_minutes = 60
            cache_ttl_seconds = 3600
            otp_ttl_seconds = 600
            io_timeout_ms = 5000
            notification_queue_capacity = 0
        "#;
        let rules: BusinessRules = config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("notification_queue_capacity"));
    }

    #[test]
    fn test_default_rules_validate() {
        assert!(BusinessRules::default().validate().is_ok());

        let inverted = BusinessRules {
            business_day_start_hour: 16,
            business_day_end_hour: 9,
            ..BusinessRules::default()
        };
        assert!(inverted.validate().is_err());
    }
}
