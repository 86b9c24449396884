use podium_core::CoreError;
use serde::Deserialize;
use std::borrow::Cow;
use validator::{Validate, ValidationError};

const PASSWORD_SPECIALS: &str = "@$!%*?&";

fn rule_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// 8-255 chars drawn from letters, digits and `@$!%*?&`, with at least one
/// of each class.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| PASSWORD_SPECIALS.contains(c));

    if allowed && has_lower && has_upper && has_digit && has_special {
        Ok(())
    } else {
        Err(rule_error(
            "password_strength",
            "Password must contain uppercase, lowercase, number and special character",
        ))
    }
}

/// Digits with an optional fraction of one or two digits, e.g. `50` or `49.9`.
pub fn validate_price(price: &str) -> Result<(), ValidationError> {
    let (whole, fraction) = match price.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (price, None),
    };

    let whole_ok = !whole.is_empty() && whole.chars().all(|c| c.is_ascii_digit());
    let fraction_ok = fraction
        .map(|f| (1..=2).contains(&f.len()) && f.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(true);

    if whole_ok && fraction_ok {
        Ok(())
    } else {
        Err(rule_error(
            "price_format",
            "Price must be a decimal with at most two fractional digits",
        ))
    }
}

/// Runs derive-generated checks and flattens failures into a `ValidationError`.
pub fn check<T: Validate>(payload: &T) -> Result<(), CoreError> {
    payload
        .validate()
        .map_err(|errors| CoreError::ValidationError(errors.to_string()))
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100))]
    pub last_name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, max = 255), custom(function = "validate_password"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerSignupRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: String,
    #[validate(length(min = 2, max = 100))]
    pub last_name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, max = 255), custom(function = "validate_password"))]
    pub password: String,
    #[validate(custom(function = "validate_price"))]
    pub price_per_session: String,
    #[validate(length(min = 10, max = 1000))]
    pub bio: Option<String>,
}

/// Partial profile edit; absent fields are left as they are.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerUpdateRequest {
    #[validate(length(min = 2, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub last_name: Option<String>,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price_per_session: Option<String>,
    #[validate(length(min = 10, max = 1000))]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(length(equal = 6))]
    pub otp: String,
}
