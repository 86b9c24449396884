use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wraps a sensitive value (email address, one-time code) so that `{:?}` and
/// `{}` in log macros print a placeholder instead of the value.
///
/// Serialization is transparent: JSON payloads and queue messages carry the
/// real value.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Masked(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let email = Masked("ada@example.com".to_string());
        assert_eq!(format!("{:?}", email), "********");
        assert_eq!(format!("{}", email), "********");
        assert_eq!(email.expose(), "ada@example.com");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let code = Masked("123456".to_string());
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"123456\"");

        let back: Masked<String> = serde_json::from_str("\"654321\"").unwrap();
        assert_eq!(back.into_inner(), "654321");
    }
}
