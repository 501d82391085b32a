//! Shared value objects used across the call lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::error::DomainError;

/// Call identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Telephone number in E.164-like form: optional leading `+`, then digits.
///
/// Common visual separators (spaces, dashes, dots, parentheses) are dropped
/// while parsing, so `+1 (555) 123-4567` and `+15551234567` are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 3;
    const MAX_DIGITS: usize = 15;

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let compact: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        let digits = compact.strip_prefix('+').unwrap_or(&compact);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::ValidationError(format!(
                "'{}' is not a phone number",
                raw
            )));
        }
        if !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits.len()) {
            return Err(DomainError::ValidationError(format!(
                "phone number '{}' must have {}-{} digits",
                raw,
                Self::MIN_DIGITS,
                Self::MAX_DIGITS
            )));
        }

        Ok(Self(compact))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `tel:` URI used when redirecting a participant to this number
    pub fn to_tel_uri(&self) -> String {
        format!("tel:{}", self.0)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identity label of a room participant (e.g. `phone_user`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantIdentity(String);

impl ParticipantIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        Self(identity.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_number_parse() {
        let number = PhoneNumber::parse("+15551234567").unwrap();
        assert_eq!(number.as_str(), "+15551234567");

        let formatted = PhoneNumber::parse(" +1 (555) 123-4567 ").unwrap();
        assert_eq!(formatted, number);

        let extension = PhoneNumber::parse("1234").unwrap();
        assert_eq!(extension.as_str(), "1234");
    }

    #[test]
    fn test_phone_number_rejects_garbage() {
        assert!(PhoneNumber::parse("").is_err());
        assert!(PhoneNumber::parse("+").is_err());
        assert!(PhoneNumber::parse("call me maybe").is_err());
        assert!(PhoneNumber::parse("12").is_err());
        assert!(PhoneNumber::parse("+1234567890123456").is_err());
    }

    #[test]
    fn test_tel_uri() {
        let number = PhoneNumber::parse("+15557654321").unwrap();
        assert_eq!(number.to_tel_uri(), "tel:+15557654321");
    }

    #[test]
    fn test_phone_number_serde() {
        let number: PhoneNumber = serde_json::from_str("\"+15551234567\"").unwrap();
        assert_eq!(number.as_str(), "+15551234567");
        assert!(serde_json::from_str::<PhoneNumber>("\"nope\"").is_err());
        assert_eq!(serde_json::to_string(&number).unwrap(), "\"+15551234567\"");
    }
}
