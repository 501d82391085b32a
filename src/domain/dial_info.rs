//! Dial information resolution
//!
//! Job metadata comes from a producer this service does not control. It is
//! usually a JSON object with the optional keys `phone_number`,
//! `transfer_to` and `prospect_name`, but it may arrive already structured,
//! JSON-encoded twice, or mangled into something that is not JSON at all.
//! [`DialInfoResolver`] turns any of these into a strict [`DialInfo`] and
//! never fails; fallbacks are reported through logging and [`Resolution`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::domain::shared::value_objects::PhoneNumber;

const PHONE_NUMBER_KEY: &str = "phone_number";
const TRANSFER_TO_KEY: &str = "transfer_to";
const PROSPECT_NAME_KEY: &str = "prospect_name";

static PHONE_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"phone_number['"\s:]+([+\d]+)"#).unwrap());
static TRANSFER_TO_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"transfer_to['"\s:]+([+\d]+)"#).unwrap());

/// Resolved, immutable dialing parameters for one call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialInfo {
    phone_number: Option<PhoneNumber>,
    transfer_to: Option<PhoneNumber>,
    prospect_name: String,
}

impl DialInfo {
    pub fn new(
        phone_number: Option<PhoneNumber>,
        transfer_to: Option<PhoneNumber>,
        prospect_name: impl Into<String>,
    ) -> Self {
        Self {
            phone_number,
            transfer_to,
            prospect_name: prospect_name.into(),
        }
    }

    /// Number to dial. `None` means the call cannot be placed.
    pub fn phone_number(&self) -> Option<&PhoneNumber> {
        self.phone_number.as_ref()
    }

    pub fn transfer_to(&self) -> Option<&PhoneNumber> {
        self.transfer_to.as_ref()
    }

    pub fn prospect_name(&self) -> &str {
        &self.prospect_name
    }
}

/// Raw job metadata as handed over by the dispatcher of the job
#[derive(Debug, Clone, PartialEq)]
pub enum JobMetadata {
    Empty,
    Text(String),
    Structured(Map<String, Value>),
}

impl JobMetadata {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => JobMetadata::Empty,
            Value::Object(map) => JobMetadata::Structured(map),
            Value::String(text) => JobMetadata::Text(text),
            other => JobMetadata::Text(other.to_string()),
        }
    }
}

impl From<Option<String>> for JobMetadata {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(text) => JobMetadata::Text(text),
            None => JobMetadata::Empty,
        }
    }
}

impl From<&str> for JobMetadata {
    fn from(text: &str) -> Self {
        JobMetadata::Text(text.to_string())
    }
}

/// Environment-provided fallbacks for fields the metadata does not carry
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DialDefaults {
    pub phone_number: Option<String>,
    pub transfer_to: Option<String>,
    pub prospect_name: String,
}

/// Which path produced the raw fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataSource {
    /// No metadata at all
    Empty,
    /// Already a key/value map
    Structured,
    /// JSON object text
    Json,
    /// JSON string whose content is a JSON object
    EncodedJson,
    /// Label-anchored pattern extraction from text that is not a JSON object
    Extracted,
}

/// Outcome of resolving metadata, with provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub dial_info: DialInfo,
    pub source: MetadataSource,
    /// Fields that fell back to their configured default
    pub defaulted: Vec<&'static str>,
    /// Extraction found several different candidates for a field
    pub ambiguous: bool,
}

#[derive(Debug, Default)]
struct RawFields {
    phone_number: Option<String>,
    transfer_to: Option<String>,
    prospect_name: Option<String>,
}

impl RawFields {
    fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            phone_number: field_text(map, PHONE_NUMBER_KEY),
            transfer_to: field_text(map, TRANSFER_TO_KEY),
            prospect_name: field_text(map, PROSPECT_NAME_KEY),
        }
    }
}

fn field_text(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Null => None,
        other => {
            warn!("Ignoring metadata field {} with unexpected value {}", key, other);
            None
        }
    }
}

/// Turns untrusted job metadata into [`DialInfo`]
#[derive(Debug, Clone)]
pub struct DialInfoResolver {
    defaults: DialDefaults,
}

impl DialInfoResolver {
    pub fn new(defaults: DialDefaults) -> Self {
        Self { defaults }
    }

    pub fn resolve(&self, metadata: &JobMetadata) -> Resolution {
        let (raw, source, ambiguous) = match metadata {
            JobMetadata::Empty => (RawFields::default(), MetadataSource::Empty, false),
            JobMetadata::Structured(map) => {
                (RawFields::from_map(map), MetadataSource::Structured, false)
            }
            JobMetadata::Text(text) => Self::parse_text(text),
        };

        let mut defaulted = Vec::new();

        let phone_number = self.resolve_number(
            PHONE_NUMBER_KEY,
            raw.phone_number,
            self.defaults.phone_number.as_deref(),
            &mut defaulted,
        );
        let transfer_to = self.resolve_number(
            TRANSFER_TO_KEY,
            raw.transfer_to,
            self.defaults.transfer_to.as_deref(),
            &mut defaulted,
        );
        let prospect_name = match non_blank(raw.prospect_name) {
            Some(name) => name,
            None => {
                defaulted.push(PROSPECT_NAME_KEY);
                self.defaults.prospect_name.clone()
            }
        };

        let dial_info = DialInfo::new(phone_number, transfer_to, prospect_name);
        info!(
            "Resolved dial info from {:?} metadata: {:?} (defaulted: {:?})",
            source, dial_info, defaulted
        );

        Resolution {
            dial_info,
            source,
            defaulted,
            ambiguous,
        }
    }

    fn parse_text(text: &str) -> (RawFields, MetadataSource, bool) {
        if text.trim().is_empty() {
            return (RawFields::default(), MetadataSource::Empty, false);
        }

        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => (RawFields::from_map(&map), MetadataSource::Json, false),
            Ok(Value::String(inner)) => match serde_json::from_str::<Value>(&inner) {
                Ok(Value::Object(map)) => {
                    info!("Metadata was JSON-encoded twice, decoded inner object");
                    (RawFields::from_map(&map), MetadataSource::EncodedJson, false)
                }
                _ => Self::extract(&inner),
            },
            Ok(other) => {
                warn!("Metadata is JSON but not an object: {}", other);
                Self::extract(text)
            }
            Err(e) => {
                warn!("Metadata is not valid JSON ({}), falling back to extraction", e);
                Self::extract(text)
            }
        }
    }

    /// Best-effort recovery of number-shaped tokens following their labels
    fn extract(text: &str) -> (RawFields, MetadataSource, bool) {
        let (phone_number, phone_ambiguous) = first_match(&PHONE_NUMBER_PATTERN, text);
        let (transfer_to, transfer_ambiguous) = first_match(&TRANSFER_TO_PATTERN, text);
        let ambiguous = phone_ambiguous || transfer_ambiguous;

        if ambiguous {
            warn!(
                "Ambiguous metadata, several candidates matched; using the first ones: {:?}",
                text
            );
        }
        info!(
            "Extracted phone info using pattern match: phone_number={:?} transfer_to={:?}",
            phone_number, transfer_to
        );

        let raw = RawFields {
            phone_number,
            transfer_to,
            prospect_name: None,
        };
        (raw, MetadataSource::Extracted, ambiguous)
    }

    fn resolve_number(
        &self,
        field: &'static str,
        raw: Option<String>,
        default: Option<&str>,
        defaulted: &mut Vec<&'static str>,
    ) -> Option<PhoneNumber> {
        if let Some(value) = non_blank(raw) {
            match PhoneNumber::parse(&value) {
                Ok(number) => return Some(number),
                Err(e) => warn!("Discarding metadata {}: {}", field, e),
            }
        }

        defaulted.push(field);
        let default = non_blank(default.map(str::to_string))?;
        match PhoneNumber::parse(&default) {
            Ok(number) => Some(number),
            Err(e) => {
                warn!("Configured default for {} is unusable: {}", field, e);
                None
            }
        }
    }
}

/// Returns the first capture and whether any later capture differed from it
fn first_match(pattern: &Regex, text: &str) -> (Option<String>, bool) {
    let mut candidates = pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()));

    let first = candidates.next();
    let ambiguous = match &first {
        Some(first) => candidates.any(|other| &other != first),
        None => false,
    };
    (first, ambiguous)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver(default_phone: Option<&str>, default_transfer: Option<&str>) -> DialInfoResolver {
        DialInfoResolver::new(DialDefaults {
            phone_number: default_phone.map(str::to_string),
            transfer_to: default_transfer.map(str::to_string),
            prospect_name: "there".to_string(),
        })
    }

    fn phone(resolution: &Resolution) -> Option<&str> {
        resolution.dial_info.phone_number().map(|n| n.as_str())
    }

    fn transfer(resolution: &Resolution) -> Option<&str> {
        resolution.dial_info.transfer_to().map(|n| n.as_str())
    }

    #[test]
    fn test_json_metadata() {
        let resolution = resolver(None, None).resolve(&JobMetadata::from(
            r#"{"phone_number":"+15551234567","transfer_to":"+15557654321","prospect_name":"Asha"}"#,
        ));

        assert_eq!(resolution.source, MetadataSource::Json);
        assert_eq!(phone(&resolution), Some("+15551234567"));
        assert_eq!(transfer(&resolution), Some("+15557654321"));
        assert_eq!(resolution.dial_info.prospect_name(), "Asha");
        assert!(resolution.defaulted.is_empty());
        assert!(!resolution.ambiguous);
    }

    #[test]
    fn test_structured_metadata_used_directly() {
        let metadata = JobMetadata::from_value(json!({
            "phone_number": "+15551234567",
            "transfer_to": null,
        }));
        let resolution = resolver(None, Some("+15550000000")).resolve(&metadata);

        assert_eq!(resolution.source, MetadataSource::Structured);
        assert_eq!(phone(&resolution), Some("+15551234567"));
        assert_eq!(transfer(&resolution), Some("+15550000000"));
        assert_eq!(resolution.defaulted, vec!["transfer_to", "prospect_name"]);
    }

    #[test]
    fn test_numeric_phone_number_accepted() {
        let metadata = JobMetadata::from_value(json!({ "phone_number": 15551234567u64 }));
        let resolution = resolver(None, None).resolve(&metadata);
        assert_eq!(phone(&resolution), Some("15551234567"));
    }

    #[test]
    fn test_missing_phone_number_uses_default() {
        let inputs = [
            JobMetadata::Empty,
            JobMetadata::from(""),
            JobMetadata::from(r#"{"transfer_to":"+15557654321"}"#),
            JobMetadata::from("complete garbage"),
            JobMetadata::from_value(json!({ "prospect_name": "Ravi" })),
        ];

        let resolver = resolver(Some("+15550001111"), None);
        for metadata in &inputs {
            let resolution = resolver.resolve(metadata);
            assert_eq!(phone(&resolution), Some("+15550001111"), "{:?}", metadata);
            assert!(resolution.defaulted.contains(&"phone_number"));
        }
    }

    #[test]
    fn test_missing_phone_number_without_default() {
        let resolution = resolver(None, None).resolve(&JobMetadata::Empty);
        assert_eq!(resolution.dial_info.phone_number(), None);
        assert_eq!(resolution.dial_info.transfer_to(), None);
        assert_eq!(resolution.dial_info.prospect_name(), "there");

        let blank_default = resolver(Some("   "), None).resolve(&JobMetadata::Empty);
        assert_eq!(blank_default.dial_info.phone_number(), None);
    }

    #[test]
    fn test_blank_phone_number_falls_back_to_default() {
        let resolution = resolver(Some("+15550001111"), None)
            .resolve(&JobMetadata::from(r#"{"phone_number":""}"#));
        assert_eq!(phone(&resolution), Some("+15550001111"));
    }

    #[test]
    fn test_invalid_phone_number_falls_back_to_default() {
        let resolution = resolver(Some("+15550001111"), None)
            .resolve(&JobMetadata::from(r#"{"phone_number":"ask reception"}"#));
        assert_eq!(phone(&resolution), Some("+15550001111"));
    }

    #[test]
    fn test_double_encoded_json() {
        let encoded = serde_json::to_string(r#"{"phone_number":"+15551234567"}"#).unwrap();
        let resolution = resolver(None, None).resolve(&JobMetadata::Text(encoded));

        assert_eq!(resolution.source, MetadataSource::EncodedJson);
        assert_eq!(phone(&resolution), Some("+15551234567"));
    }

    #[test]
    fn test_extraction_from_malformed_text() {
        let malformed = [
            ("{'phone_number': '+15551234567', 'transfer_to': '+15557654321'}", "+15551234567"),
            ("phone_number: +15559876543", "+15559876543"),
            ("{\"phone_number\" : \"15551230000\", broken", "15551230000"),
            ("dial_info(phone_number '+441234567890')", "+441234567890"),
        ];

        for (text, expected) in malformed {
            let resolution = resolver(None, None).resolve(&JobMetadata::from(text));
            assert_eq!(resolution.source, MetadataSource::Extracted, "{}", text);
            assert_eq!(phone(&resolution), Some(expected), "{}", text);
        }

        let resolution = resolver(None, None).resolve(&JobMetadata::from(malformed[0].0));
        assert_eq!(transfer(&resolution), Some("+15557654321"));
    }

    #[test]
    fn test_ambiguous_extraction_takes_first_match() {
        let text = "phone_number: +15551111111 ... phone_number: +15552222222";
        let resolution = resolver(None, None).resolve(&JobMetadata::from(text));

        assert_eq!(phone(&resolution), Some("+15551111111"));
        assert!(resolution.ambiguous);

        let repeated = "phone_number: +15551111111, again phone_number: +15551111111";
        let resolution = resolver(None, None).resolve(&JobMetadata::from(repeated));
        assert!(!resolution.ambiguous);
    }

    #[test]
    fn test_json_non_object_is_extracted() {
        let resolution = resolver(Some("+15550001111"), None).resolve(&JobMetadata::from("[1, 2]"));
        assert_eq!(resolution.source, MetadataSource::Extracted);
        assert_eq!(phone(&resolution), Some("+15550001111"));
    }
}
