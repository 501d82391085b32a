//! Configuration management
//!
//! Sources, later ones winning: built-in defaults, the optional
//! `outbound-caller.toml`, `OUTBOUND__<SECTION>__<KEY>` variables, then the
//! well-known `SIP_OUTBOUND_TRUNK_ID`, `DEFAULT_PHONE_NUMBER` and
//! `DEFAULT_TRANSFER_NUMBER` variables.

use std::collections::HashMap;
use std::time::Duration;

use config::{ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::domain::dial_info::DialDefaults;
use crate::domain::shared::value_objects::ParticipantIdentity;

const CONFIG_FILE: &str = "outbound-caller";
const ENV_PREFIX: &str = "OUTBOUND";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub sip: SipConfig,
    pub dial: DialConfig,
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SipConfig {
    /// Provider trunk used to originate calls. Empty means calls cannot be placed.
    pub outbound_trunk_id: String,
    /// Identity label given to the dialed party in the room
    pub participant_identity: String,
    pub participant_join_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialConfig {
    pub default_phone_number: String,
    pub default_transfer_number: String,
    pub default_prospect_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Worker name, also the prefix of the rooms it creates
    pub name: String,
    pub company: String,
    pub program: String,
    pub availability_slots: Vec<String>,
    /// Simulated latency of the scheduling backend
    pub availability_latency_ms: u64,
}

impl Config {
    /// Load from the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(std::env::vars().collect())
    }

    /// Load using `vars` in place of the process environment
    pub fn load_from(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let well_known = |name: &str| vars.get(name).cloned();

        config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("agent.availability_slots")
                    .source(Some(vars.clone())),
            )
            .set_override_option("sip.outbound_trunk_id", well_known("SIP_OUTBOUND_TRUNK_ID"))?
            .set_override_option("dial.default_phone_number", well_known("DEFAULT_PHONE_NUMBER"))?
            .set_override_option(
                "dial.default_transfer_number",
                well_known("DEFAULT_TRANSFER_NUMBER"),
            )?
            .build()?
            .try_deserialize()
    }
}

impl SipConfig {
    pub fn participant_identity(&self) -> ParticipantIdentity {
        ParticipantIdentity::new(self.participant_identity.clone())
    }

    pub fn participant_join_timeout(&self) -> Duration {
        Duration::from_secs(self.participant_join_timeout_secs)
    }
}

impl DialConfig {
    pub fn defaults(&self) -> DialDefaults {
        let non_empty = |value: &str| Some(value.to_string()).filter(|v| !v.trim().is_empty());

        DialDefaults {
            phone_number: non_empty(&self.default_phone_number),
            transfer_to: non_empty(&self.default_transfer_number),
            prospect_name: self.default_prospect_name.clone(),
        }
    }
}

impl AgentConfig {
    /// Fresh room name for one call placed by this agent
    pub fn room_name(&self) -> String {
        format!("{}-{}", self.name, uuid::Uuid::new_v4().simple())
    }

    pub fn availability_latency(&self) -> Duration {
        Duration::from_millis(self.availability_latency_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sip: SipConfig {
                outbound_trunk_id: String::new(),
                participant_identity: "phone_user".to_string(),
                participant_join_timeout_secs: 30,
            },
            dial: DialConfig {
                default_phone_number: String::new(),
                default_transfer_number: String::new(),
                default_prospect_name: "there".to_string(),
            },
            agent: AgentConfig {
                name: "outbound-caller".to_string(),
                company: "Futurense Technologies".to_string(),
                program: "Data Science certification program at IIT Mandi".to_string(),
                availability_slots: vec!["1pm".to_string(), "2pm".to_string(), "3pm".to_string()],
                availability_latency_ms: 3000,
            },
        }
    }
}
