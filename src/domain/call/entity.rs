//! Call entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::shared::value_objects::ParticipantIdentity;

/// The dialed party once it has joined the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParticipant {
    identity: ParticipantIdentity,
    /// Provider-assigned participant id, if the room exposes one
    sid: Option<String>,
    joined_at: DateTime<Utc>,
}

impl RemoteParticipant {
    pub fn new(identity: ParticipantIdentity, sid: Option<String>) -> Self {
        Self {
            identity,
            sid,
            joined_at: Utc::now(),
        }
    }

    pub fn identity(&self) -> &ParticipantIdentity {
        &self.identity
    }

    pub fn sid(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    pub fn joined_at(&self) -> &DateTime<Utc> {
        &self.joined_at
    }
}
