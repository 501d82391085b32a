//! Ports to the collaborators a call depends on
//!
//! The room transport, the SIP provider API and the speech/LLM conversation
//! pipeline are not implemented here. The lifecycle controller only talks to
//! them through these traits; adapters live in the infrastructure layer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::call::entity::RemoteParticipant;
use crate::domain::shared::value_objects::{ParticipantIdentity, PhoneNumber};
use crate::domain::tool::{ToolInvoker, ToolSpec};

/// Error reported by the SIP provider, carrying the SIP status when known
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderError {
    pub code: Option<u16>,
    pub status: Option<String>,
    pub message: String,
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_sip_status(mut self, code: u16, status: impl Into<String>) -> Self {
        self.code = Some(code);
        self.status = Some(status.into());
        self
    }

    /// SIP status as code and reason, e.g. `486 Busy Here`
    pub fn sip_status(&self) -> String {
        match (self.code, self.status.as_deref()) {
            (Some(code), Some(status)) => format!("{} {}", code, status),
            (Some(code), None) => code.to_string(),
            (None, Some(status)) => status.to_string(),
            (None, None) => "unknown".to_string(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (SIP status: {})", self.message, self.sip_status())
    }
}

impl std::error::Error for ProviderError {}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("Failed to connect to room: {0}")]
    ConnectFailed(String),

    #[error("Participant {0} disconnected before joining")]
    ParticipantUnavailable(String),

    #[error("Failed to delete room: {0}")]
    DeleteFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Conversation session failed: {0}")]
    Failed(String),

    #[error("Conversation session is closed")]
    Closed,
}

/// Originate a call into the room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialRequest {
    pub room_name: String,
    pub trunk_id: String,
    pub call_to: PhoneNumber,
    pub participant_identity: ParticipantIdentity,
    /// Block until the far end answers or the attempt fails
    pub wait_until_answered: bool,
}

/// Redirect a participant to a telephone destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub room_name: String,
    pub participant_identity: ParticipantIdentity,
    /// `tel:` URI of the destination
    pub transfer_to: String,
}

/// Real-time room the agent and the dialed party share
#[async_trait]
pub trait Room: Send + Sync {
    fn name(&self) -> String;

    async fn connect(&self) -> Result<(), RoomError>;

    /// Resolves once a participant with `identity` has joined
    async fn wait_for_participant(
        &self,
        identity: &ParticipantIdentity,
    ) -> Result<RemoteParticipant, RoomError>;

    /// Delete the room, disconnecting everyone in it
    async fn delete(&self) -> Result<(), RoomError>;
}

/// SIP provider API
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SipProvider: Send + Sync {
    /// Dial out. With `wait_until_answered` the future resolves on answer.
    async fn create_sip_participant(&self, request: DialRequest) -> Result<(), ProviderError>;

    async fn transfer_sip_participant(&self, request: TransferRequest)
        -> Result<(), ProviderError>;
}

/// What the conversation pipeline needs to run the agent
#[derive(Clone)]
pub struct AgentProfile {
    pub instructions: String,
    pub tools: Vec<ToolSpec>,
    pub invoker: Arc<dyn ToolInvoker>,
}

impl fmt::Debug for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentProfile")
            .field("instructions", &self.instructions)
            .field("tools", &self.tools.iter().map(|t| t.name).collect::<Vec<_>>())
            .finish()
    }
}

/// Speech/LLM conversation pipeline bound to the room
#[async_trait]
pub trait ConversationSession: Send + Sync {
    /// Attach to the room and begin listening. The start request is issued
    /// on the first poll; the future may stay pending until the dialed party
    /// is available.
    async fn start(&self, room_name: &str, agent: AgentProfile) -> Result<(), SessionError>;

    /// Speak a turn following `instructions`. Resolves once the turn has
    /// been fully played out.
    async fn generate_reply(&self, instructions: &str) -> Result<(), SessionError>;

    /// Resolves when the turn currently being spoken, if any, has finished
    async fn wait_for_current_speech(&self);

    async fn close(&self);
}
