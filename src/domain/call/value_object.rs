//! Call value objects

use serde::{Deserialize, Serialize};

use crate::domain::telephony::ProviderError;

/// Lifecycle state of one outbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallState {
    /// Job accepted, room not joined yet
    Idle,
    /// Joining the communication room
    Connecting,
    /// Conversation session started, dial request outstanding
    Dialing,
    /// Far end answered, waiting for its participant to join the room
    RingingOrRouting,
    /// Participant bound, conversation in progress
    Active,
    /// Announcing and redirecting the participant to a human
    Transferring,
    /// Waiting for the current turn to finish before teardown
    Ending,
    /// Call is over; terminal
    Ended(EndReason),
}

impl CallState {
    /// Check if state transition is valid
    pub fn can_transition_to(&self, new_state: &CallState) -> bool {
        use CallState::*;

        match (self, new_state) {
            (Idle, Connecting) => true,

            // Connect failure or a call that cannot be dialed
            (Connecting, Dialing) => true,
            (Connecting, Ended(_)) => true,

            (Dialing, RingingOrRouting) => true,
            (Dialing, Ended(_)) => true,

            (RingingOrRouting, Active) => true,
            (RingingOrRouting, Ended(_)) => true,

            (Active, Transferring) => true,
            (Active, Ending) => true,

            // Announcement failed (back to Active), provider accepted (Ended),
            // provider rejected (hang up through Ending)
            (Transferring, Active) => true,
            (Transferring, Ended(_)) => true,
            (Transferring, Ending) => true,

            (Ending, Ended(_)) => true,

            (Ended(_), _) => false,

            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Ended(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Connecting => "connecting",
            CallState::Dialing => "dialing",
            CallState::RingingOrRouting => "ringing_or_routing",
            CallState::Active => "active",
            CallState::Transferring => "transferring",
            CallState::Ending => "ending",
            CallState::Ended(_) => "ended",
        }
    }
}

/// Reason a call reached `Ended`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum EndReason {
    /// No phone number after metadata resolution and defaults
    NoPhoneNumber,
    /// No outbound trunk configured
    MissingTrunk,
    /// Joining the room failed
    ConnectFailed { message: String },
    /// Provider rejected or could not complete the dial attempt
    DialFailed { error: ProviderError },
    /// Far end answered but its participant never joined the room
    ParticipantUnavailable { message: String },
    /// Conversation session failed while dialing or during the conversation
    SessionFailed { message: String },
    /// Hung up on request of the conversation policy
    HungUp,
    /// Answering machine detected
    Voicemail,
    /// Participant handed over to a human agent
    Transferred { transfer_to: String },
    /// Transfer rejected by the provider, call hung up after an apology
    TransferFailed { error: ProviderError },
}

impl EndReason {
    /// Short label, used as a metrics dimension
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::NoPhoneNumber => "no_phone_number",
            EndReason::MissingTrunk => "missing_trunk",
            EndReason::ConnectFailed { .. } => "connect_failed",
            EndReason::DialFailed { .. } => "dial_failed",
            EndReason::ParticipantUnavailable { .. } => "participant_unavailable",
            EndReason::SessionFailed { .. } => "session_failed",
            EndReason::HungUp => "hung_up",
            EndReason::Voicemail => "voicemail",
            EndReason::Transferred { .. } => "transferred",
            EndReason::TransferFailed { .. } => "transfer_failed",
        }
    }

    /// Whether the call ended before anyone on the far end was reached
    pub fn is_unanswered(&self) -> bool {
        matches!(
            self,
            EndReason::NoPhoneNumber
                | EndReason::MissingTrunk
                | EndReason::ConnectFailed { .. }
                | EndReason::DialFailed { .. }
                | EndReason::ParticipantUnavailable { .. }
                | EndReason::SessionFailed { .. }
        )
    }
}

/// Lifecycle-terminating actions the conversation policy can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallAction {
    Transfer,
    Hangup,
    Voicemail,
}

impl CallAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallAction::Transfer => "transfer",
            CallAction::Hangup => "hangup",
            CallAction::Voicemail => "voicemail",
        }
    }
}
