//! Call domain events

use crate::domain::call::value_object::EndReason;
use crate::domain::shared::events::{DomainEvent, EventMetadata};
use crate::domain::shared::value_objects::{CallId, ParticipantIdentity, PhoneNumber};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base struct for all call events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEventBase {
    pub metadata: EventMetadata,
    pub call_id: CallId,
}

impl CallEventBase {
    pub fn new(event_type: &str, call_id: CallId) -> Self {
        Self {
            metadata: EventMetadata::new(event_type),
            call_id,
        }
    }
}

/// Dial request issued to the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallDialing {
    pub base: CallEventBase,
    pub phone_number: PhoneNumber,
}

impl DomainEvent for CallDialing {
    fn event_type(&self) -> &'static str {
        "call.dialing"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.base.metadata.occurred_at
    }
}

/// Far end answered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAnswered {
    pub base: CallEventBase,
    pub answered_at: DateTime<Utc>,
}

impl DomainEvent for CallAnswered {
    fn event_type(&self) -> &'static str {
        "call.answered"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.base.metadata.occurred_at
    }
}

/// Remote participant joined and was bound to the call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantBound {
    pub base: CallEventBase,
    pub identity: ParticipantIdentity,
}

impl DomainEvent for ParticipantBound {
    fn event_type(&self) -> &'static str {
        "call.participant_bound"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.base.metadata.occurred_at
    }
}

/// Transfer to a human agent started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferStarted {
    pub base: CallEventBase,
    pub transfer_to: PhoneNumber,
}

impl DomainEvent for TransferStarted {
    fn event_type(&self) -> &'static str {
        "call.transfer_started"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.base.metadata.occurred_at
    }
}

/// Call reached its terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnded {
    pub base: CallEventBase,
    pub reason: EndReason,
    pub ended_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
}

impl DomainEvent for CallEnded {
    fn event_type(&self) -> &'static str {
        "call.ended"
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.base.metadata.occurred_at
    }
}

/// Union of all call events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CallEvent {
    Dialing(CallDialing),
    Answered(CallAnswered),
    ParticipantBound(ParticipantBound),
    TransferStarted(TransferStarted),
    Ended(CallEnded),
}

impl CallEvent {
    pub fn call_id(&self) -> &CallId {
        match self {
            CallEvent::Dialing(e) => &e.base.call_id,
            CallEvent::Answered(e) => &e.base.call_id,
            CallEvent::ParticipantBound(e) => &e.base.call_id,
            CallEvent::TransferStarted(e) => &e.base.call_id,
            CallEvent::Ended(e) => &e.base.call_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            CallEvent::Dialing(e) => e.event_type(),
            CallEvent::Answered(e) => e.event_type(),
            CallEvent::ParticipantBound(e) => e.event_type(),
            CallEvent::TransferStarted(e) => e.event_type(),
            CallEvent::Ended(e) => e.event_type(),
        }
    }
}
