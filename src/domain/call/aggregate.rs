//! Call session aggregate root

use std::sync::Arc;

use crate::domain::call::entity::RemoteParticipant;
use crate::domain::call::event::{
    CallAnswered, CallDialing, CallEnded, CallEvent, CallEventBase, ParticipantBound,
    TransferStarted,
};
use crate::domain::call::value_object::{CallAction, CallState, EndReason};
use crate::domain::dial_info::DialInfo;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, PhoneNumber};
use chrono::{DateTime, Utc};

/// Live state of one outbound call.
///
/// The aggregate enforces the lifecycle rules: transitions follow
/// [`CallState::can_transition_to`], the remote participant is bound at most
/// once, and at most one lifecycle-terminating action is in flight. It lives
/// for the duration of the call only.
#[derive(Debug, Clone)]
pub struct CallSession {
    id: CallId,
    room_name: String,
    dial_info: Arc<DialInfo>,
    state: CallState,
    participant: Option<RemoteParticipant>,
    action_in_flight: Option<CallAction>,
    started_at: DateTime<Utc>,
    answered_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    events: Vec<CallEvent>,
}

impl CallSession {
    pub fn new(id: CallId, room_name: impl Into<String>, dial_info: Arc<DialInfo>) -> Self {
        Self {
            id,
            room_name: room_name.into(),
            dial_info,
            state: CallState::Idle,
            participant: None,
            action_in_flight: None,
            started_at: Utc::now(),
            answered_at: None,
            ended_at: None,
            events: Vec::new(),
        }
    }

    /// Start joining the room
    pub fn connect(&mut self) -> Result<()> {
        self.transition_to(CallState::Connecting)
    }

    /// Session start issued, dial request about to go out
    pub fn start_dialing(&mut self, phone_number: PhoneNumber) -> Result<()> {
        self.transition_to(CallState::Dialing)?;

        self.record_event(CallEvent::Dialing(CallDialing {
            base: CallEventBase::new("call.dialing", self.id),
            phone_number,
        }));

        Ok(())
    }

    /// Provider reported that the far end picked up
    pub fn answer(&mut self) -> Result<()> {
        self.transition_to(CallState::RingingOrRouting)?;
        let answered_at = Utc::now();
        self.answered_at = Some(answered_at);

        self.record_event(CallEvent::Answered(CallAnswered {
            base: CallEventBase::new("call.answered", self.id),
            answered_at,
        }));

        Ok(())
    }

    /// Bind the dialed party. Write-once.
    pub fn bind_participant(&mut self, participant: RemoteParticipant) -> Result<()> {
        if let Some(existing) = &self.participant {
            return Err(DomainError::AlreadyBound(existing.identity().to_string()));
        }
        self.transition_to(CallState::Active)?;

        self.record_event(CallEvent::ParticipantBound(ParticipantBound {
            base: CallEventBase::new("call.participant_bound", self.id),
            identity: participant.identity().clone(),
        }));
        self.participant = Some(participant);

        Ok(())
    }

    /// Claim the single action slot for a lifecycle-terminating action.
    ///
    /// Fails with `CallEnded` once terminal, `ActionInFlight` while another
    /// action holds the slot, and `InvalidStateTransition` before the
    /// participant is bound.
    pub fn begin_action(&mut self, action: CallAction) -> Result<()> {
        if self.state.is_terminal() {
            return Err(DomainError::CallEnded);
        }
        if let Some(current) = self.action_in_flight {
            return Err(DomainError::ActionInFlight(current.as_str().to_string()));
        }
        if self.state != CallState::Active {
            return Err(DomainError::InvalidStateTransition(format!(
                "cannot {} while {}",
                action.as_str(),
                self.state.name()
            )));
        }

        self.action_in_flight = Some(action);
        Ok(())
    }

    /// Release the action slot
    pub fn finish_action(&mut self) {
        self.action_in_flight = None;
    }

    pub fn begin_transfer(&mut self, transfer_to: PhoneNumber) -> Result<()> {
        self.transition_to(CallState::Transferring)?;

        self.record_event(CallEvent::TransferStarted(TransferStarted {
            base: CallEventBase::new("call.transfer_started", self.id),
            transfer_to,
        }));

        Ok(())
    }

    /// Transfer abandoned before reaching the provider
    pub fn abort_transfer(&mut self) -> Result<()> {
        if self.state != CallState::Transferring {
            return Err(DomainError::InvalidStateTransition(
                "Can only abort a transfer while transferring".to_string(),
            ));
        }
        self.transition_to(CallState::Active)
    }

    pub fn begin_hangup(&mut self) -> Result<()> {
        self.transition_to(CallState::Ending)
    }

    /// Move to the terminal state
    pub fn end(&mut self, reason: EndReason) -> Result<()> {
        self.transition_to(CallState::Ended(reason.clone()))?;
        let ended_at = Utc::now();
        self.ended_at = Some(ended_at);
        self.action_in_flight = None;

        let duration_seconds = self
            .answered_at
            .map(|answered| (ended_at - answered).num_seconds());

        self.record_event(CallEvent::Ended(CallEnded {
            base: CallEventBase::new("call.ended", self.id),
            reason,
            ended_at,
            duration_seconds,
        }));

        Ok(())
    }

    fn transition_to(&mut self, new_state: CallState) -> Result<()> {
        if !self.state.can_transition_to(&new_state) {
            return Err(DomainError::InvalidStateTransition(format!(
                "Cannot transition from {:?} to {:?}",
                self.state, new_state
            )));
        }

        self.state = new_state;
        Ok(())
    }

    fn record_event(&mut self, event: CallEvent) {
        self.events.push(event);
    }

    /// Take all pending events
    pub fn take_events(&mut self) -> Vec<CallEvent> {
        std::mem::take(&mut self.events)
    }

    // Getters
    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    pub fn dial_info(&self) -> &Arc<DialInfo> {
        &self.dial_info
    }

    pub fn state(&self) -> &CallState {
        &self.state
    }

    pub fn participant(&self) -> Option<&RemoteParticipant> {
        self.participant.as_ref()
    }

    pub fn action_in_flight(&self) -> Option<CallAction> {
        self.action_in_flight
    }

    pub fn started_at(&self) -> &DateTime<Utc> {
        &self.started_at
    }

    pub fn answered_at(&self) -> Option<&DateTime<Utc>> {
        self.answered_at.as_ref()
    }

    pub fn ended_at(&self) -> Option<&DateTime<Utc>> {
        self.ended_at.as_ref()
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shared::value_objects::ParticipantIdentity;

    fn number(raw: &str) -> PhoneNumber {
        PhoneNumber::parse(raw).unwrap()
    }

    fn create_active_session() -> CallSession {
        let dial_info = DialInfo::new(Some(number("+15551234567")), None, "there");
        let mut session = CallSession::new(CallId::new(), "room-1", Arc::new(dial_info));
        session.connect().unwrap();
        session.start_dialing(number("+15551234567")).unwrap();
        session.answer().unwrap();
        session
            .bind_participant(RemoteParticipant::new(
                ParticipantIdentity::new("phone_user"),
                None,
            ))
            .unwrap();
        session
    }

    #[test]
    fn test_call_lifecycle() {
        let mut session = create_active_session();
        assert_eq!(session.state(), &CallState::Active);
        assert_eq!(
            session.participant().map(|p| p.identity().as_str()),
            Some("phone_user")
        );

        session.begin_action(CallAction::Hangup).unwrap();
        session.begin_hangup().unwrap();
        session.end(EndReason::HungUp).unwrap();

        assert!(session.is_ended());
        assert!(session.ended_at().is_some());
        assert_eq!(session.action_in_flight(), None);

        let events = session.take_events();
        // Dialing, Answered, ParticipantBound, Ended
        assert_eq!(events.len(), 4);
        assert_eq!(events[3].event_type(), "call.ended");
    }

    #[test]
    fn test_participant_is_write_once() {
        let mut session = create_active_session();
        let result = session.bind_participant(RemoteParticipant::new(
            ParticipantIdentity::new("someone_else"),
            None,
        ));
        assert_eq!(
            result,
            Err(DomainError::AlreadyBound("phone_user".to_string()))
        );
    }

    #[test]
    fn test_single_action_in_flight() {
        let mut session = create_active_session();
        session.begin_action(CallAction::Transfer).unwrap();

        let second = session.begin_action(CallAction::Hangup);
        assert_eq!(
            second,
            Err(DomainError::ActionInFlight("transfer".to_string()))
        );

        session.finish_action();
        assert!(session.begin_action(CallAction::Hangup).is_ok());
    }

    #[test]
    fn test_actions_rejected_after_end() {
        let mut session = create_active_session();
        session.begin_hangup().unwrap();
        session.end(EndReason::HungUp).unwrap();

        assert_eq!(
            session.begin_action(CallAction::Hangup),
            Err(DomainError::CallEnded)
        );
        assert!(session.end(EndReason::HungUp).is_err());
    }

    #[test]
    fn test_actions_rejected_before_participant() {
        let dial_info = DialInfo::new(Some(number("+15551234567")), None, "there");
        let mut session = CallSession::new(CallId::new(), "room-1", Arc::new(dial_info));
        session.connect().unwrap();

        let result = session.begin_action(CallAction::Voicemail);
        assert!(matches!(
            result,
            Err(DomainError::InvalidStateTransition(_))
        ));
    }

    #[test]
    fn test_abort_transfer_returns_to_active() {
        let mut session = create_active_session();
        session.begin_transfer(number("+15557654321")).unwrap();
        session.abort_transfer().unwrap();
        assert_eq!(session.state(), &CallState::Active);

        assert!(session.abort_transfer().is_err());
    }
}
