//! Call lifecycle controller
//!
//! Owns the [`CallSession`] of one outbound call and is the only writer of
//! its state. Drives the call from room join through dialing to the
//! participant joining, then executes the lifecycle requests submitted by
//! the tool dispatcher until the call reaches `Ended`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::application::agent::{TRANSFER_ANNOUNCEMENT, TRANSFER_APOLOGY};
use crate::config::SipConfig;
use crate::domain::call::{CallAction, CallSession, CallState, EndReason, RemoteParticipant};
use crate::domain::dial_info::DialInfo;
use crate::domain::shared::error::DomainError;
use crate::domain::shared::result::Result;
use crate::domain::shared::value_objects::{CallId, ParticipantIdentity};
use crate::domain::telephony::{
    AgentProfile, ConversationSession, DialRequest, Room, SessionError, SipProvider,
    TransferRequest,
};
use crate::domain::tool::ToolOutcome;
use crate::infrastructure::metrics;

type SessionTask = JoinHandle<std::result::Result<(), SessionError>>;

pub struct CallLifecycleController {
    call_id: CallId,
    trunk_id: String,
    participant_identity: ParticipantIdentity,
    participant_join_timeout: Duration,
    dial_info: Arc<DialInfo>,
    room: Arc<dyn Room>,
    provider: Arc<dyn SipProvider>,
    session: Arc<dyn ConversationSession>,
    call: Mutex<CallSession>,
    state_tx: watch::Sender<CallState>,
    session_task: Mutex<Option<AbortHandle>>,
}

impl CallLifecycleController {
    pub fn new(
        config: &SipConfig,
        dial_info: DialInfo,
        room: Arc<dyn Room>,
        provider: Arc<dyn SipProvider>,
        session: Arc<dyn ConversationSession>,
    ) -> Arc<Self> {
        let call_id = CallId::new();
        let dial_info = Arc::new(dial_info);
        let call = CallSession::new(call_id, room.name(), Arc::clone(&dial_info));
        let (state_tx, _) = watch::channel(CallState::Idle);

        Arc::new(Self {
            call_id,
            trunk_id: config.outbound_trunk_id.clone(),
            participant_identity: config.participant_identity(),
            participant_join_timeout: config.participant_join_timeout(),
            dial_info,
            room,
            provider,
            session,
            call: Mutex::new(call),
            state_tx,
            session_task: Mutex::new(None),
        })
    }

    pub fn call_id(&self) -> &CallId {
        &self.call_id
    }

    pub fn dial_info(&self) -> &Arc<DialInfo> {
        &self.dial_info
    }

    /// Current lifecycle state
    pub fn state(&self) -> CallState {
        self.state_tx.borrow().clone()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<CallState> {
        self.state_tx.subscribe()
    }

    pub async fn participant(&self) -> Option<RemoteParticipant> {
        self.call.lock().await.participant().cloned()
    }

    /// Place the call and return once it has ended.
    ///
    /// Fails only when called on a call that already left `Idle`.
    pub async fn run(&self, agent: AgentProfile) -> Result<EndReason> {
        let room_name = self.room.name();
        self.transition(|call| call.connect()).await?;
        metrics::record_call_started();

        info!("connecting to room {}", room_name);
        if let Err(e) = self.room.connect().await {
            error!("failed to connect to room {}: {}", room_name, e);
            return Ok(self
                .finish(EndReason::ConnectFailed {
                    message: e.to_string(),
                })
                .await);
        }

        let Some(phone_number) = self.dial_info.phone_number().cloned() else {
            error!("Cannot make outbound call: no phone number provided");
            return Ok(self.abandon(EndReason::NoPhoneNumber, None).await);
        };
        if self.trunk_id.trim().is_empty() {
            error!("Cannot make outbound call: no outbound SIP trunk configured");
            return Ok(self.abandon(EndReason::MissingTrunk, None).await);
        }

        self.transition(|call| call.start_dialing(phone_number.clone()))
            .await?;

        // The session must be listening before the far end can pick up
        let session_task = match self.start_session(&room_name, agent).await {
            Ok(task) => task,
            Err(reason) => return Ok(self.abandon(reason, None).await),
        };
        let session_abort = session_task.abort_handle();
        let session_failure = session_failure(session_task);
        tokio::pin!(session_failure);

        let request = DialRequest {
            room_name,
            trunk_id: self.trunk_id.clone(),
            call_to: phone_number,
            participant_identity: self.participant_identity.clone(),
            wait_until_answered: true,
        };
        let dial = self.dial_and_bind(request);
        tokio::pin!(dial);

        let dialed = tokio::select! {
            result = &mut dial => result,
            e = &mut session_failure => {
                error!("conversation session failed while dialing: {}", e);
                Err(EndReason::SessionFailed { message: e.to_string() })
            }
        };

        if let Err(reason) = dialed {
            return Ok(self.abandon(reason, Some(session_abort)).await);
        }

        *self.session_task.lock().await = Some(session_abort);
        Ok(self.wait_for_end(session_failure).await)
    }

    /// Spawn the session start and wait until its request has been issued
    async fn start_session(
        &self,
        room_name: &str,
        agent: AgentProfile,
    ) -> std::result::Result<SessionTask, EndReason> {
        let session = Arc::clone(&self.session);
        let room_name = room_name.to_string();
        let (issued_tx, issued_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut start = session.start(&room_name, agent);
            let first_poll = futures::poll!(start.as_mut());
            let _ = issued_tx.send(());
            match first_poll {
                Poll::Ready(result) => result,
                Poll::Pending => start.await,
            }
        });

        match issued_rx.await {
            Ok(()) => {
                debug!("conversation session start issued for call {}", self.call_id);
                Ok(task)
            }
            Err(_) => Err(EndReason::SessionFailed {
                message: "conversation session aborted before starting".to_string(),
            }),
        }
    }

    async fn dial_and_bind(&self, request: DialRequest) -> std::result::Result<(), EndReason> {
        let identity = request.participant_identity.clone();
        info!("dialing {} via trunk {}", request.call_to, request.trunk_id);

        if let Err(e) = self.provider.create_sip_participant(request).await {
            error!(
                "error creating SIP participant: {}, SIP status: {}",
                e.message,
                e.sip_status()
            );
            return Err(EndReason::DialFailed { error: e });
        }

        self.transition(|call| call.answer())
            .await
            .map_err(|e| EndReason::SessionFailed {
                message: e.to_string(),
            })?;

        let joined = tokio::time::timeout(
            self.participant_join_timeout,
            self.room.wait_for_participant(&identity),
        )
        .await;
        let participant = match joined {
            Ok(Ok(participant)) => participant,
            Ok(Err(e)) => {
                error!("participant {} unavailable: {}", identity, e);
                return Err(EndReason::ParticipantUnavailable {
                    message: e.to_string(),
                });
            }
            Err(_) => {
                error!(
                    "participant {} did not join within {:?}",
                    identity, self.participant_join_timeout
                );
                return Err(EndReason::ParticipantUnavailable {
                    message: format!(
                        "no participant joined within {:?}",
                        self.participant_join_timeout
                    ),
                });
            }
        };

        self.transition(|call| call.bind_participant(participant))
            .await
            .map_err(|e| EndReason::SessionFailed {
                message: e.to_string(),
            })?;
        info!("participant {} joined, call is active", identity);

        Ok(())
    }

    /// Wait for the call to end, tearing it down if the session dies first
    async fn wait_for_end<F>(&self, mut session_failure: Pin<&mut F>) -> EndReason
    where
        F: Future<Output = SessionError>,
    {
        let mut state_rx = self.state_tx.subscribe();
        let mut session_alive = true;
        loop {
            let state = state_rx.borrow_and_update().clone();
            if let CallState::Ended(reason) = state {
                return reason;
            }
            tokio::select! {
                // The sender lives in `self`, so the channel cannot close here
                _ = state_rx.changed() => {}
                e = session_failure.as_mut(), if session_alive => {
                    session_alive = false;
                    self.on_session_failure(e).await;
                }
            }
        }
    }

    async fn on_session_failure(&self, e: SessionError) {
        error!("conversation session failed during call {}: {}", self.call_id, e);
        let claimed = self
            .transition(|call| {
                call.begin_action(CallAction::Hangup)?;
                call.begin_hangup().map_err(|e| {
                    call.finish_action();
                    e
                })
            })
            .await;
        match claimed {
            Ok(()) => {
                self.teardown(EndReason::SessionFailed {
                    message: e.to_string(),
                })
                .await
            }
            // a terminating tool is already ending the call
            Err(reason) => debug!("leaving teardown of call {} to: {}", self.call_id, reason),
        }
    }

    /// Hang up on behalf of the conversation policy.
    ///
    /// A normal hang-up lets the current turn finish first; the voicemail
    /// path tears down immediately.
    pub async fn request_hangup(&self, action: CallAction) -> ToolOutcome {
        let claimed = self
            .transition(|call| {
                call.begin_action(action)?;
                call.begin_hangup().map_err(|e| {
                    call.finish_action();
                    e
                })
            })
            .await;
        if let Err(e) = claimed {
            return rejection(e);
        }

        let participant = self.participant_label().await;
        let reason = match action {
            CallAction::Voicemail => {
                info!("detected answering machine for {}", participant);
                EndReason::Voicemail
            }
            _ => {
                info!("ending the call for {}", participant);
                self.session.wait_for_current_speech().await;
                EndReason::HungUp
            }
        };

        self.teardown(reason).await;
        ToolOutcome::CallEnded
    }

    /// Announce, then hand the participant to the transfer destination.
    ///
    /// A provider rejection is apologized for and degrades to a hang-up.
    pub async fn request_transfer(&self) -> ToolOutcome {
        let Some(transfer_to) = self.dial_info.transfer_to().cloned() else {
            return ToolOutcome::CannotTransfer;
        };

        let claimed = self
            .transition(|call| {
                let identity = call
                    .participant()
                    .map(|p| p.identity().clone())
                    .ok_or_else(|| {
                        DomainError::InvalidStateTransition("no participant bound".to_string())
                    })?;
                call.begin_action(CallAction::Transfer)?;
                call.begin_transfer(transfer_to.clone()).map_err(|e| {
                    call.finish_action();
                    e
                })?;
                Ok(identity)
            })
            .await;
        let identity = match claimed {
            Ok(identity) => identity,
            Err(e) => return rejection(e),
        };

        info!("transferring call to {}", transfer_to);

        // let the message play fully before transferring
        if let Err(e) = self.session.generate_reply(TRANSFER_ANNOUNCEMENT).await {
            warn!("could not announce transfer, staying on the call: {}", e);
            let restored = self
                .transition(|call| {
                    let restored = call.abort_transfer();
                    call.finish_action();
                    restored
                })
                .await;
            if let Err(e) = restored {
                warn!("failed to restore call after aborted transfer: {}", e);
            }
            return ToolOutcome::TransferAborted {
                message: e.to_string(),
            };
        }

        let request = TransferRequest {
            room_name: self.room.name(),
            participant_identity: identity,
            transfer_to: transfer_to.to_tel_uri(),
        };

        match self.provider.transfer_sip_participant(request).await {
            Ok(()) => {
                info!("transferred call to {}", transfer_to);
                self.stop_session().await;
                self.finish(EndReason::Transferred {
                    transfer_to: transfer_to.to_string(),
                })
                .await;
                ToolOutcome::Transferred {
                    transfer_to: transfer_to.to_string(),
                }
            }
            Err(e) => {
                error!("error transferring call: {}", e);
                if let Err(apology) = self.session.generate_reply(TRANSFER_APOLOGY).await {
                    warn!("could not apologize for the failed transfer: {}", apology);
                }
                if let Err(e) = self.transition(|call| call.begin_hangup()).await {
                    warn!("unexpected state after failed transfer: {}", e);
                }

                let message = e.to_string();
                self.teardown(EndReason::TransferFailed { error: e }).await;
                ToolOutcome::TransferFailed { message }
            }
        }
    }

    /// Delete the room, stop the session and mark the call ended
    async fn teardown(&self, reason: EndReason) {
        self.release_room().await;
        self.stop_session().await;
        self.finish(reason).await;
    }

    /// End a call that never became active
    async fn abandon(&self, reason: EndReason, session_task: Option<AbortHandle>) -> EndReason {
        if let Some(task) = session_task {
            self.session.close().await;
            task.abort();
        }
        self.release_room().await;
        self.finish(reason).await
    }

    async fn release_room(&self) {
        if let Err(e) = self.room.delete().await {
            warn!("failed to delete room {}: {}", self.room.name(), e);
        }
    }

    async fn stop_session(&self) {
        let task = self.session_task.lock().await.take();
        self.session.close().await;
        if let Some(task) = task {
            task.abort();
        }
    }

    async fn finish(&self, reason: EndReason) -> EndReason {
        let ended = self
            .transition(|call| {
                call.end(reason.clone())?;
                let lasted = Utc::now().signed_duration_since(*call.started_at());
                Ok((call.room_name().to_string(), lasted.num_seconds()))
            })
            .await;
        match ended {
            Ok((room_name, lasted)) => {
                metrics::record_call_ended(&reason);
                info!(
                    "call {} in room {} ended after {}s: {:?}",
                    self.call_id, room_name, lasted, reason
                );
            }
            Err(e) => warn!("ignoring end of call {} ({:?}): {}", self.call_id, reason, e),
        }
        reason
    }

    async fn participant_label(&self) -> String {
        self.call
            .lock()
            .await
            .participant()
            .map(|p| p.identity().to_string())
            .unwrap_or_else(|| "unknown participant".to_string())
    }

    /// Apply a change to the aggregate and publish the resulting state
    async fn transition<T>(
        &self,
        apply: impl FnOnce(&mut CallSession) -> Result<T>,
    ) -> Result<T> {
        let mut call = self.call.lock().await;
        let result = apply(&mut call);

        for event in call.take_events() {
            debug!("call {} emitted {}", event.call_id(), event.event_type());
        }

        let state = call.state();
        self.state_tx.send_if_modified(|current| {
            if *current == *state {
                return false;
            }
            info!("call {} state {} -> {}", self.call_id, current.name(), state.name());
            *current = state.clone();
            true
        });

        result
    }
}

/// Resolves only if the session start fails; a clean or aborted finish never resolves
async fn session_failure(task: SessionTask) -> SessionError {
    match task.await {
        Ok(Err(e)) => e,
        Err(e) if e.is_panic() => SessionError::Failed(format!("session task panicked: {}", e)),
        _ => std::future::pending().await,
    }
}

fn rejection(error: DomainError) -> ToolOutcome {
    match error {
        DomainError::CallEnded => ToolOutcome::AlreadyEnded,
        DomainError::ActionInFlight(_) => ToolOutcome::ActionInFlight,
        _ => ToolOutcome::NotConnected,
    }
}
