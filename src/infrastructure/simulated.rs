//! In-process room, SIP provider and conversation session
//!
//! Stand-ins for the real-time transport, the provider API and the
//! speech/LLM pipeline. Everything they are asked to do is appended to a
//! shared [`Journal`] so callers can check what happened and in which order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::domain::call::RemoteParticipant;
use crate::domain::shared::value_objects::ParticipantIdentity;
use crate::domain::telephony::{
    AgentProfile, ConversationSession, DialRequest, ProviderError, Room, RoomError,
    SessionError, SipProvider, TransferRequest,
};
use crate::domain::tool::{ToolInvoker, ToolOutcome};

/// Something one of the simulated collaborators was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    RoomConnected,
    SessionStartIssued,
    SessionStarted,
    DialRequested { call_to: String, trunk_id: String },
    ParticipantJoined { identity: String },
    SpeechStarted { text: String },
    SpeechFinished { text: String },
    ToolReturned { tool: String, outcome: ToolOutcome },
    TransferRequested { transfer_to: String },
    RoomDeleted,
    SessionClosed,
}

/// Ordered record of [`SimEvent`]s, shared by all adapters of one call
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl Journal {
    pub fn record(&self, event: SimEvent) {
        debug!("simulated: {:?}", event);
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Index of the first matching event
    pub fn position(&self, predicate: impl Fn(&SimEvent) -> bool) -> Option<usize> {
        self.lock().iter().position(predicate)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SimEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Factory wiring the adapters of one simulated call together
pub struct SimulatedTelephony {
    room_name: String,
    journal: Journal,
    joined: Arc<watch::Sender<Option<ParticipantIdentity>>>,
}

impl SimulatedTelephony {
    pub fn new(room_name: impl Into<String>) -> Self {
        let (joined, _) = watch::channel(None);
        Self {
            room_name: room_name.into(),
            journal: Journal::default(),
            joined: Arc::new(joined),
        }
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn room(&self) -> SimulatedRoom {
        SimulatedRoom {
            name: self.room_name.clone(),
            journal: self.journal.clone(),
            joined: self.joined.subscribe(),
            connect_error: None,
            delete_error: None,
        }
    }

    /// Provider that answers immediately and lets the callee join
    pub fn provider(&self) -> SimulatedSipProvider {
        SimulatedSipProvider {
            journal: self.journal.clone(),
            joined: Arc::clone(&self.joined),
            answer_delay: Duration::ZERO,
            dial_error: None,
            participant_joins: true,
            transfer_error: None,
        }
    }

    pub fn session(&self) -> SimulatedSession {
        SimulatedSession {
            journal: self.journal.clone(),
            joined: self.joined.subscribe(),
            speaker: Speaker {
                journal: self.journal.clone(),
                speaking: Arc::new(watch::channel(false).0),
                delay: Duration::ZERO,
            },
            start_error: None,
            crash: None,
            fail_replies: false,
            script: Vec::new(),
            agent: Mutex::new(None),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

pub struct SimulatedRoom {
    name: String,
    journal: Journal,
    joined: watch::Receiver<Option<ParticipantIdentity>>,
    connect_error: Option<String>,
    delete_error: Option<String>,
}

impl SimulatedRoom {
    pub fn fail_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    pub fn fail_delete(mut self, message: impl Into<String>) -> Self {
        self.delete_error = Some(message.into());
        self
    }
}

#[async_trait]
impl Room for SimulatedRoom {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn connect(&self) -> Result<(), RoomError> {
        if let Some(message) = &self.connect_error {
            return Err(RoomError::ConnectFailed(message.clone()));
        }
        self.journal.record(SimEvent::RoomConnected);
        Ok(())
    }

    async fn wait_for_participant(
        &self,
        identity: &ParticipantIdentity,
    ) -> Result<RemoteParticipant, RoomError> {
        let mut joined = self.joined.clone();
        if joined
            .wait_for(|joined| joined.as_ref() == Some(identity))
            .await
            .is_err()
        {
            return Err(RoomError::ParticipantUnavailable(identity.to_string()));
        }

        self.journal.record(SimEvent::ParticipantJoined {
            identity: identity.to_string(),
        });
        Ok(RemoteParticipant::new(
            identity.clone(),
            Some(format!("PA_{}", identity)),
        ))
    }

    async fn delete(&self) -> Result<(), RoomError> {
        self.journal.record(SimEvent::RoomDeleted);
        match &self.delete_error {
            Some(message) => Err(RoomError::DeleteFailed(message.clone())),
            None => Ok(()),
        }
    }
}

pub struct SimulatedSipProvider {
    journal: Journal,
    joined: Arc<watch::Sender<Option<ParticipantIdentity>>>,
    answer_delay: Duration,
    dial_error: Option<ProviderError>,
    participant_joins: bool,
    transfer_error: Option<ProviderError>,
}

impl SimulatedSipProvider {
    pub fn answer_after(mut self, delay: Duration) -> Self {
        self.answer_delay = delay;
        self
    }

    pub fn reject_dial(mut self, error: ProviderError) -> Self {
        self.dial_error = Some(error);
        self
    }

    /// Answer, but never let the callee's participant into the room
    pub fn without_participant(mut self) -> Self {
        self.participant_joins = false;
        self
    }

    pub fn reject_transfer(mut self, error: ProviderError) -> Self {
        self.transfer_error = Some(error);
        self
    }
}

#[async_trait]
impl SipProvider for SimulatedSipProvider {
    async fn create_sip_participant(&self, request: DialRequest) -> Result<(), ProviderError> {
        self.journal.record(SimEvent::DialRequested {
            call_to: request.call_to.to_string(),
            trunk_id: request.trunk_id.clone(),
        });
        tokio::time::sleep(self.answer_delay).await;

        if let Some(error) = &self.dial_error {
            return Err(error.clone());
        }
        if self.participant_joins {
            self.joined.send_replace(Some(request.participant_identity));
        }
        Ok(())
    }

    async fn transfer_sip_participant(
        &self,
        request: TransferRequest,
    ) -> Result<(), ProviderError> {
        self.journal.record(SimEvent::TransferRequested {
            transfer_to: request.transfer_to,
        });
        match &self.transfer_error {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// One step the simulated conversation plays once the callee is in the room
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Say(String),
    Pause(Duration),
    Invoke { tool: String, arguments: Value },
}

#[derive(Clone)]
struct Speaker {
    journal: Journal,
    speaking: Arc<watch::Sender<bool>>,
    delay: Duration,
}

impl Speaker {
    async fn speak(&self, text: &str) {
        self.begin(text);
        tokio::time::sleep(self.delay).await;
        self.finish(text);
    }

    fn begin(&self, text: &str) {
        self.speaking.send_replace(true);
        self.journal.record(SimEvent::SpeechStarted {
            text: text.to_string(),
        });
    }

    fn finish(&self, text: &str) {
        self.journal.record(SimEvent::SpeechFinished {
            text: text.to_string(),
        });
        self.speaking.send_replace(false);
    }
}

pub struct SimulatedSession {
    journal: Journal,
    joined: watch::Receiver<Option<ParticipantIdentity>>,
    speaker: Speaker,
    start_error: Option<String>,
    crash: Option<(Duration, String)>,
    fail_replies: bool,
    script: Vec<ScriptStep>,
    agent: Mutex<Option<AgentProfile>>,
    closed: Arc<AtomicBool>,
}

impl SimulatedSession {
    /// Time each spoken turn takes to play out
    pub fn with_reply_delay(mut self, delay: Duration) -> Self {
        self.speaker.delay = delay;
        self
    }

    pub fn with_script(mut self, script: Vec<ScriptStep>) -> Self {
        self.script = script;
        self
    }

    pub fn fail_start(mut self, message: impl Into<String>) -> Self {
        self.start_error = Some(message.into());
        self
    }

    /// Let the callee join, then fail the running session after `delay`
    pub fn crash_after(mut self, delay: Duration, message: impl Into<String>) -> Self {
        self.crash = Some((delay, message.into()));
        self
    }

    pub fn fail_replies(mut self) -> Self {
        self.fail_replies = true;
        self
    }

    /// Start speaking a turn that lasts until [`Self::finish_speech`]
    pub fn begin_speech(&self, text: &str) {
        self.speaker.begin(text);
    }

    pub fn finish_speech(&self, text: &str) {
        self.speaker.finish(text);
    }

    /// Instructions of the agent the session was started with
    pub fn instructions(&self) -> Option<String> {
        self.lock_agent().as_ref().map(|a| a.instructions.clone())
    }

    fn lock_agent(&self) -> MutexGuard<'_, Option<AgentProfile>> {
        self.agent.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ConversationSession for SimulatedSession {
    async fn start(&self, room_name: &str, agent: AgentProfile) -> Result<(), SessionError> {
        self.journal.record(SimEvent::SessionStartIssued);
        if let Some(message) = &self.start_error {
            return Err(SessionError::Failed(message.clone()));
        }

        let invoker = Arc::clone(&agent.invoker);
        *self.lock_agent() = Some(agent);

        let mut joined = self.joined.clone();
        if joined.wait_for(Option::is_some).await.is_err() || self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }

        self.journal.record(SimEvent::SessionStarted);
        info!("conversation started in room {}", room_name);

        if !self.script.is_empty() {
            tokio::spawn(play_script(
                self.script.clone(),
                invoker,
                self.speaker.clone(),
                Arc::clone(&self.closed),
            ));
        }

        if let Some((delay, message)) = &self.crash {
            tokio::time::sleep(*delay).await;
            return Err(SessionError::Failed(message.clone()));
        }
        Ok(())
    }

    async fn generate_reply(&self, instructions: &str) -> Result<(), SessionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        if self.fail_replies {
            return Err(SessionError::Failed("speech synthesis unavailable".to_string()));
        }
        self.speaker.speak(instructions).await;
        Ok(())
    }

    async fn wait_for_current_speech(&self) {
        let mut speaking = self.speaker.speaking.subscribe();
        let _ = speaking.wait_for(|speaking| !*speaking).await;
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.lock_agent().take();
            self.journal.record(SimEvent::SessionClosed);
        }
    }
}

async fn play_script(
    script: Vec<ScriptStep>,
    invoker: Arc<dyn ToolInvoker>,
    speaker: Speaker,
    closed: Arc<AtomicBool>,
) {
    for step in script {
        if closed.load(Ordering::SeqCst) {
            break;
        }
        match step {
            ScriptStep::Say(text) => speaker.speak(&text).await,
            ScriptStep::Pause(duration) => tokio::time::sleep(duration).await,
            ScriptStep::Invoke { tool, arguments } => {
                let outcome = invoker.invoke(&tool, arguments).await;
                info!("tool {} returned {}", tool, outcome.to_value());
                speaker.journal.record(SimEvent::ToolReturned { tool, outcome });
            }
        }
    }
}
