//! Tool dispatcher
//!
//! Entry point for tool invocations coming from the conversation policy.
//! Lifecycle-terminating tools are forwarded to the controller, which owns
//! the call state; the informational tools are answered here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use crate::application::call_controller::CallLifecycleController;
use crate::config::AgentConfig;
use crate::domain::call::CallAction;
use crate::domain::tool::{ToolCall, ToolInvoker, ToolOutcome};
use crate::infrastructure::metrics;

pub struct ToolDispatcher {
    controller: Arc<CallLifecycleController>,
    availability_slots: Vec<String>,
    availability_latency: Duration,
}

impl ToolDispatcher {
    pub fn new(controller: Arc<CallLifecycleController>, config: &AgentConfig) -> Arc<Self> {
        Arc::new(Self {
            controller,
            availability_slots: config.availability_slots.clone(),
            availability_latency: config.availability_latency(),
        })
    }

    /// Execute one validated tool call
    pub async fn dispatch(&self, call: ToolCall) -> ToolOutcome {
        let tool = call.name();

        let outcome = if self.controller.state().is_terminal() {
            ToolOutcome::AlreadyEnded
        } else {
            match call {
                ToolCall::TransferCall => self.controller.request_transfer().await,
                ToolCall::EndCall => self.controller.request_hangup(CallAction::Hangup).await,
                ToolCall::DetectedAnsweringMachine => {
                    self.controller.request_hangup(CallAction::Voicemail).await
                }
                ToolCall::LookUpAvailability { date } => self.look_up_availability(&date).await,
                ToolCall::ConfirmAppointment { date, time } => {
                    info!("confirming appointment on {} at {}", date, time);
                    ToolOutcome::AppointmentConfirmed
                }
            }
        };

        if outcome.is_rejection() {
            if tool.is_terminating() {
                warn!("lifecycle action {} rejected: {}", tool.as_str(), outcome.as_str());
            } else {
                info!("{} rejected: {}", tool.as_str(), outcome.as_str());
            }
        }
        metrics::record_tool_invocation(tool, &outcome);
        outcome
    }

    async fn look_up_availability(&self, date: &str) -> ToolOutcome {
        info!("looking up availability for {}", date);
        tokio::time::sleep(self.availability_latency).await;
        ToolOutcome::AvailableTimes {
            times: self.availability_slots.clone(),
        }
    }
}

#[async_trait]
impl ToolInvoker for ToolDispatcher {
    async fn invoke(&self, name: &str, arguments: Value) -> ToolOutcome {
        match ToolCall::from_parts(name, arguments) {
            Ok(call) => self.dispatch(call).await,
            Err(e) => {
                warn!("rejecting tool invocation: {}", e);
                e.into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::domain::dial_info::DialInfo;
    use crate::infrastructure::simulated::SimulatedTelephony;
    use serde_json::json;

    fn dispatcher(telephony: &SimulatedTelephony) -> Arc<ToolDispatcher> {
        let mut config = Config::default();
        config.agent.availability_latency_ms = 0;

        let controller = CallLifecycleController::new(
            &config.sip,
            DialInfo::new(None, None, "there"),
            Arc::new(telephony.room()),
            Arc::new(telephony.provider()),
            Arc::new(telephony.session()),
        );
        ToolDispatcher::new(controller, &config.agent)
    }

    #[tokio::test]
    async fn test_informational_tools_answer_directly() {
        let telephony = SimulatedTelephony::new("room-info");
        let dispatcher = dispatcher(&telephony);

        let outcome = dispatcher
            .invoke("look_up_availability", json!({ "date": "next monday" }))
            .await;
        assert_eq!(
            outcome,
            ToolOutcome::AvailableTimes {
                times: vec!["1pm".to_string(), "2pm".to_string(), "3pm".to_string()]
            }
        );

        let outcome = dispatcher
            .invoke("confirm_appointment", json!({ "date": "monday", "time": "2pm" }))
            .await;
        assert_eq!(outcome.to_value(), json!("reservation confirmed"));
    }

    #[tokio::test]
    async fn test_malformed_invocations_are_rejected() {
        let telephony = SimulatedTelephony::new("room-malformed");
        let dispatcher = dispatcher(&telephony);

        assert_eq!(
            dispatcher.invoke("order_pizza", json!({})).await,
            ToolOutcome::UnknownTool {
                name: "order_pizza".to_string()
            }
        );
        assert!(matches!(
            dispatcher.invoke("look_up_availability", json!({})).await,
            ToolOutcome::InvalidArguments { .. }
        ));
    }

    #[tokio::test]
    async fn test_terminating_tools_before_answer_are_refused() {
        let telephony = SimulatedTelephony::new("room-idle");
        let dispatcher = dispatcher(&telephony);

        assert_eq!(dispatcher.dispatch(ToolCall::EndCall).await, ToolOutcome::NotConnected);
        assert_eq!(
            dispatcher.dispatch(ToolCall::DetectedAnsweringMachine).await,
            ToolOutcome::NotConnected
        );
        // no transfer destination at all
        assert_eq!(
            dispatcher.dispatch(ToolCall::TransferCall).await,
            ToolOutcome::CannotTransfer
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_availability_lookup_waits_for_backend() {
        let telephony = SimulatedTelephony::new("room-latency");
        let mut config = Config::default();
        config.agent.availability_latency_ms = 3000;
        let controller = CallLifecycleController::new(
            &config.sip,
            DialInfo::new(None, None, "there"),
            Arc::new(telephony.room()),
            Arc::new(telephony.provider()),
            Arc::new(telephony.session()),
        );
        let dispatcher = ToolDispatcher::new(controller, &config.agent);

        let started = tokio::time::Instant::now();
        let outcome = dispatcher
            .dispatch(ToolCall::LookUpAvailability {
                date: "friday".to_string(),
            })
            .await;

        assert!(matches!(outcome, ToolOutcome::AvailableTimes { .. }));
        assert!(started.elapsed() >= Duration::from_secs(3));
    }
}
