//! Tool surface offered to the conversation policy
//!
//! The set of tools is closed: the policy can only ask for one of the
//! [`ToolName`] variants. Every invocation yields a [`ToolOutcome`], including
//! rejections, so the policy always receives a defined answer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

/// Names of the tools the policy may invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    TransferCall,
    EndCall,
    LookUpAvailability,
    ConfirmAppointment,
    DetectedAnsweringMachine,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::TransferCall,
        ToolName::EndCall,
        ToolName::LookUpAvailability,
        ToolName::ConfirmAppointment,
        ToolName::DetectedAnsweringMachine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::TransferCall => "transfer_call",
            ToolName::EndCall => "end_call",
            ToolName::LookUpAvailability => "look_up_availability",
            ToolName::ConfirmAppointment => "confirm_appointment",
            ToolName::DetectedAnsweringMachine => "detected_answering_machine",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    /// Whether invoking the tool can end the call
    pub fn is_terminating(&self) -> bool {
        matches!(
            self,
            ToolName::TransferCall | ToolName::EndCall | ToolName::DetectedAnsweringMachine
        )
    }

    /// Descriptor handed to the conversation policy
    pub fn spec(&self) -> ToolSpec {
        let (description, parameters) = match self {
            ToolName::TransferCall => (
                "Transfer the call to a human agent, called after confirming with the user",
                no_parameters(),
            ),
            ToolName::EndCall => ("Called when the user wants to end the call", no_parameters()),
            ToolName::LookUpAvailability => (
                "Called when the user asks about alternative appointment availability",
                json!({
                    "type": "object",
                    "properties": {
                        "date": {
                            "type": "string",
                            "description": "The date of the appointment to check availability for"
                        }
                    },
                    "required": ["date"]
                }),
            ),
            ToolName::ConfirmAppointment => (
                "Called when the user confirms their appointment on a specific date. \
                 Use this tool only when they are certain about the date and time.",
                json!({
                    "type": "object",
                    "properties": {
                        "date": { "type": "string", "description": "The date of the appointment" },
                        "time": { "type": "string", "description": "The time of the appointment" }
                    },
                    "required": ["date", "time"]
                }),
            ),
            ToolName::DetectedAnsweringMachine => (
                "Called when the call reaches voicemail. Use this tool AFTER you hear the voicemail greeting",
                no_parameters(),
            ),
        };

        ToolSpec {
            name: self.as_str(),
            description,
            parameters,
        }
    }
}

fn no_parameters() -> Value {
    json!({ "type": "object", "properties": {} })
}

/// Name, description and JSON schema of one tool
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    date: String,
}

#[derive(Debug, Deserialize)]
struct AppointmentArgs {
    date: String,
    time: String,
}

/// Errors turning a raw request into a [`ToolCall`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

/// A validated tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    TransferCall,
    EndCall,
    LookUpAvailability { date: String },
    ConfirmAppointment { date: String, time: String },
    DetectedAnsweringMachine,
}

impl ToolCall {
    /// Build a call from the policy's `name` + `arguments` pair.
    ///
    /// Tools without parameters ignore whatever arguments were sent.
    pub fn from_parts(name: &str, arguments: Value) -> Result<Self, ToolError> {
        let tool = ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let invalid = |e: serde_json::Error| ToolError::InvalidArguments {
            tool: tool.as_str(),
            reason: e.to_string(),
        };

        let call = match tool {
            ToolName::TransferCall => ToolCall::TransferCall,
            ToolName::EndCall => ToolCall::EndCall,
            ToolName::DetectedAnsweringMachine => ToolCall::DetectedAnsweringMachine,
            ToolName::LookUpAvailability => {
                let args: AvailabilityArgs = serde_json::from_value(arguments).map_err(invalid)?;
                ToolCall::LookUpAvailability { date: args.date }
            }
            ToolName::ConfirmAppointment => {
                let args: AppointmentArgs = serde_json::from_value(arguments).map_err(invalid)?;
                ToolCall::ConfirmAppointment {
                    date: args.date,
                    time: args.time,
                }
            }
        };

        Ok(call)
    }

    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::TransferCall => ToolName::TransferCall,
            ToolCall::EndCall => ToolName::EndCall,
            ToolCall::LookUpAvailability { .. } => ToolName::LookUpAvailability,
            ToolCall::ConfirmAppointment { .. } => ToolName::ConfirmAppointment,
            ToolCall::DetectedAnsweringMachine => ToolName::DetectedAnsweringMachine,
        }
    }
}

/// Result of one dispatch, as reported back to the policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Participant handed to the human agent; the call is over for us
    Transferred { transfer_to: String },
    /// No transfer destination known; nothing changed
    CannotTransfer,
    /// Provider rejected the transfer; apologized and hung up
    TransferFailed { message: String },
    /// Announcement could not be delivered; call stays active
    TransferAborted { message: String },
    /// Call hung up
    CallEnded,
    AvailableTimes { times: Vec<String> },
    AppointmentConfirmed,
    /// Call already reached its terminal state
    AlreadyEnded,
    /// Another lifecycle-terminating action is being processed
    ActionInFlight,
    /// The dialed party has not joined yet
    NotConnected,
    InvalidArguments { reason: String },
    UnknownTool { name: String },
}

impl ToolOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolOutcome::Transferred { .. } => "transferred",
            ToolOutcome::CannotTransfer => "cannot_transfer",
            ToolOutcome::TransferFailed { .. } => "transfer_failed",
            ToolOutcome::TransferAborted { .. } => "transfer_aborted",
            ToolOutcome::CallEnded => "call_ended",
            ToolOutcome::AvailableTimes { .. } => "available_times",
            ToolOutcome::AppointmentConfirmed => "appointment_confirmed",
            ToolOutcome::AlreadyEnded => "already_ended",
            ToolOutcome::ActionInFlight => "action_in_flight",
            ToolOutcome::NotConnected => "not_connected",
            ToolOutcome::InvalidArguments { .. } => "invalid_arguments",
            ToolOutcome::UnknownTool { .. } => "unknown_tool",
        }
    }

    /// The invocation was refused without acting
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ToolOutcome::CannotTransfer
                | ToolOutcome::AlreadyEnded
                | ToolOutcome::ActionInFlight
                | ToolOutcome::NotConnected
                | ToolOutcome::InvalidArguments { .. }
                | ToolOutcome::UnknownTool { .. }
        )
    }

    /// Payload the language model sees as the tool's return value
    pub fn to_value(&self) -> Value {
        match self {
            ToolOutcome::Transferred { transfer_to } => {
                json!(format!("transferred call to {}", transfer_to))
            }
            ToolOutcome::CannotTransfer => json!("cannot transfer call"),
            ToolOutcome::TransferFailed { .. } => json!("there was an error transferring the call"),
            ToolOutcome::TransferAborted { .. } => json!("the call could not be transferred"),
            ToolOutcome::CallEnded => json!("call ended"),
            ToolOutcome::AvailableTimes { times } => json!({ "available_times": times }),
            ToolOutcome::AppointmentConfirmed => json!("reservation confirmed"),
            ToolOutcome::AlreadyEnded => json!("call already ended"),
            ToolOutcome::ActionInFlight => json!("another call action is already in progress"),
            ToolOutcome::NotConnected => json!("the call is not connected yet"),
            ToolOutcome::InvalidArguments { reason } => json!(format!("invalid arguments: {}", reason)),
            ToolOutcome::UnknownTool { name } => json!(format!("unknown tool: {}", name)),
        }
    }
}

impl From<ToolError> for ToolOutcome {
    fn from(error: ToolError) -> Self {
        match error {
            ToolError::UnknownTool(name) => ToolOutcome::UnknownTool { name },
            ToolError::InvalidArguments { reason, .. } => ToolOutcome::InvalidArguments { reason },
        }
    }
}

/// Entry point through which the conversation policy invokes tools
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Suspends until the action completes and returns its outcome
    async fn invoke(&self, name: &str, arguments: Value) -> ToolOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tool_names() {
        for tool in ToolName::ALL {
            assert_eq!(ToolName::parse(tool.as_str()), Some(tool));
        }
        assert_eq!(ToolName::parse("order_pizza"), None);
    }

    #[test]
    fn test_tool_call_from_parts() {
        let call = ToolCall::from_parts("look_up_availability", json!({ "date": "2026-10-20" })).unwrap();
        assert_eq!(
            call,
            ToolCall::LookUpAvailability {
                date: "2026-10-20".to_string()
            }
        );

        let call = ToolCall::from_parts("end_call", json!({})).unwrap();
        assert_eq!(call, ToolCall::EndCall);
        assert_eq!(ToolCall::from_parts("end_call", Value::Null).unwrap(), ToolCall::EndCall);
    }

    #[test]
    fn test_tool_call_rejects_bad_input() {
        assert_eq!(
            ToolCall::from_parts("order_pizza", json!({})),
            Err(ToolError::UnknownTool("order_pizza".to_string()))
        );

        let missing_time = ToolCall::from_parts("confirm_appointment", json!({ "date": "tomorrow" }));
        assert!(matches!(
            missing_time,
            Err(ToolError::InvalidArguments { tool: "confirm_appointment", .. })
        ));
    }

    #[test]
    fn test_terminating_tools() {
        assert!(ToolName::TransferCall.is_terminating());
        assert!(ToolName::EndCall.is_terminating());
        assert!(ToolName::DetectedAnsweringMachine.is_terminating());
        assert!(!ToolName::LookUpAvailability.is_terminating());
        assert!(!ToolName::ConfirmAppointment.is_terminating());
    }

    #[test]
    fn test_outcome_payloads() {
        assert_eq!(ToolOutcome::CannotTransfer.to_value(), json!("cannot transfer call"));
        assert_eq!(
            ToolOutcome::AvailableTimes {
                times: vec!["1pm".to_string(), "2pm".to_string()]
            }
            .to_value(),
            json!({ "available_times": ["1pm", "2pm"] })
        );
        assert_eq!(ToolOutcome::AppointmentConfirmed.to_value(), json!("reservation confirmed"));
        assert!(ToolOutcome::AlreadyEnded.is_rejection());
        assert!(!ToolOutcome::CallEnded.is_rejection());
    }

    #[test]
    fn test_specs_have_object_schemas() {
        for tool in ToolName::ALL {
            let spec = tool.spec();
            assert_eq!(spec.name, tool.as_str());
            assert_eq!(spec.parameters["type"], "object");
        }
        assert_eq!(
            ToolName::ConfirmAppointment.spec().parameters["required"],
            json!(["date", "time"])
        );
    }
}
