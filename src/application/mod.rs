//! Application layer - Use cases and application services
//!
//! This layer orchestrates the call aggregate and the ports to place one
//! outbound call. It's responsible for:
//! - Driving the call lifecycle (`call_controller`)
//! - Mediating tool invocations from the conversation policy (`tool_dispatcher`)
//! - Building the agent handed to the conversation session (`agent`)

pub mod agent;
pub mod call_controller;
pub mod tool_dispatcher;

pub use agent::OutboundAgent;
pub use call_controller::CallLifecycleController;
pub use tool_dispatcher::ToolDispatcher;
