//! Infrastructure layer - Technical implementations
//!
//! This layer contains:
//! - Prometheus metrics for calls and tool invocations
//! - Simulated room, SIP provider and conversation session adapters

pub mod metrics;
pub mod simulated;
