//! Outbound caller - places one scripted sales call per job
//!
//! A Domain-Driven Design implementation of an outbound calling agent:
//! it resolves who to dial from the job metadata, places the call through
//! a SIP provider into a real-time room, runs a conversation session, and
//! lets the conversation end, transfer, or hang up the call through tools.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use domain::shared::error::DomainError;
pub use domain::shared::result::Result;
