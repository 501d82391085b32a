//! Domain layer - Core call lifecycle rules
//!
//! This layer contains:
//! - Aggregates: the `CallSession` consistency boundary
//! - Value Objects: phone numbers, identities, states, end reasons
//! - Domain Services: metadata resolution into `DialInfo`
//! - Ports: traits for the room, the SIP provider and the conversation
//! - Domain Events: things that happened to the call

pub mod call;
pub mod dial_info;
pub mod shared;
pub mod telephony;
pub mod tool;

// Re-export commonly used types
pub use shared::{DomainError, Result};
