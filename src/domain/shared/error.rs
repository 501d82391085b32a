//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Participant already bound: {0}")]
    AlreadyBound(String),

    #[error("Another call action is in flight: {0}")]
    ActionInFlight(String),

    #[error("Call has already ended")]
    CallEnded,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
