//! Call bounded context - the lifecycle of one outbound call

pub mod aggregate;
pub mod entity;
pub mod event;
pub mod value_object;

pub use aggregate::CallSession;
pub use entity::RemoteParticipant;
pub use event::CallEvent;
pub use value_object::{CallAction, CallState, EndReason};
