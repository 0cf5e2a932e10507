use crate::model::{ConnectionState, ProfileId};
use crate::runner::ExecutionResult;
use crate::validator::ValidationReport;
use uuid::Uuid;

/// One connection state transition, fanned out to every session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusEvent {
    pub profile: ProfileId,
    pub state: ConnectionState,
    pub message: Option<String>,
}

impl StatusEvent {
    pub fn new(profile: &str, state: ConnectionState, message: Option<String>) -> Self {
        Self {
            profile: profile.to_string(),
            state,
            message,
        }
    }
}

/// Everything a session can be told. Mapped onto wire messages in
/// `protocol`.
#[derive(Clone, Debug)]
pub enum Event {
    ConnectionStatus(StatusEvent),
    CommandStarted {
        profile: ProfileId,
        request_id: Uuid,
    },
    CommandOutput {
        profile: ProfileId,
        output: String,
        is_error: bool,
    },
    CommandComplete(ExecutionResult),
    ValidationResult(ValidationReport),
    Error {
        message: String,
    },
}

impl Event {
    pub fn error(message: impl Into<String>) -> Self {
        Event::Error {
            message: message.into(),
        }
    }

    pub fn profile(&self) -> Option<&str> {
        match self {
            Event::ConnectionStatus(status) => Some(&status.profile),
            Event::CommandStarted { profile, .. } | Event::CommandOutput { profile, .. } => {
                Some(profile)
            }
            Event::CommandComplete(result) => Some(&result.profile),
            Event::ValidationResult(_) | Event::Error { .. } => None,
        }
    }
}
