//! Error taxonomy shared by the engine and its transports.
//!
//! Every variant renders a message that can be shown to an operator as-is.

use crate::model::ProfileId;
use thiserror::Error;

/// A client request rejected before it reaches the state machine or the
/// dispatcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Command must not be empty")]
    EmptyCommand,
    #[error("Select at least one profile")]
    NoProfilesSelected,
    #[error("Profile '{0}' not found in configuration")]
    UnknownProfile(ProfileId),
    #[error("Profiles not connected: {}", .0.join(", "))]
    NotConnected(Vec<ProfileId>),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Profile '{0}' not found in configuration")]
    UnknownProfile(ProfileId),
    #[error("Credentials required for '{0}'. Configure ADFS username, password and host first.")]
    MissingInputs(ProfileId),
    #[error("A connection attempt for '{0}' is already in progress")]
    AttemptInProgress(ProfileId),
}

/// Failure of a credential storage backend as a whole, as opposed to a
/// per-profile classification.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential storage unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
    #[error("credential storage rejected the write: {message}")]
    Write {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        StoreError::Unavailable {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Credential validation unavailable: {0}")]
    StorageUnavailable(#[source] StoreError),
}

/// Terminal failure of one profile's command execution.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionFailure {
    #[error("Command exited with status {0}")]
    NonZeroExit(i32),
    #[error("Command terminated by signal")]
    Terminated,
    #[error("Command timed out after {0} seconds")]
    TimedOut(u64),
    #[error("Failed to start command: {0}")]
    Spawn(String),
    #[error("skipped due to dev profile failure")]
    SkippedDevFailure,
    #[error("Execution cancelled")]
    Cancelled,
}
