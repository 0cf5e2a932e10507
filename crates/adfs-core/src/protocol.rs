//! JSON messages exchanged with a client session. Every frame is an object
//! tagged by `type`.

use crate::auth::LoginInputs;
use crate::connection::{ConnectOverrides, ConnectRequest};
use crate::credentials::{CredentialKind, CredentialStatus};
use crate::events::Event;
use crate::model::ProfileId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CredentialsPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub adfs_host: String,
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub no_sspi: Option<bool>,
    #[serde(default)]
    pub env_mode: Option<bool>,
}

impl fmt::Debug for CredentialsPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsPayload")
            .field("username", &self.username)
            .field("adfs_host", &self.adfs_host)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl CredentialsPayload {
    pub fn into_request(self) -> ConnectRequest {
        let inputs = LoginInputs {
            username: self.username,
            password: self.password,
            adfs_host: self.adfs_host,
        };
        ConnectRequest {
            inputs: Some(inputs).filter(LoginInputs::is_usable),
            overrides: ConnectOverrides {
                timeout: self.timeout.filter(|secs| *secs > 0).map(Duration::from_secs),
                retries: self.retries,
                no_sspi: self.no_sspi,
                env_mode: self.env_mode,
            },
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectProfile {
        profile: ProfileId,
        #[serde(default)]
        credentials: Option<CredentialsPayload>,
    },
    ToggleProfile {
        profile: ProfileId,
        #[serde(default)]
        credentials: Option<CredentialsPayload>,
    },
    DisconnectProfile {
        profile: ProfileId,
    },
    ExecuteCommand {
        #[serde(default)]
        profile: Option<ProfileId>,
        #[serde(default)]
        profiles: Option<Vec<ProfileId>>,
        command: String,
        #[serde(default)]
        timeout: Option<u64>,
    },
    ValidateCredentials {
        #[serde(default)]
        profiles: Option<Vec<ProfileId>>,
    },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn connect_request(credentials: Option<CredentialsPayload>) -> ConnectRequest {
        credentials
            .map(CredentialsPayload::into_request)
            .unwrap_or_default()
    }
}

/// Merges the single and multi-profile forms of `execute_command`, keeping
/// first-seen order.
pub fn command_targets(profile: Option<ProfileId>, profiles: Option<Vec<ProfileId>>) -> Vec<ProfileId> {
    let mut targets: Vec<ProfileId> = Vec::new();
    for candidate in profile.into_iter().chain(profiles.unwrap_or_default()) {
        let candidate = candidate.trim().to_string();
        if !candidate.is_empty() && !targets.contains(&candidate) {
            targets.push(candidate);
        }
    }
    targets
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionStatus {
        profile: ProfileId,
        status: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    CommandStarted {
        profile: ProfileId,
        request_id: Uuid,
    },
    CommandOutput {
        profile: ProfileId,
        output: String,
        is_error: bool,
    },
    CommandComplete {
        profile: ProfileId,
        success: bool,
        duration: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        skipped: bool,
    },
    CredentialsValidationResult {
        results: BTreeMap<ProfileId, CredentialStatus>,
        summary: BTreeMap<CredentialKind, usize>,
    },
    Error {
        message: String,
    },
}

impl From<Event> for ServerMessage {
    fn from(event: Event) -> Self {
        match event {
            Event::ConnectionStatus(status) => ServerMessage::ConnectionStatus {
                profile: status.profile,
                status: status.state.display_status(),
                message: status.message,
            },
            Event::CommandStarted {
                profile,
                request_id,
            } => ServerMessage::CommandStarted {
                profile,
                request_id,
            },
            Event::CommandOutput {
                profile,
                output,
                is_error,
            } => ServerMessage::CommandOutput {
                profile,
                output,
                is_error,
            },
            Event::CommandComplete(result) => ServerMessage::CommandComplete {
                output: result.display_output(),
                duration: result.duration.as_secs_f64(),
                success: result.success,
                skipped: result.skipped,
                error: result.error,
                profile: result.profile,
            },
            Event::ValidationResult(report) => ServerMessage::CredentialsValidationResult {
                results: report.results,
                summary: report.summary,
            },
            Event::Error { message } => ServerMessage::Error { message },
        }
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({ "type": "error", "message": err.to_string() }).to_string()
        })
    }
}
