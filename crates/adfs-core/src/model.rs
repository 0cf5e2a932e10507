use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ProfileId = String;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EnvironmentGroup {
    #[serde(rename = "dev")]
    Dev,
    #[serde(rename = "np", alias = "non-prod")]
    NonProd,
    #[serde(rename = "pd", alias = "prod")]
    Prod,
}

impl EnvironmentGroup {
    pub const ALL: [EnvironmentGroup; 3] = [
        EnvironmentGroup::Dev,
        EnvironmentGroup::NonProd,
        EnvironmentGroup::Prod,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentGroup::Dev => "dev",
            EnvironmentGroup::NonProd => "np",
            EnvironmentGroup::Prod => "pd",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnvironmentGroup::Dev => "dev",
            EnvironmentGroup::NonProd => "non-prod",
            EnvironmentGroup::Prod => "prod",
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, EnvironmentGroup::Dev)
    }
}

impl fmt::Display for EnvironmentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EnvironmentGroup {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(EnvironmentGroup::Dev),
            "np" | "non-prod" | "nonprod" => Ok(EnvironmentGroup::NonProd),
            "pd" | "prod" | "production" => Ok(EnvironmentGroup::Prod),
            other => anyhow::bail!("unknown environment group '{other}'"),
        }
    }
}

/// Static catalog entry for one AWS profile.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub name: ProfileId,
    pub group: EnvironmentGroup,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProfileDefinition {
    pub fn new(name: &str, group: EnvironmentGroup, region: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            group,
            region: region.to_string(),
            description: Some(description.to_string()),
        }
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }

    /// Status shown to clients. A failed profile reads as disconnected; the
    /// failure itself travels in the message.
    pub fn display_status(&self) -> &'static str {
        match self {
            ConnectionState::Error => ConnectionState::Disconnected.as_str(),
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of one profile as owned by the connection manager.
#[derive(Clone, Debug, Serialize)]
pub struct ProfileSnapshot {
    pub name: ProfileId,
    pub group: EnvironmentGroup,
    pub region: String,
    pub description: Option<String>,
    pub state: ConnectionState,
    pub status: &'static str,
    pub credential_status: Option<crate::credentials::CredentialStatus>,
    pub last_error: Option<String>,
}
