use crate::config::ConnectionSettings;
use crate::model::ProfileId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// ADFS login inputs. The password never appears in `Debug` output.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginInputs {
    pub username: String,
    pub password: String,
    pub adfs_host: String,
}

impl LoginInputs {
    pub fn is_usable(&self) -> bool {
        !self.username.trim().is_empty()
            && !self.password.is_empty()
            && !self.adfs_host.trim().is_empty()
    }
}

impl fmt::Debug for LoginInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginInputs")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("adfs_host", &self.adfs_host)
            .finish()
    }
}

/// One authentication invocation for one profile.
#[derive(Clone, Debug)]
pub struct AuthRequest {
    pub profile: ProfileId,
    pub region: Option<String>,
    pub inputs: LoginInputs,
    pub no_sspi: bool,
    pub env_mode: bool,
    pub timeout: Duration,
}

impl AuthRequest {
    pub fn new(
        profile: &str,
        region: Option<String>,
        inputs: LoginInputs,
        settings: &ConnectionSettings,
    ) -> Self {
        Self {
            profile: profile.to_string(),
            region,
            inputs,
            no_sspi: settings.no_sspi,
            env_mode: settings.env_mode,
            timeout: settings.timeout(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSuccess {
    pub output: String,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthFailureReason {
    Credentials,
    Network,
    Tls,
    Timeout,
    ToolNotFound,
    Unknown,
}

impl AuthFailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailureReason::Credentials => "credentials",
            AuthFailureReason::Network => "network",
            AuthFailureReason::Tls => "tls",
            AuthFailureReason::Timeout => "timeout",
            AuthFailureReason::ToolNotFound => "tool-not-found",
            AuthFailureReason::Unknown => "unknown",
        }
    }

    pub fn summary(&self) -> &'static str {
        match self {
            AuthFailureReason::Credentials => {
                "Invalid username or password. Please check your credentials."
            }
            AuthFailureReason::Network => {
                "Cannot connect to ADFS server. Please check the hostname and network connection."
            }
            AuthFailureReason::Tls => {
                "SSL certificate error. Please check your certificate configuration."
            }
            AuthFailureReason::Timeout => "Authentication timed out.",
            AuthFailureReason::ToolNotFound => {
                "aws-adfs command not found. Please install aws-adfs: pip install aws-adfs"
            }
            AuthFailureReason::Unknown => "Authentication failed.",
        }
    }

    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AuthFailureReason::Credentials => Some(
                "Verify the username format (DOMAIN\\user or user@domain) and that the account is not locked.",
            ),
            AuthFailureReason::Network => Some(
                "Check VPN/proxy settings and that the ADFS host resolves and is reachable.",
            ),
            AuthFailureReason::Tls => Some(
                "Install the corporate root certificate or point REQUESTS_CA_BUNDLE at it.",
            ),
            AuthFailureReason::Timeout => Some(
                "Raise connection.timeout_secs or check whether ADFS is prompting for MFA.",
            ),
            AuthFailureReason::ToolNotFound => {
                Some("Make sure aws-adfs is installed and on PATH for the server process.")
            }
            AuthFailureReason::Unknown => None,
        }
    }
}

impl fmt::Display for AuthFailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationFailure {
    pub reason: AuthFailureReason,
    /// Tail of the tool output, or the spawn error.
    pub detail: String,
}

impl AuthenticationFailure {
    pub fn new(reason: AuthFailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            AuthFailureReason::Timeout,
            format!("Authentication timed out after {} seconds", after.as_secs()),
        )
    }

    pub fn user_message(&self) -> String {
        let mut message = match self.reason {
            AuthFailureReason::Unknown => {
                let first_line = self.detail.lines().map(str::trim).find(|line| !line.is_empty());
                first_line
                    .map(|line| line.to_string())
                    .unwrap_or_else(|| "Unknown authentication error".to_string())
            }
            AuthFailureReason::Timeout if !self.detail.is_empty() => self.detail.clone(),
            reason => reason.summary().to_string(),
        };
        if let Some(hint) = self.reason.remediation() {
            message.push(' ');
            message.push_str(hint);
        }
        message
    }
}

impl fmt::Display for AuthenticationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.user_message())
    }
}

impl std::error::Error for AuthenticationFailure {}

/// Maps `aws-adfs` output onto a failure reason. Patterns are checked in
/// priority order since tool output often mentions several symptoms.
pub fn classify_auth_output(output: &str) -> AuthFailureReason {
    let lower = output.to_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("invalid username or password")
        || has("authentication failed")
        || has("incorrect user id or password")
        || has("access denied")
    {
        AuthFailureReason::Credentials
    } else if has("ssl") && (has("certificate") || has("verify")) {
        AuthFailureReason::Tls
    } else if has("timed out") || has("timeout") {
        AuthFailureReason::Timeout
    } else if has("connection refused")
        || has("unable to connect")
        || has("network is unreachable")
        || has("name or service not known")
        || has("failed to resolve")
        || has("max retries exceeded")
    {
        AuthFailureReason::Network
    } else if has("command not found") || has("no such file or directory") {
        AuthFailureReason::ToolNotFound
    } else {
        AuthFailureReason::Unknown
    }
}

/// Keeps the last `max_lines` lines of tool output for diagnostics.
pub fn output_tail(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
