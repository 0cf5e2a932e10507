//! Session credential material and its classification.
//!
//! Stored material arrives as a flat key/value map (one INI section or one
//! JSON object per profile). Decoding never panics or errors: anything that
//! does not fit a known schema classifies as `invalid`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub type RawCredentials = BTreeMap<String, String>;

const ACCESS_KEY: &str = "aws_access_key_id";
const SECRET_KEY: &str = "aws_secret_access_key";
const SESSION_TOKEN_KEYS: [&str; 2] = ["aws_session_token", "aws_security_token"];
const EXPIRATION_KEYS: [&str; 4] = [
    "aws_expiration",
    "aws_session_expiration",
    "x_security_token_expires",
    "expiration",
];

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    Valid,
    Expired,
    Invalid,
    Missing,
    Unknown,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Valid => "valid",
            CredentialKind::Expired => "expired",
            CredentialKind::Invalid => "invalid",
            CredentialKind::Missing => "missing",
            CredentialKind::Unknown => "unknown",
        }
    }

    pub fn display_tag(&self) -> DisplayTag {
        let (label, color, icon) = match self {
            CredentialKind::Valid => ("Active", "#28a745", "fas fa-check-circle"),
            CredentialKind::Expired => ("Expired", "#ffc107", "fas fa-clock"),
            CredentialKind::Invalid => ("Invalid", "#dc3545", "fas fa-exclamation-triangle"),
            CredentialKind::Missing => ("Not Configured", "#6c757d", "fas fa-question-circle"),
            CredentialKind::Unknown => ("Unknown", "#17a2b8", "fas fa-circle-question"),
        };
        DisplayTag { label, color, icon }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct DisplayTag {
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CredentialStatus {
    pub status: CredentialKind,
    pub message: String,
    #[serde(flatten)]
    pub tag: DisplayTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl CredentialStatus {
    pub fn new(kind: CredentialKind, message: impl Into<String>) -> Self {
        Self {
            status: kind,
            message: message.into(),
            tag: kind.display_tag(),
            expires_at: None,
        }
    }

    pub fn unknown(profile: &str, reason: &str) -> Self {
        Self::new(
            CredentialKind::Unknown,
            format!("Could not check credentials for {profile}: {reason}"),
        )
    }

    pub fn is_valid(&self) -> bool {
        self.status == CredentialKind::Valid
    }
}

/// Recognised layouts of stored session material.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SessionCredentials {
    /// Static access keys; never expire.
    LongTerm { access_key_id: String },
    /// Temporary keys issued by a federated login.
    Session {
        access_key_id: String,
        expires_at: Option<OffsetDateTime>,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    MissingField(&'static str),
    EmptyField(&'static str),
    BadExpiration(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingField(field) => write!(f, "missing {field}"),
            DecodeError::EmptyField(field) => write!(f, "empty {field}"),
            DecodeError::BadExpiration(value) => write!(f, "unreadable expiration '{value}'"),
        }
    }
}

pub fn decode_session(raw: &RawCredentials) -> Result<SessionCredentials, DecodeError> {
    let access_key_id = required(raw, ACCESS_KEY)?;
    required(raw, SECRET_KEY)?;

    let token = SESSION_TOKEN_KEYS
        .iter()
        .find_map(|key| raw.get(*key))
        .map(|value| value.trim());
    let expiration = EXPIRATION_KEYS
        .iter()
        .find_map(|key| raw.get(*key))
        .map(|value| value.trim());

    match (token, expiration) {
        (None, None) => Ok(SessionCredentials::LongTerm { access_key_id }),
        (Some(""), _) => Err(DecodeError::EmptyField("aws_session_token")),
        (_, Some(value)) => {
            let expires_at = parse_expiration(value)?;
            Ok(SessionCredentials::Session {
                access_key_id,
                expires_at: Some(expires_at),
            })
        }
        (Some(_), None) => Ok(SessionCredentials::Session {
            access_key_id,
            expires_at: None,
        }),
    }
}

fn required(raw: &RawCredentials, key: &'static str) -> Result<String, DecodeError> {
    let value = raw.get(key).ok_or(DecodeError::MissingField(key))?;
    let value = value.trim();
    if value.is_empty() {
        return Err(DecodeError::EmptyField(key));
    }
    Ok(value.to_string())
}

/// Accepts RFC 3339 timestamps and bare unix seconds.
fn parse_expiration(value: &str) -> Result<OffsetDateTime, DecodeError> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed);
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .ok_or_else(|| DecodeError::BadExpiration(value.to_string()))
}

/// Classifies one profile's stored material at `now`.
pub fn classify(profile: &str, raw: Option<&RawCredentials>, now: OffsetDateTime) -> CredentialStatus {
    let Some(raw) = raw else {
        return CredentialStatus::new(
            CredentialKind::Missing,
            format!("Profile '{profile}' has no stored credentials"),
        );
    };
    match decode_session(raw) {
        Ok(SessionCredentials::LongTerm { .. }) => CredentialStatus::new(
            CredentialKind::Valid,
            format!("Credentials active for {profile}"),
        ),
        Ok(SessionCredentials::Session {
            expires_at: None, ..
        }) => CredentialStatus::new(
            CredentialKind::Valid,
            format!("Session credentials present for {profile} (no expiration recorded)"),
        ),
        Ok(SessionCredentials::Session {
            expires_at: Some(expires_at),
            ..
        }) => {
            let stamp = expires_at.format(&Rfc3339).ok();
            let mut status = if expires_at <= now {
                CredentialStatus::new(
                    CredentialKind::Expired,
                    format!("Credentials expired for {profile}. Please refresh with aws-adfs."),
                )
            } else {
                CredentialStatus::new(
                    CredentialKind::Valid,
                    format!("Credentials active for {profile}"),
                )
            };
            status.expires_at = stamp;
            status
        }
        Err(err) => CredentialStatus::new(
            CredentialKind::Invalid,
            format!("Invalid credentials for {profile} ({err}). Please re-authenticate."),
        ),
    }
}

pub fn summarize<'a>(
    statuses: impl IntoIterator<Item = &'a CredentialStatus>,
) -> BTreeMap<CredentialKind, usize> {
    let mut summary = BTreeMap::new();
    for status in statuses {
        *summary.entry(status.status).or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn raw(pairs: &[(&str, &str)]) -> RawCredentials {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn missing_material_is_missing() {
        let status = classify("p", None, OffsetDateTime::now_utc());
        assert_eq!(status.status, CredentialKind::Missing);
        assert_eq!(status.tag.label, "Not Configured");
    }

    #[test]
    fn long_term_keys_are_valid() {
        let material = raw(&[(ACCESS_KEY, "AKIA"), (SECRET_KEY, "secret")]);
        let status = classify("p", Some(&material), OffsetDateTime::now_utc());
        assert!(status.is_valid());
    }

    #[test]
    fn session_expiry_is_compared_with_now() {
        let material = raw(&[
            (ACCESS_KEY, "ASIA"),
            (SECRET_KEY, "secret"),
            ("aws_session_token", "token"),
            ("aws_expiration", "2026-01-01T12:00:00Z"),
        ]);
        let before = classify("p", Some(&material), datetime!(2026-01-01 11:00 UTC));
        assert_eq!(before.status, CredentialKind::Valid);
        assert_eq!(before.expires_at.as_deref(), Some("2026-01-01T12:00:00Z"));
        let after = classify("p", Some(&material), datetime!(2026-01-01 12:30 UTC));
        assert_eq!(after.status, CredentialKind::Expired);
    }

    #[test]
    fn unix_expiration_is_accepted() {
        let material = raw(&[
            (ACCESS_KEY, "ASIA"),
            (SECRET_KEY, "secret"),
            ("aws_session_token", "token"),
            ("x_security_token_expires", "0"),
        ]);
        let status = classify("p", Some(&material), OffsetDateTime::now_utc());
        assert_eq!(status.status, CredentialKind::Expired);
    }

    #[test]
    fn malformed_material_fails_closed() {
        let no_secret = raw(&[(ACCESS_KEY, "AKIA")]);
        assert_eq!(
            classify("p", Some(&no_secret), OffsetDateTime::now_utc()).status,
            CredentialKind::Invalid
        );
        let garbage_expiry = raw(&[
            (ACCESS_KEY, "ASIA"),
            (SECRET_KEY, "secret"),
            ("aws_session_token", "token"),
            ("aws_expiration", "tomorrow-ish"),
        ]);
        let status = classify("p", Some(&garbage_expiry), OffsetDateTime::now_utc());
        assert_eq!(status.status, CredentialKind::Invalid);
        assert!(status.message.contains("tomorrow-ish"));
        let empty_token = raw(&[
            (ACCESS_KEY, "ASIA"),
            (SECRET_KEY, "secret"),
            ("aws_session_token", "  "),
        ]);
        assert_eq!(
            decode_session(&empty_token),
            Err(DecodeError::EmptyField("aws_session_token"))
        );
    }

    #[test]
    fn summary_counts_by_kind() {
        let statuses = [
            CredentialStatus::new(CredentialKind::Valid, ""),
            CredentialStatus::new(CredentialKind::Valid, ""),
            CredentialStatus::new(CredentialKind::Missing, ""),
        ];
        let summary = summarize(statuses.iter());
        assert_eq!(summary[&CredentialKind::Valid], 2);
        assert_eq!(summary[&CredentialKind::Missing], 1);
        assert!(!summary.contains_key(&CredentialKind::Expired));
    }
}
