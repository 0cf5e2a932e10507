use adfs_core::credentials::RawCredentials;
use adfs_core::error::StoreError;
use adfs_core::provider::CredentialStore;
use anyhow::Context;
use directories::BaseDirs;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const CREDENTIALS_FILE_ENV: &str = "AWS_SHARED_CREDENTIALS_FILE";

/// `$AWS_SHARED_CREDENTIALS_FILE`, else `~/.aws/credentials`.
pub fn default_credentials_path() -> anyhow::Result<PathBuf> {
    if let Some(path) = std::env::var_os(CREDENTIALS_FILE_ENV).filter(|path| !path.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let base = BaseDirs::new().context("resolve home directory")?;
    Ok(base.home_dir().join(".aws").join("credentials"))
}

/// Reads session material from the AWS shared credentials file. The file is
/// re-read on every lookup so logins performed by `aws-adfs` are picked up.
#[derive(Clone, Debug)]
pub struct AwsCredentialsFile {
    path: PathBuf,
}

impl AwsCredentialsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self::new(default_credentials_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sections(&self) -> Result<HashMap<String, RawCredentials>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(parse_sections(&contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(StoreError::unavailable(
                format!("cannot read {}", self.path.display()),
                err,
            )),
        }
    }
}

impl CredentialStore for AwsCredentialsFile {
    fn load(&self, profile: &str) -> Result<Option<RawCredentials>, StoreError> {
        Ok(self.sections()?.remove(profile))
    }
}

/// Minimal INI reader: `[section]` headers, `key = value` pairs, `#`/`;`
/// comments. Keys are lower-cased; later duplicates win.
pub fn parse_sections(contents: &str) -> HashMap<String, RawCredentials> {
    let mut sections: HashMap<String, RawCredentials> = HashMap::new();
    let mut current: Option<String> = None;
    for raw_line in contents.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
            let name = header.trim();
            let name = name.strip_prefix("profile ").unwrap_or(name).trim();
            sections.entry(name.to_string()).or_default();
            current = Some(name.to_string());
            continue;
        }
        let (Some(section), Some((key, value))) = (current.as_ref(), line.split_once('=')) else {
            continue;
        };
        if let Some(entries) = sections.get_mut(section) {
            entries.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }
    sections
}
