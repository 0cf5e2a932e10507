use crate::model::ProfileDefinition;
use crate::registry::ProfileRegistry;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_MAX_HISTORY: usize = 100;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default = "config_version")]
    pub version: u32,
    #[serde(default = "ProfileRegistry::default_catalog")]
    pub profiles: Vec<ProfileDefinition>,
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub command: CommandSettings,
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    #[serde(default)]
    pub server: ServerSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            profiles: ProfileRegistry::default_catalog(),
            connection: ConnectionSettings::default(),
            command: CommandSettings::default(),
            max_history: DEFAULT_MAX_HISTORY,
            server: ServerSettings::default(),
        }
    }
}

/// Flags and limits applied to every `aws-adfs login` attempt.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ConnectionSettings {
    #[serde(default)]
    pub adfs_host: Option<String>,
    #[serde(default = "default_auth_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_true")]
    pub no_sspi: bool,
    #[serde(default = "default_true")]
    pub env_mode: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            adfs_host: None,
            timeout_secs: default_auth_timeout(),
            retries: default_retries(),
            no_sspi: true,
            env_mode: true,
        }
    }
}

impl ConnectionSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CommandSettings {
    #[serde(default = "default_command_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_command")]
    pub default_command: String,
    #[serde(default = "default_max_output_lines")]
    pub max_output_lines: usize,
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_command_timeout(),
            default_command: default_command(),
            max_output_lines: default_max_output_lines(),
        }
    }
}

impl CommandSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).context("read config")?;
        let json: serde_json::Value = serde_json::from_str(&data).context("parse config")?;
        match json.get("version").and_then(|value| value.as_u64()) {
            Some(1) | None => {}
            Some(other) => anyhow::bail!("unsupported config version {other}"),
        }
        let config: AppConfig = serde_json::from_value(json).context("decode config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config directory")?;
        }
        let data = serde_json::to_string_pretty(self).context("serialize config")?;
        fs::write(path, data).context("write config")?;
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if !(1..=1000).contains(&self.max_history) {
            anyhow::bail!("max_history must be between 1 and 1000");
        }
        if !(1..=300).contains(&self.connection.timeout_secs) {
            anyhow::bail!("connection.timeout_secs must be between 1 and 300");
        }
        if self.command.timeout_secs == 0 {
            anyhow::bail!("command.timeout_secs must be positive");
        }
        if self.command.max_output_lines == 0 {
            anyhow::bail!("command.max_output_lines must be positive");
        }
        ProfileRegistry::new(self.profiles.clone()).context("validate profiles")?;
        Ok(())
    }

    pub fn registry(&self) -> anyhow::Result<ProfileRegistry> {
        ProfileRegistry::new(self.profiles.clone())
    }
}

fn project_dirs() -> anyhow::Result<ProjectDirs> {
    ProjectDirs::from("com", "adfs-fleet", "adfs-fleet").context("resolve project dirs")
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.json"))
}

pub fn default_lock_path() -> anyhow::Result<PathBuf> {
    let project = project_dirs()?;
    Ok(project
        .runtime_dir()
        .unwrap_or(project.cache_dir())
        .join("server.lock"))
}

fn config_version() -> u32 {
    CONFIG_VERSION
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_command_timeout() -> u64 {
    300
}

fn default_command() -> String {
    "aws s3 ls".to_string()
}

fn default_max_output_lines() -> usize {
    4_000
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
