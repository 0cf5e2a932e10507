use crate::{logging, server};
use adfs_core::auth::LoginInputs;
use adfs_core::config::{AppConfig, default_config_path, default_lock_path};
use adfs_core::connection::{ConnectOutcome, ConnectRequest};
use adfs_core::events::Event;
use adfs_core::lockfile::{ServerLock, lock_holder_pid};
use adfs_core::model::ProfileId;
use adfs_core::provider::{LoginAccount, LoginStore, MemoryLoginStore};
use adfs_core::publisher::EventSink;
use adfs_core::session::{Collaborators, Engine};
use adfs_providers::{
    AdfsCliAuthenticator, AwsCredentialsFile, KeyringLoginStore, ShellCommandRunner,
};
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod app;
mod args;
mod config_cmd;
mod fleet_cmd;
mod login_cmd;
mod serve_cmd;
mod shared;
#[cfg(test)]
mod tests;

use args::*;

use config_cmd::handle_config;
use fleet_cmd::{handle_profiles, handle_run, handle_validate};
use login_cmd::handle_login;
use serve_cmd::handle_serve;
use shared::{build_engine, config_path, interrupt_token, load_config, login_account};

pub async fn run() -> anyhow::Result<()> {
    app::run().await
}
