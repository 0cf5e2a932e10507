use super::*;

pub(super) fn config_path(explicit: Option<&Path>) -> anyhow::Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

pub(super) fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("load config {}", path.display()))
}

/// Engine wired to the real `aws-adfs`, shell, credentials file and keyring.
pub(super) fn build_engine(config: &AppConfig) -> anyhow::Result<Arc<Engine>> {
    let credentials = AwsCredentialsFile::from_env()?;
    info!(path = %credentials.path().display(), "reading AWS credentials");
    Engine::new(
        config,
        Collaborators {
            authenticator: Arc::new(AdfsCliAuthenticator::default()),
            runner: Arc::new(ShellCommandRunner::default()),
            credentials: Arc::new(credentials),
            logins: usable_login_store(Arc::new(KeyringLoginStore::default())),
        },
    )
}

/// `primary` when it answers a lookup, else an in-memory store so a server
/// without a keyring still accepts logins sent by clients.
pub(super) fn usable_login_store(primary: Arc<dyn LoginStore>) -> Arc<dyn LoginStore> {
    match primary.get(&LoginAccount::Default) {
        Ok(_) => primary,
        Err(err) => {
            warn!(error = %err, "login storage unavailable; saved logins will not persist");
            Arc::new(MemoryLoginStore::default())
        }
    }
}

pub(super) fn login_account(profile: Option<String>) -> LoginAccount {
    match profile {
        Some(profile) => LoginAccount::Profile(profile),
        None => LoginAccount::Default,
    }
}

/// Cancelled on the first Ctrl-C.
pub(super) fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; cancelling");
            trigger.cancel();
        }
    });
    token
}
