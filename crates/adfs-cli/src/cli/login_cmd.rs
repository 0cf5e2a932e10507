use super::*;
use std::io::{self, BufRead, IsTerminal, Write};

pub(super) fn handle_login(args: LoginArgs, config_path: &Path) -> anyhow::Result<()> {
    let store = KeyringLoginStore::default();
    match args.command {
        LoginCommands::Set(args) => {
            let config = load_config(config_path)?;
            handle_set(args, &config, &store)
        }
        LoginCommands::Clear(args) => handle_clear(args, &store),
        LoginCommands::Show(args) => handle_show(args, &store),
    }
}

fn handle_set(args: LoginSetArgs, config: &AppConfig, store: &dyn LoginStore) -> anyhow::Result<()> {
    if let Some(profile) = args.profile.as_deref() {
        let registry = config.registry()?;
        if !registry.contains(profile) {
            anyhow::bail!("Profile '{profile}' not found in configuration");
        }
    }
    let adfs_host = args
        .adfs_host
        .or_else(|| config.connection.adfs_host.clone())
        .context("--adfs-host is required when connection.adfs_host is not configured")?;
    let password = read_password(&args.password_env)?;
    let inputs = LoginInputs {
        username: args.username.trim().to_string(),
        password,
        adfs_host: adfs_host.trim().to_string(),
    };
    if !inputs.is_usable() {
        anyhow::bail!("username, password and ADFS host must all be non-empty");
    }
    let account = login_account(args.profile);
    store.set(&account, &inputs)?;
    println!("Saved login for {account}");
    Ok(())
}

fn handle_clear(args: LoginTargetArgs, store: &dyn LoginStore) -> anyhow::Result<()> {
    let account = login_account(args.profile);
    store.clear(&account)?;
    println!("Cleared login for {account}");
    Ok(())
}

fn handle_show(args: LoginTargetArgs, store: &dyn LoginStore) -> anyhow::Result<()> {
    let (inputs, source) = match args.profile.as_deref() {
        Some(profile) => {
            let own = store.get(&LoginAccount::Profile(profile.to_string()))?;
            match own {
                Some(inputs) => (Some(inputs), "profile"),
                None => (store.get(&LoginAccount::Default)?, "default"),
            }
        }
        None => (store.get(&LoginAccount::Default)?, "default"),
    };
    match inputs {
        Some(inputs) => println!("{}", describe_login(&inputs, source)),
        None => println!("No saved login"),
    }
    Ok(())
}

pub(super) fn describe_login(inputs: &LoginInputs, source: &str) -> String {
    format!(
        "{} @ {} (password saved, from {source} entry)",
        inputs.username, inputs.adfs_host
    )
}

fn read_password(env_var: &str) -> anyhow::Result<String> {
    if let Ok(password) = std::env::var(env_var)
        && !password.is_empty()
    {
        return Ok(password);
    }
    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Password (input is visible; prefer ${env_var}): ");
        io::stderr().flush().ok();
    }
    let mut line = String::new();
    stdin.lock().read_line(&mut line).context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
