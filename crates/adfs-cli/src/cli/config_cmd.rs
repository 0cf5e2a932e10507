use super::*;
pub(super) fn handle_config(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Init(args) => handle_init(args, config_path),
        ConfigCommands::Show => handle_show(config_path),
    }
}

fn handle_init(args: ConfigInitArgs, config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() && !args.force {
        anyhow::bail!(
            "config already exists at {} (use --force to overwrite)",
            config_path.display()
        );
    }
    let mut config = AppConfig::default();
    config.connection.adfs_host = args
        .adfs_host
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty());
    config.validate()?;
    config.save(config_path)?;
    info!(path = %config_path.display(), "config written");
    println!("Config saved to {}", config_path.display());
    Ok(())
}

fn handle_show(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let rendered = serde_json::to_string_pretty(&config).context("serialize config")?;
    if !config_path.exists() {
        println!("# {} not found; showing defaults", config_path.display());
    }
    println!("{rendered}");
    Ok(())
}
