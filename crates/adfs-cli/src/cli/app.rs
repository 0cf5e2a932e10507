use super::*;
pub async fn run() -> anyhow::Result<()> {
    let log_buffer = logging::LogBuffer::new(logging::DEFAULT_CAPACITY);
    logging::init(&log_buffer);

    let cli = Cli::parse();
    info!(command = command_label(&cli.command), "Running command");
    let config_path = config_path(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Serve(args) => handle_serve(args, &config_path, log_buffer).await,
        Commands::Profiles => handle_profiles(&config_path),
        Commands::Validate(args) => handle_validate(args, &config_path).await,
        Commands::Login(args) => handle_login(args, &config_path),
        Commands::Run(args) => handle_run(args, &config_path).await,
        Commands::Config(args) => handle_config(args, &config_path),
    };

    if let Err(err) = &result {
        warn!(error = %err, "Command failed");
    }
    result
}
