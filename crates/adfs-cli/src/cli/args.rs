use super::*;
#[derive(Parser)]
#[command(author, version, about = "Connect AWS profiles through ADFS and run commands across them")]
pub(super) struct Cli {
    #[arg(
        long,
        global = true,
        help = "Path to config.json (defaults to the per-user config directory)"
    )]
    pub(super) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Run the HTTP/WebSocket server")]
    Serve(ServeArgs),
    #[command(about = "List configured profiles")]
    Profiles,
    #[command(about = "Check stored AWS credentials")]
    Validate(ValidateArgs),
    #[command(about = "Manage saved ADFS logins")]
    Login(LoginArgs),
    #[command(about = "Connect profiles and run one command across them")]
    Run(RunArgs),
    #[command(about = "Manage config")]
    Config(ConfigArgs),
}

#[derive(Parser)]
pub(super) struct ServeArgs {
    #[arg(long, help = "Listen address (overrides server.bind)")]
    pub(super) bind: Option<String>,
}

#[derive(Parser)]
pub(super) struct ValidateArgs {
    #[arg(long = "profile", help = "Profile to check; repeat for several (default: all)")]
    pub(super) profiles: Vec<String>,
    #[arg(long, help = "Print the result as JSON")]
    pub(super) json: bool,
}

#[derive(Parser)]
pub(super) struct LoginArgs {
    #[command(subcommand)]
    pub(super) command: LoginCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum LoginCommands {
    #[command(about = "Save an ADFS login for one profile or as the default")]
    Set(LoginSetArgs),
    #[command(about = "Remove a saved login")]
    Clear(LoginTargetArgs),
    #[command(about = "Show which login a profile would use")]
    Show(LoginTargetArgs),
}

#[derive(Parser)]
pub(super) struct LoginTargetArgs {
    #[arg(long, help = "Profile id; omit for the default login")]
    pub(super) profile: Option<String>,
}

#[derive(Parser)]
pub(super) struct LoginSetArgs {
    #[arg(long, help = "Profile id; omit for the default login")]
    pub(super) profile: Option<String>,
    #[arg(long)]
    pub(super) username: String,
    #[arg(long, help = "ADFS host (defaults to connection.adfs_host)")]
    pub(super) adfs_host: Option<String>,
    #[arg(
        long,
        default_value = "ADFS_PASSWORD",
        help = "Environment variable holding the password; stdin is read when it is unset"
    )]
    pub(super) password_env: String,
}

#[derive(Parser)]
pub(super) struct RunArgs {
    #[arg(long = "profile", required = true, help = "Target profile; repeat for several")]
    pub(super) profiles: Vec<String>,
    #[arg(long, help = "Per-profile timeout in seconds")]
    pub(super) timeout: Option<u64>,
    #[arg(long, help = "Print results as JSON instead of streaming output")]
    pub(super) json: bool,
    #[arg(last = true, help = "Command to run (defaults to command.default_command)")]
    pub(super) command: Vec<String>,
}

#[derive(Parser)]
pub(super) struct ConfigArgs {
    #[command(subcommand)]
    pub(super) command: ConfigCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum ConfigCommands {
    #[command(about = "Write a config file with default settings")]
    Init(ConfigInitArgs),
    #[command(about = "Print the effective config")]
    Show,
}

#[derive(Parser)]
pub(super) struct ConfigInitArgs {
    #[arg(long)]
    pub(super) adfs_host: Option<String>,
    #[arg(long, help = "Overwrite an existing config file")]
    pub(super) force: bool,
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Serve(_) => "serve",
        Commands::Profiles => "profiles",
        Commands::Validate(_) => "validate",
        Commands::Login(_) => "login",
        Commands::Run(_) => "run",
        Commands::Config(_) => "config",
    }
}
