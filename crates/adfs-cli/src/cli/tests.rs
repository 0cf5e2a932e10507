use super::fleet_cmd::{console_line, run_targets};
use super::login_cmd::describe_login;
use super::shared::usable_login_store;
use super::*;
use adfs_core::error::StoreError;
use adfs_core::model::EnvironmentGroup;
use adfs_core::registry::ProfileRegistry;
use adfs_core::runner::ExecutionResult;
use std::time::Duration;

fn registry() -> ProfileRegistry {
    ProfileRegistry::new(ProfileRegistry::default_catalog()).unwrap()
}

#[test]
fn serve_bind_parses() {
    let cli = Cli::try_parse_from(["adfs-fleet", "serve", "--bind", "0.0.0.0:9000"]).unwrap();
    match cli.command {
        Commands::Serve(args) => assert_eq!(args.bind.as_deref(), Some("0.0.0.0:9000")),
        _ => panic!("expected serve command"),
    }
}

#[test]
fn global_config_flag_parses_after_subcommand() {
    let cli = Cli::try_parse_from(["adfs-fleet", "profiles", "--config", "/tmp/c.json"]).unwrap();
    assert_eq!(cli.config.as_deref(), Some(Path::new("/tmp/c.json")));
    assert!(matches!(cli.command, Commands::Profiles));
}

#[test]
fn run_collects_profiles_and_trailing_command() {
    let cli = Cli::try_parse_from([
        "adfs-fleet",
        "run",
        "--profile",
        "aws-dev-eu",
        "--profile",
        "kds-ets-np",
        "--timeout",
        "60",
        "--",
        "aws",
        "s3",
        "ls",
    ])
    .unwrap();
    match cli.command {
        Commands::Run(args) => {
            assert_eq!(args.profiles, vec!["aws-dev-eu", "kds-ets-np"]);
            assert_eq!(args.timeout, Some(60));
            assert_eq!(args.command, vec!["aws", "s3", "ls"]);
            assert!(!args.json);
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn run_requires_a_profile() {
    assert!(Cli::try_parse_from(["adfs-fleet", "run", "--", "true"]).is_err());
}

#[test]
fn login_set_defaults_password_env() {
    let cli = Cli::try_parse_from([
        "adfs-fleet",
        "login",
        "set",
        "--username",
        "CORP\\me",
        "--profile",
        "kds-ets-np",
    ])
    .unwrap();
    match cli.command {
        Commands::Login(LoginArgs {
            command: LoginCommands::Set(args),
        }) => {
            assert_eq!(args.password_env, "ADFS_PASSWORD");
            assert_eq!(args.profile.as_deref(), Some("kds-ets-np"));
            assert!(args.adfs_host.is_none());
        }
        _ => panic!("expected login set"),
    }
}

#[test]
fn validate_accepts_repeated_profiles() {
    let cli = Cli::try_parse_from([
        "adfs-fleet",
        "validate",
        "--profile",
        "kds-ets-pd",
        "--profile",
        "kds-gps-pd",
        "--json",
    ])
    .unwrap();
    match cli.command {
        Commands::Validate(args) => {
            assert_eq!(args.profiles.len(), 2);
            assert!(args.json);
        }
        _ => panic!("expected validate command"),
    }
}

#[test]
fn run_targets_dedupes_in_order() {
    let targets = run_targets(
        &registry(),
        &["kds-ets-np".into(), "aws-dev-eu".into(), "kds-ets-np".into()],
    )
    .unwrap();
    assert_eq!(targets, vec!["kds-ets-np", "aws-dev-eu"]);
}

#[test]
fn run_targets_rejects_unknown_profiles() {
    let err = run_targets(&registry(), &["nope".into()]).unwrap_err();
    assert!(err.to_string().contains("'nope' not found"));
    let err = run_targets(&registry(), &[]).unwrap_err();
    assert!(err.to_string().contains("Select at least one profile"));
}

#[test]
fn console_lines_tag_profile_and_stream() {
    let line = console_line(&Event::CommandOutput {
        profile: "aws-dev-eu".into(),
        output: "bucket-a".into(),
        is_error: false,
    });
    assert_eq!(line, Some((false, "[aws-dev-eu] bucket-a".to_string())));

    let skipped = ExecutionResult::failed(
        "kds-ets-np",
        EnvironmentGroup::NonProd,
        adfs_core::error::ExecutionFailure::SkippedDevFailure,
        "2030-01-01T00:00:00Z".into(),
    );
    let (is_error, text) = console_line(&Event::CommandComplete(skipped)).unwrap();
    assert!(is_error);
    assert!(text.contains("skipped"));

    assert!(console_line(&Event::error("boom")).is_none());
}

#[test]
fn completion_line_reports_duration() {
    let mut result = ExecutionResult::failed(
        "aws-dev-sg",
        EnvironmentGroup::Dev,
        adfs_core::error::ExecutionFailure::NonZeroExit(2),
        "2030-01-01T00:00:00Z".into(),
    );
    result.duration = Duration::from_millis(1500);
    let (_, text) = console_line(&Event::CommandComplete(result.clone())).unwrap();
    assert_eq!(text, "[aws-dev-sg] failed (1.5s): Command exited with status 2");

    result.success = true;
    result.error = None;
    let (is_error, text) = console_line(&Event::CommandComplete(result)).unwrap();
    assert!(!is_error);
    assert_eq!(text, "[aws-dev-sg] ok (1.5s)");
}

#[test]
fn login_description_hides_password() {
    let inputs = LoginInputs {
        username: "CORP\\me".into(),
        password: "hunter2".into(),
        adfs_host: "adfs.example.com".into(),
    };
    let text = describe_login(&inputs, "default");
    assert!(text.contains("CORP\\me @ adfs.example.com"));
    assert!(!text.contains("hunter2"));
}

#[test]
fn login_account_defaults_without_profile() {
    assert_eq!(login_account(None), LoginAccount::Default);
    assert_eq!(
        login_account(Some("kds-iss-np".into())),
        LoginAccount::Profile("kds-iss-np".into())
    );
}

#[test]
fn explicit_config_path_wins() {
    let path = config_path(Some(Path::new("/etc/adfs/config.json"))).unwrap();
    assert_eq!(path, PathBuf::from("/etc/adfs/config.json"));
}

struct BrokenStore;

impl LoginStore for BrokenStore {
    fn get(&self, _account: &LoginAccount) -> Result<Option<LoginInputs>, StoreError> {
        Err(StoreError::Unavailable {
            message: "no secret service".into(),
            source: None,
        })
    }

    fn set(&self, _account: &LoginAccount, _inputs: &LoginInputs) -> Result<(), StoreError> {
        Err(StoreError::Write {
            message: "no secret service".into(),
            source: None,
        })
    }

    fn clear(&self, _account: &LoginAccount) -> Result<(), StoreError> {
        Ok(())
    }
}

#[test]
fn unavailable_keyring_falls_back_to_memory() {
    let store = usable_login_store(Arc::new(BrokenStore));
    let inputs = LoginInputs {
        username: "CORP\\me".into(),
        password: "pw".into(),
        adfs_host: "adfs.example.com".into(),
    };
    store.set(&LoginAccount::Default, &inputs).unwrap();
    assert_eq!(store.resolve("kds-ets-np").unwrap(), Some(inputs));
}

#[test]
fn working_store_is_kept() {
    let memory: Arc<dyn LoginStore> = Arc::new(MemoryLoginStore::default());
    let chosen = usable_login_store(memory.clone());
    assert!(Arc::ptr_eq(&memory, &chosen));
}
