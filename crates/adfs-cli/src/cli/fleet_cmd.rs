use super::*;
use adfs_core::protocol::ServerMessage;
use adfs_core::registry::ProfileRegistry;
use adfs_core::runner::ExecutionResult;
use futures::future::join_all;

pub(super) fn handle_profiles(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let registry = config.registry()?;
    for (group, profiles) in registry.by_group() {
        println!("{}:", group.label());
        for profile in profiles {
            let description = profile.description.as_deref().unwrap_or("");
            println!("  {:<14} {:<12} {description}", profile.name, profile.region);
        }
    }
    Ok(())
}

pub(super) async fn handle_validate(args: ValidateArgs, config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let report = engine.validate_credentials(args.profiles).await;
    if args.json {
        println!("{}", ServerMessage::from(Event::ValidationResult(report)).to_json());
        return Ok(());
    }
    for (profile, status) in &report.results {
        println!("{profile:<14} {:<14} {}", status.tag.label, status.message);
    }
    let summary: Vec<String> = report
        .summary
        .iter()
        .map(|(kind, count)| format!("{kind}={count}"))
        .collect();
    println!("{}", summary.join(" "));
    Ok(())
}

pub(super) async fn handle_run(args: RunArgs, config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let engine = build_engine(&config)?;
    let targets = run_targets(&engine.registry, &args.profiles)?;
    let command = if args.command.is_empty() {
        engine.default_command.clone()
    } else {
        args.command.join(" ")
    };
    if command.trim().is_empty() {
        anyhow::bail!("Command must not be empty");
    }

    let connected = connect_all(&engine, &targets).await;
    if connected.is_empty() {
        anyhow::bail!("no selected profile could be connected");
    }

    let request = engine.dispatcher.request(&command, connected, args.timeout);
    info!(request_id = %request.request_id, targets = request.targets.len(), "running command");
    let sink: Arc<dyn EventSink> = Arc::new(ConsoleSink { quiet: args.json });
    let report = engine
        .dispatcher
        .dispatch(request, sink, interrupt_token())
        .await;

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&report.results).context("serialize results")?;
        println!("{rendered}");
    }
    let history = &report.history;
    eprintln!(
        "{} succeeded, {} failed, {} skipped of {}",
        history.success_count, history.failure_count, history.skipped_count, history.total
    );
    if report.cancelled {
        anyhow::bail!("command cancelled");
    }
    if !report.all_succeeded() {
        anyhow::bail!("command failed on {} profile(s)", history.total - history.success_count);
    }
    Ok(())
}

/// Validated, de-duplicated targets in the order given.
pub(super) fn run_targets(
    registry: &ProfileRegistry,
    requested: &[String],
) -> anyhow::Result<Vec<ProfileId>> {
    let mut targets: Vec<ProfileId> = Vec::new();
    for profile in requested {
        let profile = profile.trim();
        if !registry.contains(profile) {
            anyhow::bail!("Profile '{profile}' not found in configuration");
        }
        if !targets.iter().any(|existing| existing == profile) {
            targets.push(profile.to_string());
        }
    }
    if targets.is_empty() {
        anyhow::bail!("Select at least one profile");
    }
    Ok(targets)
}

/// Connects every target with its saved login and returns the ones that are
/// connected afterwards.
async fn connect_all(engine: &Engine, targets: &[ProfileId]) -> Vec<ProfileId> {
    let attempts = targets
        .iter()
        .map(|profile| engine.connections.connect(profile, ConnectRequest::default()));
    let outcomes = join_all(attempts).await;
    let mut connected = Vec::new();
    for (profile, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(ConnectOutcome::Connected) | Ok(ConnectOutcome::AlreadyConnected) => {
                eprintln!("connected {profile}");
                connected.push(profile.clone());
            }
            Ok(ConnectOutcome::Failed(failure)) => eprintln!("{profile}: {failure}"),
            Err(err) => eprintln!("{profile}: {err}"),
        }
    }
    connected
}

struct ConsoleSink {
    quiet: bool,
}

impl EventSink for ConsoleSink {
    fn publish(&self, event: Event) {
        if self.quiet {
            return;
        }
        if let Some((is_error, line)) = console_line(&event) {
            if is_error {
                eprintln!("{line}");
            } else {
                println!("{line}");
            }
        }
    }
}

/// Terminal rendering of one dispatch event; `true` marks stderr.
pub(super) fn console_line(event: &Event) -> Option<(bool, String)> {
    match event {
        Event::CommandOutput {
            profile,
            output,
            is_error,
        } => Some((*is_error, format!("[{profile}] {output}"))),
        Event::CommandComplete(result) => Some((!result.success, completion_line(result))),
        _ => None,
    }
}

fn completion_line(result: &ExecutionResult) -> String {
    let seconds = result.duration.as_secs_f64();
    match (&result.error, result.skipped) {
        (_, true) => format!("[{}] skipped due to dev profile failure", result.profile),
        (None, false) => format!("[{}] ok ({seconds:.1}s)", result.profile),
        (Some(error), false) => format!("[{}] failed ({seconds:.1}s): {error}", result.profile),
    }
}
