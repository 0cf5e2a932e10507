use super::*;
pub(super) async fn handle_serve(
    args: ServeArgs,
    config_path: &Path,
    log_buffer: logging::LogBuffer,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let lock_path = default_lock_path()?;
    let Some(_lock) = ServerLock::try_acquire(&lock_path)? else {
        let holder = lock_holder_pid(&lock_path)
            .map(|pid| format!(" (pid {pid})"))
            .unwrap_or_default();
        anyhow::bail!("another adfs-fleet server is already running{holder}");
    };

    let engine = build_engine(&config)?;
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = server::bind(&bind).await?;
    println!("Listening on http://{}", listener.local_addr().context("read listener address")?);

    let shutdown = interrupt_token();
    let state = server::AppState {
        engine,
        logs: log_buffer,
    };
    server::serve(listener, state, async move { shutdown.cancelled().await }).await
}
