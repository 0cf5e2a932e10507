//! Fan-out of one shell command across connected profiles.
//!
//! Dev profiles run first as their own concurrent batch. When every dev
//! execution fails, the remaining targets are reported as skipped without
//! ever being started.

use crate::config::CommandSettings;
use crate::error::ExecutionFailure;
use crate::events::Event;
use crate::history::{HistoryEntry, HistoryRing, now_rfc3339};
use crate::model::{EnvironmentGroup, ProfileDefinition, ProfileId};
use crate::provider::CommandRunner;
use crate::publisher::{EventSink, GatedSink};
use crate::registry::ProfileRegistry;
use crate::runner::{ExecutionResult, OutputSink, OutputStream, RunSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct DispatchRequest {
    pub request_id: Uuid,
    pub command: String,
    pub targets: Vec<ProfileId>,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct DispatchReport {
    pub request_id: Uuid,
    pub results: Vec<ExecutionResult>,
    pub cancelled: bool,
    pub history: HistoryEntry,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        !self.cancelled && self.results.iter().all(|result| result.success)
    }
}

pub struct CommandDispatcher {
    registry: Arc<ProfileRegistry>,
    runner: Arc<dyn CommandRunner>,
    history: Arc<HistoryRing>,
    settings: CommandSettings,
}

struct BatchOutcome {
    results: Vec<ExecutionResult>,
    cancelled: bool,
}

impl CommandDispatcher {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        runner: Arc<dyn CommandRunner>,
        history: Arc<HistoryRing>,
        settings: CommandSettings,
    ) -> Self {
        Self {
            registry,
            runner,
            history,
            settings,
        }
    }

    /// Builds a request with the configured timeout unless one is given.
    pub fn request(
        &self,
        command: &str,
        targets: Vec<ProfileId>,
        timeout_secs: Option<u64>,
    ) -> DispatchRequest {
        let timeout = timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or_else(|| self.settings.timeout());
        DispatchRequest {
            request_id: Uuid::new_v4(),
            command: command.trim().to_string(),
            targets,
            timeout,
        }
    }

    pub async fn dispatch(
        &self,
        request: DispatchRequest,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> DispatchReport {
        let sink: Arc<dyn EventSink> = Arc::new(GatedSink::new(sink, cancel.clone()));
        let (dev, others) = self.partition(&request.targets);
        info!(
            request_id = %request.request_id,
            dev = dev.len(),
            others = others.len(),
            "dispatching command"
        );

        let mut results = Vec::new();
        let mut cancelled = false;

        if !dev.is_empty() {
            let batch = self.run_batch(&request, &dev, &sink, &cancel).await;
            cancelled = batch.cancelled;
            results.extend(batch.results);
        }

        let dev_all_failed = !dev.is_empty() && results.iter().all(|result| !result.success);
        if !cancelled && !others.is_empty() {
            if dev_all_failed {
                warn!(
                    request_id = %request.request_id,
                    skipped = others.len(),
                    "all dev profiles failed; skipping remaining profiles"
                );
                let timestamp = now_rfc3339();
                for profile in &others {
                    let result = ExecutionResult::failed(
                        &profile.name,
                        profile.group,
                        ExecutionFailure::SkippedDevFailure,
                        timestamp.clone(),
                    );
                    sink.publish(Event::CommandComplete(result.clone()));
                    results.push(result);
                }
            } else {
                let batch = self.run_batch(&request, &others, &sink, &cancel).await;
                cancelled = batch.cancelled;
                results.extend(batch.results);
            }
        }

        let history = HistoryEntry::summarize(&request.command, &request.targets, &results);
        self.history.record(history.clone(), results.clone());
        info!(
            request_id = %request.request_id,
            succeeded = history.success_count,
            failed = history.failure_count,
            skipped = history.skipped_count,
            cancelled,
            "dispatch finished"
        );
        DispatchReport {
            request_id: request.request_id,
            results,
            cancelled,
            history,
        }
    }

    fn partition(&self, targets: &[ProfileId]) -> (Vec<ProfileDefinition>, Vec<ProfileDefinition>) {
        let mut dev = Vec::new();
        let mut others = Vec::new();
        for target in targets {
            let Some(profile) = self.registry.get(target) else {
                warn!(profile = %target, "dropping unknown dispatch target");
                continue;
            };
            if profile.group.is_dev() {
                dev.push(profile.clone());
            } else {
                others.push(profile.clone());
            }
        }
        (dev, others)
    }

    async fn run_batch(
        &self,
        request: &DispatchRequest,
        profiles: &[ProfileDefinition],
        sink: &Arc<dyn EventSink>,
        cancel: &CancellationToken,
    ) -> BatchOutcome {
        let mut tasks = JoinSet::new();
        for profile in profiles {
            let spec = RunSpec {
                profile: profile.name.clone(),
                region: Some(profile.region.clone()),
                command: request.command.clone(),
                timeout: request.timeout,
                max_output_lines: self.settings.max_output_lines,
            };
            tasks.spawn(execute_one(
                self.runner.clone(),
                spec,
                profile.group,
                request.request_id,
                sink.clone(),
            ));
        }

        let mut results: Vec<ExecutionResult> = Vec::with_capacity(profiles.len());
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    // Tasks that finished before the abort still count.
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok(result) = joined {
                            results.push(result);
                        }
                    }
                    warn!(request_id = %request.request_id, "dispatch cancelled");
                    return BatchOutcome { results, cancelled: true };
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok(result)) => results.push(result),
                    Some(Err(err)) => warn!(error = %err, "execution task failed"),
                    None => break,
                },
            }
        }
        // A task that died without returning still owes its profile a result.
        for profile in profiles {
            if results.iter().any(|result| result.profile == profile.name) {
                continue;
            }
            let result = ExecutionResult::failed(
                &profile.name,
                profile.group,
                ExecutionFailure::Terminated,
                now_rfc3339(),
            );
            sink.publish(Event::CommandComplete(result.clone()));
            results.push(result);
        }
        BatchOutcome {
            results,
            cancelled: false,
        }
    }
}

/// Relays child output lines as `command_output` events.
struct ProfileOutput {
    profile: ProfileId,
    sink: Arc<dyn EventSink>,
}

impl OutputSink for ProfileOutput {
    fn line(&self, stream: OutputStream, line: &str) {
        self.sink.publish(Event::CommandOutput {
            profile: self.profile.clone(),
            output: line.to_string(),
            is_error: stream.is_error(),
        });
    }
}

async fn execute_one(
    runner: Arc<dyn CommandRunner>,
    spec: RunSpec,
    group: EnvironmentGroup,
    request_id: Uuid,
    sink: Arc<dyn EventSink>,
) -> ExecutionResult {
    sink.publish(Event::CommandStarted {
        profile: spec.profile.clone(),
        request_id,
    });
    let started_at = now_rfc3339();
    let output = ProfileOutput {
        profile: spec.profile.clone(),
        sink: sink.clone(),
    };
    let result = match runner.run(&spec, &output).await {
        Ok(outcome) => ExecutionResult::from_outcome(
            &spec.profile,
            group,
            outcome,
            spec.timeout,
            started_at,
            now_rfc3339(),
        ),
        Err(failure) => ExecutionResult::failed(&spec.profile, group, failure, started_at),
    };
    info!(
        profile = %spec.profile,
        success = result.success,
        timed_out = result.timed_out,
        duration_ms = result.duration.as_millis() as u64,
        "command finished"
    );
    sink.publish(Event::CommandComplete(result.clone()));
    result
}

#[cfg(test)]
mod tests;
