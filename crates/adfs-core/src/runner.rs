use crate::error::ExecutionFailure;
use crate::model::{EnvironmentGroup, ProfileId};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// One shell command bound to one profile.
#[derive(Clone, Debug)]
pub struct RunSpec {
    pub profile: ProfileId,
    pub region: Option<String>,
    pub command: String,
    pub timeout: Duration,
    pub max_output_lines: usize,
}

impl RunSpec {
    /// Environment overrides applied to the child process.
    pub fn env(&self) -> Vec<(&'static str, String)> {
        let mut vars = vec![("AWS_PROFILE", self.profile.clone())];
        if let Some(region) = self.region.as_deref().filter(|region| !region.is_empty()) {
            vars.push(("AWS_REGION", region.to_string()));
            vars.push(("AWS_DEFAULT_REGION", region.to_string()));
        }
        vars
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn is_error(&self) -> bool {
        matches!(self, OutputStream::Stderr)
    }
}

/// Receives output lines as a child produces them.
pub trait OutputSink: Send + Sync {
    fn line(&self, stream: OutputStream, line: &str);
}

pub struct DiscardOutput;

impl OutputSink for DiscardOutput {
    fn line(&self, _stream: OutputStream, _line: &str) {}
}

/// Line buffer that keeps only the most recent `capacity` lines.
#[derive(Debug)]
pub struct CappedOutput {
    lines: VecDeque<String>,
    capacity: usize,
    dropped: usize,
}

impl CappedOutput {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
            self.dropped += 1;
        }
        self.lines.push_back(line.into());
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.dropped > 0 {
            out.push_str(&format!("... {} earlier lines omitted\n", self.dropped));
        }
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// What the child process did, before interpretation.
#[derive(Clone, Debug, Default)]
pub struct RunOutcome {
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl RunOutcome {
    pub fn failure(&self, timeout: Duration) -> Option<ExecutionFailure> {
        if self.timed_out {
            return Some(ExecutionFailure::TimedOut(timeout.as_secs()));
        }
        match self.exit_code {
            Some(0) => None,
            Some(code) => Some(ExecutionFailure::NonZeroExit(code)),
            None => Some(ExecutionFailure::Terminated),
        }
    }
}

/// Terminal result for one profile within one dispatch.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionResult {
    pub profile: ProfileId,
    pub group: EnvironmentGroup,
    pub success: bool,
    pub skipped: bool,
    pub timed_out: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
    #[serde(serialize_with = "as_seconds")]
    pub duration: Duration,
    pub started_at: String,
    pub completed_at: String,
}

impl ExecutionResult {
    pub fn from_outcome(
        profile: &str,
        group: EnvironmentGroup,
        outcome: RunOutcome,
        timeout: Duration,
        started_at: String,
        completed_at: String,
    ) -> Self {
        let failure = outcome.failure(timeout);
        let error = failure.as_ref().map(|failure| {
            let stderr = outcome.stderr.trim();
            if stderr.is_empty() || outcome.timed_out {
                failure.to_string()
            } else {
                format!("{failure}: {stderr}")
            }
        });
        Self {
            profile: profile.to_string(),
            group,
            success: failure.is_none(),
            skipped: false,
            timed_out: outcome.timed_out,
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            error,
            duration: outcome.duration,
            started_at,
            completed_at,
        }
    }

    /// A result for a profile that never produced an outcome.
    pub fn failed(
        profile: &str,
        group: EnvironmentGroup,
        failure: ExecutionFailure,
        timestamp: String,
    ) -> Self {
        Self {
            profile: profile.to_string(),
            group,
            success: false,
            skipped: matches!(failure, ExecutionFailure::SkippedDevFailure),
            timed_out: false,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            error: Some(failure.to_string()),
            duration: Duration::ZERO,
            started_at: timestamp.clone(),
            completed_at: timestamp,
        }
    }

    /// Text shown to the client alongside the completion event.
    pub fn display_output(&self) -> Option<String> {
        let combined = match (self.stdout.trim(), self.stderr.trim()) {
            ("", "") => return None,
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        };
        Some(combined)
    }
}

fn as_seconds<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_includes_region_when_known() {
        let spec = RunSpec {
            profile: "kds-ets-np".into(),
            region: Some("eu-west-1".into()),
            command: "aws s3 ls".into(),
            timeout: Duration::from_secs(5),
            max_output_lines: 10,
        };
        let env = spec.env();
        assert!(env.contains(&("AWS_PROFILE", "kds-ets-np".to_string())));
        assert!(env.contains(&("AWS_DEFAULT_REGION", "eu-west-1".to_string())));

        let bare = RunSpec { region: None, ..spec };
        assert_eq!(bare.env().len(), 1);
    }

    #[test]
    fn capped_output_drops_oldest() {
        let mut buffer = CappedOutput::new(2);
        buffer.push("one");
        buffer.push("two");
        buffer.push("three");
        assert_eq!(buffer.dropped(), 1);
        assert_eq!(buffer.render(), "... 1 earlier lines omitted\ntwo\nthree\n");
    }

    #[test]
    fn outcome_failure_distinguishes_timeout() {
        let timed_out = RunOutcome {
            timed_out: true,
            ..RunOutcome::default()
        };
        assert_eq!(
            timed_out.failure(Duration::from_secs(9)),
            Some(ExecutionFailure::TimedOut(9))
        );
        let ok = RunOutcome {
            exit_code: Some(0),
            ..RunOutcome::default()
        };
        assert_eq!(ok.failure(Duration::from_secs(1)), None);
        let bad = RunOutcome {
            exit_code: Some(2),
            stderr: "denied\n".into(),
            ..RunOutcome::default()
        };
        let result = ExecutionResult::from_outcome(
            "p",
            EnvironmentGroup::Prod,
            bad,
            Duration::from_secs(1),
            String::new(),
            String::new(),
        );
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Command exited with status 2: denied"));
    }

    #[test]
    fn skipped_result_is_flagged() {
        let result = ExecutionResult::failed(
            "prod-1",
            EnvironmentGroup::Prod,
            ExecutionFailure::SkippedDevFailure,
            "now".into(),
        );
        assert!(result.skipped);
        assert!(!result.success);
        assert_eq!(result.display_output(), None);
    }
}
