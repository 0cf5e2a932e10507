use crate::process::ProcessGuard;
use adfs_core::error::ExecutionFailure;
use adfs_core::provider::{BoxFuture, CommandRunner};
use adfs_core::runner::{CappedOutput, OutputSink, OutputStream, RunOutcome, RunSpec};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands through the platform shell (`sh -c` or `cmd /C`).
#[derive(Clone, Debug)]
pub struct ShellCommandRunner {
    shell: String,
    flag: String,
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        if cfg!(windows) {
            Self::new("cmd", "/C")
        } else {
            Self::new("sh", "-c")
        }
    }
}

impl ShellCommandRunner {
    pub fn new(shell: &str, flag: &str) -> Self {
        Self {
            shell: shell.to_string(),
            flag: flag.to_string(),
        }
    }

    fn command(&self, spec: &RunSpec) -> Command {
        let mut command = Command::new(&self.shell);
        command.arg(&self.flag).arg(&spec.command);
        for (key, value) in spec.env() {
            command.env(key, value);
        }
        command
    }

    async fn execute(
        &self,
        spec: &RunSpec,
        output: &dyn OutputSink,
    ) -> Result<RunOutcome, ExecutionFailure> {
        let started = Instant::now();
        let mut guard = ProcessGuard::spawn(self.command(spec), spec.profile.as_str())
            .map_err(|err| ExecutionFailure::Spawn(err.to_string()))?;
        let stdout = guard.child_mut().stdout.take();
        let stderr = guard.child_mut().stderr.take();
        let mut stdout_buf = CappedOutput::new(spec.max_output_lines);
        let mut stderr_buf = CappedOutput::new(spec.max_output_lines);

        let work = async {
            tokio::join!(
                pump(stdout, OutputStream::Stdout, output, &mut stdout_buf),
                pump(stderr, OutputStream::Stderr, output, &mut stderr_buf),
            );
            guard.wait().await
        };
        let waited = tokio::time::timeout(spec.timeout, work).await;

        let (exit_code, timed_out) = match waited {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(err)) => {
                warn!(profile = %spec.profile, error = %err, "waiting for command failed");
                (None, false)
            }
            Err(_) => {
                guard.kill().await;
                (None, true)
            }
        };
        debug!(profile = %spec.profile, ?exit_code, timed_out, "shell command exited");
        Ok(RunOutcome {
            exit_code,
            timed_out,
            stdout: stdout_buf.render(),
            stderr: stderr_buf.render(),
            duration: started.elapsed(),
        })
    }
}

async fn pump<R: AsyncRead + Unpin>(
    stream: Option<R>,
    kind: OutputStream,
    output: &dyn OutputSink,
    buffer: &mut CappedOutput,
) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                output.line(kind, &line);
                buffer.push(line);
            }
            Ok(None) => break,
            Err(err) => {
                debug!(error = %err, "output stream closed");
                break;
            }
        }
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run<'a>(
        &'a self,
        spec: &'a RunSpec,
        output: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<RunOutcome, ExecutionFailure>> {
        Box::pin(self.execute(spec, output))
    }
}
