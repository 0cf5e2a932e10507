use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Owns a spawned child and guarantees it is killed on every exit path.
///
/// On unix the child leads its own process group and kills go to the whole
/// group, so anything a shell forked dies with it. `kill_on_drop` covers the
/// direct child everywhere else. Explicit timeouts kill and then reap so the
/// child never lingers as a zombie.
pub struct ProcessGuard {
    child: Child,
    label: String,
    reaped: bool,
}

impl ProcessGuard {
    pub fn spawn(mut command: Command, label: impl Into<String>) -> io::Result<Self> {
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        isolate(&mut command);
        let child = command.spawn()?;
        let label = label.into();
        debug!(process = %label, pid = ?child.id(), "spawned");
        Ok(Self {
            child,
            label,
            reaped: false,
        })
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }

    /// Waits up to `limit`; on expiry the child is killed and reaped and
    /// `None` is returned.
    pub async fn wait_with_timeout(&mut self, limit: Duration) -> io::Result<Option<ExitStatus>> {
        match tokio::time::timeout(limit, self.child.wait()).await {
            Ok(status) => {
                let status = status?;
                self.reaped = true;
                Ok(Some(status))
            }
            Err(_) => {
                self.kill().await;
                Ok(None)
            }
        }
    }

    pub async fn kill(&mut self) {
        if self.reaped {
            return;
        }
        kill_group(&self.child, &self.label);
        if let Err(err) = self.child.kill().await {
            warn!(process = %self.label, error = %err, "failed to kill child");
        } else {
            debug!(process = %self.label, "killed");
        }
        self.reaped = true;
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if !self.reaped {
            kill_group(&self.child, &self.label);
            let _ = self.child.start_kill();
        }
    }
}

#[cfg(unix)]
fn isolate(command: &mut Command) {
    command.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_command: &mut Command) {}

#[cfg(unix)]
fn kill_group(child: &Child, label: &str) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(process = %label, error = %err, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child, _label: &str) {}
