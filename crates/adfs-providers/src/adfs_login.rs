use crate::process::ProcessGuard;
use adfs_core::auth::{
    AuthFailureReason, AuthRequest, AuthSuccess, AuthenticationFailure, classify_auth_output,
    output_tail,
};
use adfs_core::provider::{Authenticator, BoxFuture};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

const DETAIL_TAIL_LINES: usize = 20;

/// Command line for one `aws-adfs login`. Credentials are never part of it;
/// they travel in the child environment.
pub fn build_login_args(request: &AuthRequest) -> Vec<String> {
    let mut args = vec![
        "login".to_string(),
        format!("--profile={}", request.profile),
        format!("--adfs-host={}", request.inputs.adfs_host.trim()),
    ];
    if request.env_mode {
        args.push("--env".to_string());
    }
    if request.no_sspi {
        args.push("--no-sspi".to_string());
    }
    if let Some(region) = request.region.as_deref().filter(|region| !region.is_empty()) {
        args.push(format!("--region={region}"));
    }
    args
}

/// Authenticates by shelling out to the `aws-adfs` tool.
#[derive(Clone, Debug)]
pub struct AdfsCliAuthenticator {
    program: PathBuf,
}

impl Default for AdfsCliAuthenticator {
    fn default() -> Self {
        Self::new("aws-adfs")
    }
}

impl AdfsCliAuthenticator {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn login(&self, request: &AuthRequest) -> Result<AuthSuccess, AuthenticationFailure> {
        let mut command = Command::new(&self.program);
        command
            .args(build_login_args(request))
            .env("username", &request.inputs.username)
            .env("password", &request.inputs.password);

        let mut guard = ProcessGuard::spawn(command, format!("aws-adfs {}", request.profile))
            .map_err(|err| spawn_failure(&self.program, err))?;
        let stdout = guard.child_mut().stdout.take();
        let stderr = guard.child_mut().stderr.take();

        let work = async {
            let (out, err) = tokio::join!(read_all(stdout), read_all(stderr));
            let status = guard.wait().await;
            (status, out, err)
        };
        let (status, out, err) = match tokio::time::timeout(request.timeout, work).await {
            Ok(collected) => collected,
            Err(_) => {
                guard.kill().await;
                warn!(profile = %request.profile, timeout = ?request.timeout, "aws-adfs timed out");
                return Err(AuthenticationFailure::timeout(request.timeout));
            }
        };

        let combined = match (out.trim(), err.trim()) {
            (out, "") => out.to_string(),
            ("", err) => err.to_string(),
            (out, err) => format!("{out}\n{err}"),
        };
        match status {
            Ok(status) if status.success() => {
                info!(profile = %request.profile, "aws-adfs login succeeded");
                Ok(AuthSuccess { output: combined })
            }
            Ok(status) => {
                let reason = classify_auth_output(&combined);
                debug!(profile = %request.profile, code = ?status.code(), %reason, "aws-adfs login failed");
                Err(AuthenticationFailure::new(
                    reason,
                    output_tail(&combined, DETAIL_TAIL_LINES),
                ))
            }
            Err(err) => Err(AuthenticationFailure::new(
                AuthFailureReason::Unknown,
                format!("Command execution error: {err}"),
            )),
        }
    }
}

fn spawn_failure(program: &Path, err: std::io::Error) -> AuthenticationFailure {
    if err.kind() == ErrorKind::NotFound {
        AuthenticationFailure::new(
            AuthFailureReason::ToolNotFound,
            format!("{} not found", program.display()),
        )
    } else {
        AuthenticationFailure::new(
            AuthFailureReason::Unknown,
            format!("Command execution error: {err}"),
        )
    }
}

async fn read_all<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let Some(mut stream) = stream else {
        return String::new();
    };
    let mut bytes = Vec::new();
    if let Err(err) = stream.read_to_end(&mut bytes).await {
        debug!(error = %err, "aws-adfs output stream closed early");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

impl Authenticator for AdfsCliAuthenticator {
    fn authenticate<'a>(
        &'a self,
        request: &'a AuthRequest,
    ) -> BoxFuture<'a, Result<AuthSuccess, AuthenticationFailure>> {
        Box::pin(self.login(request))
    }
}
