//! In-memory collaborators shared by the engine's unit tests.

use crate::auth::{AuthFailureReason, AuthRequest, AuthSuccess, AuthenticationFailure, LoginInputs};
use crate::credentials::RawCredentials;
use crate::error::{ExecutionFailure, StoreError};
use crate::events::Event;
use crate::model::{EnvironmentGroup, ProfileDefinition};
use crate::provider::{Authenticator, BoxFuture, CommandRunner, CredentialStore};
use crate::publisher::EventSink;
use crate::registry::ProfileRegistry;
use crate::runner::{OutputSink, OutputStream, RunOutcome, RunSpec};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub fn test_registry() -> ProfileRegistry {
    let profiles = [
        ("dev-1", EnvironmentGroup::Dev),
        ("dev-2", EnvironmentGroup::Dev),
        ("np-1", EnvironmentGroup::NonProd),
        ("np-2", EnvironmentGroup::NonProd),
        ("np-3", EnvironmentGroup::NonProd),
        ("prod-1", EnvironmentGroup::Prod),
        ("prod-2", EnvironmentGroup::Prod),
    ]
    .into_iter()
    .map(|(name, group)| ProfileDefinition::new(name, group, "us-east-1", name))
    .collect();
    ProfileRegistry::new(profiles).unwrap()
}

pub fn login() -> LoginInputs {
    LoginInputs {
        username: "CORP\\operator".into(),
        password: "secret".into(),
        adfs_host: "adfs.example.com".into(),
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: Mutex<HashMap<String, RawCredentials>>,
    failure: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn put_long_term(&self, profile: &str) {
        let raw = [
            ("aws_access_key_id", "AKIA"),
            ("aws_secret_access_key", "secret"),
        ];
        self.put(profile, &raw);
    }

    pub fn put_session(&self, profile: &str, expires: &str) {
        let raw = [
            ("aws_access_key_id", "ASIA"),
            ("aws_secret_access_key", "secret"),
            ("aws_session_token", "token"),
            ("aws_expiration", expires),
        ];
        self.put(profile, &raw);
    }

    fn put(&self, profile: &str, pairs: &[(&str, &str)]) {
        let raw = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.entries.lock().unwrap().insert(profile.to_string(), raw);
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, profile: &str) -> Result<Option<RawCredentials>, StoreError> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(StoreError::Unavailable {
                message,
                source: None,
            });
        }
        Ok(self.entries.lock().unwrap().get(profile).cloned())
    }
}

/// Authenticator whose per-profile results are scripted up front. Unscripted
/// attempts succeed.
#[derive(Default)]
pub struct FakeAuthenticator {
    script: Mutex<HashMap<String, VecDeque<Result<(), AuthFailureReason>>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeAuthenticator {
    pub fn script(&self, profile: &str, results: Vec<Result<(), AuthFailureReason>>) {
        self.script
            .lock()
            .unwrap()
            .insert(profile.to_string(), results.into());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls(&self, profile: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == profile)
            .count()
    }
}

impl Authenticator for FakeAuthenticator {
    fn authenticate<'a>(
        &'a self,
        request: &'a AuthRequest,
    ) -> BoxFuture<'a, Result<AuthSuccess, AuthenticationFailure>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.profile.clone());
            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let next = self
                .script
                .lock()
                .unwrap()
                .get_mut(&request.profile)
                .and_then(|queue| queue.pop_front());
            match next {
                Some(Err(reason)) => Err(AuthenticationFailure::new(reason, "scripted failure")),
                _ => Ok(AuthSuccess {
                    output: "Prepared ADFS authentication".into(),
                }),
            }
        })
    }
}

#[derive(Clone, Copy)]
pub struct FakeRun {
    pub exit_code: i32,
    pub delay: Duration,
}

/// Runner with per-profile exit codes and delays; defaults to an instant
/// success that prints the profile name.
#[derive(Default)]
pub struct FakeRunner {
    behaviour: Mutex<HashMap<String, FakeRun>>,
    ran: Mutex<Vec<String>>,
    crashes: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn set(&self, profile: &str, exit_code: i32, delay: Duration) {
        self.behaviour
            .lock()
            .unwrap()
            .insert(profile.to_string(), FakeRun { exit_code, delay });
    }

    /// The execution task for `profile` panics instead of returning.
    pub fn crash(&self, profile: &str) {
        self.crashes.lock().unwrap().push(profile.to_string());
    }

    pub fn ran(&self) -> Vec<String> {
        self.ran.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run<'a>(
        &'a self,
        spec: &'a RunSpec,
        output: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<RunOutcome, ExecutionFailure>> {
        Box::pin(async move {
            self.ran.lock().unwrap().push(spec.profile.clone());
            let behaviour = self.behaviour.lock().unwrap().get(&spec.profile).copied();
            let behaviour = behaviour.unwrap_or(FakeRun {
                exit_code: 0,
                delay: Duration::ZERO,
            });
            let started = Instant::now();
            output.line(OutputStream::Stdout, &spec.profile);
            if self.crashes.lock().unwrap().contains(&spec.profile) {
                panic!("runner crashed for {}", spec.profile);
            }
            if behaviour.delay > spec.timeout {
                tokio::time::sleep(spec.timeout).await;
                return Ok(RunOutcome {
                    timed_out: true,
                    duration: started.elapsed(),
                    ..RunOutcome::default()
                });
            }
            tokio::time::sleep(behaviour.delay).await;
            Ok(RunOutcome {
                exit_code: Some(behaviour.exit_code),
                timed_out: false,
                stdout: format!("{}\n", spec.profile),
                stderr: String::new(),
                duration: started.elapsed(),
            })
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
