//! Per-profile connection state machine.
//!
//! Every profile moves through `disconnected -> connecting -> connected` or
//! `connecting -> error`. Transitions for one profile are serialised by an
//! async lock owned by that profile; unrelated profiles never contend.
//! Each transition is broadcast exactly once as a [`StatusEvent`].

use crate::auth::{AuthRequest, AuthenticationFailure, LoginInputs};
use crate::config::ConnectionSettings;
use crate::credentials::CredentialStatus;
use crate::error::{ConnectError, ValidationError};
use crate::events::StatusEvent;
use crate::model::{ConnectionState, ProfileId, ProfileSnapshot};
use crate::provider::{Authenticator, LoginStore};
use crate::registry::ProfileRegistry;
use crate::validator::{CredentialValidator, ValidationReport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const STATUS_CHANNEL_CAPACITY: usize = 256;

/// Per-request overrides of the configured connection settings.
#[derive(Clone, Debug, Default)]
pub struct ConnectOverrides {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub no_sspi: Option<bool>,
    pub env_mode: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct ConnectRequest {
    /// Login supplied with the request; saved logins are used when absent.
    pub inputs: Option<LoginInputs>,
    pub overrides: ConnectOverrides,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected,
    AlreadyConnected,
    Failed(AuthenticationFailure),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    Connect(ConnectOutcome),
    Disconnected,
}

#[derive(Debug)]
struct ProfileRuntime {
    state: ConnectionState,
    credential_status: Option<CredentialStatus>,
    last_error: Option<String>,
}

struct ProfileSlot {
    transition: tokio::sync::Mutex<()>,
    runtime: Mutex<ProfileRuntime>,
}

impl ProfileSlot {
    fn new() -> Self {
        Self {
            transition: tokio::sync::Mutex::new(()),
            runtime: Mutex::new(ProfileRuntime {
                state: ConnectionState::Disconnected,
                credential_status: None,
                last_error: None,
            }),
        }
    }

    fn runtime(&self) -> MutexGuard<'_, ProfileRuntime> {
        self.runtime
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn state(&self) -> ConnectionState {
        self.runtime().state
    }
}

pub struct ConnectionManager {
    registry: Arc<ProfileRegistry>,
    settings: ConnectionSettings,
    authenticator: Arc<dyn Authenticator>,
    logins: Arc<dyn LoginStore>,
    validator: CredentialValidator,
    slots: HashMap<ProfileId, ProfileSlot>,
    events: broadcast::Sender<StatusEvent>,
}

impl ConnectionManager {
    pub fn new(
        registry: Arc<ProfileRegistry>,
        settings: ConnectionSettings,
        authenticator: Arc<dyn Authenticator>,
        logins: Arc<dyn LoginStore>,
        validator: CredentialValidator,
    ) -> Self {
        let slots = registry
            .ids()
            .into_iter()
            .map(|id| (id, ProfileSlot::new()))
            .collect();
        let (events, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            registry,
            settings,
            authenticator,
            logins,
            validator,
            slots,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    pub fn state(&self, profile: &str) -> Option<ConnectionState> {
        self.slots.get(profile).map(ProfileSlot::state)
    }

    fn slot(&self, profile: &str) -> Result<&ProfileSlot, ConnectError> {
        self.slots
            .get(profile)
            .ok_or_else(|| ConnectError::UnknownProfile(profile.to_string()))
    }

    pub async fn connect(
        &self,
        profile: &str,
        request: ConnectRequest,
    ) -> Result<ConnectOutcome, ConnectError> {
        let slot = self.slot(profile)?;
        let _transition = slot
            .transition
            .try_lock()
            .map_err(|_| ConnectError::AttemptInProgress(profile.to_string()))?;

        if slot.state() == ConnectionState::Connected {
            debug!(profile = %profile, "already connected");
            return Ok(ConnectOutcome::AlreadyConnected);
        }

        let inputs = self.resolve_inputs(profile, request.inputs)?;
        let auth_request = self.auth_request(profile, inputs, &request.overrides);
        let retries = request.overrides.retries.unwrap_or(self.settings.retries);

        self.transition(
            slot,
            profile,
            ConnectionState::Connecting,
            Some(format!("Connecting to {profile}...")),
        );

        let attempts = retries.saturating_add(1);
        let mut last_failure = None;
        for attempt in 1..=attempts {
            info!(profile = %profile, attempt, attempts, "authenticating");
            match self.authenticator.authenticate(&auth_request).await {
                Ok(_) => {
                    self.transition(
                        slot,
                        profile,
                        ConnectionState::Connected,
                        Some(format!("Successfully connected to {profile}")),
                    );
                    self.refresh_credential_status(profile).await;
                    return Ok(ConnectOutcome::Connected);
                }
                Err(failure) => {
                    warn!(
                        profile = %profile,
                        attempt,
                        reason = %failure.reason,
                        "authentication attempt failed"
                    );
                    last_failure = Some(failure);
                }
            }
        }

        let failure = last_failure.unwrap_or_else(|| {
            AuthenticationFailure::new(
                crate::auth::AuthFailureReason::Unknown,
                "no authentication attempt was made",
            )
        });
        self.transition(
            slot,
            profile,
            ConnectionState::Error,
            Some(format!("Failed to connect to {profile}: {failure}")),
        );
        self.refresh_credential_status(profile).await;
        Ok(ConnectOutcome::Failed(failure))
    }

    /// Returns `true` when a connected profile was disconnected. Waits for any
    /// in-flight connect on the same profile to settle first.
    pub async fn disconnect(&self, profile: &str) -> Result<bool, ConnectError> {
        let slot = self.slot(profile)?;
        let _transition = slot.transition.lock().await;
        if slot.state() != ConnectionState::Connected {
            debug!(profile = %profile, "disconnect ignored; not connected");
            return Ok(false);
        }
        self.transition(
            slot,
            profile,
            ConnectionState::Disconnected,
            Some(format!("Disconnected from {profile}")),
        );
        Ok(true)
    }

    pub async fn toggle(
        &self,
        profile: &str,
        request: ConnectRequest,
    ) -> Result<ToggleOutcome, ConnectError> {
        if self.slot(profile)?.state() == ConnectionState::Connected {
            self.disconnect(profile).await?;
            return Ok(ToggleOutcome::Disconnected);
        }
        self.connect(profile, request)
            .await
            .map(ToggleOutcome::Connect)
    }

    pub async fn disconnect_all(&self) -> usize {
        let mut disconnected = 0;
        for profile in self.connected_profiles() {
            if let Ok(true) = self.disconnect(&profile).await {
                disconnected += 1;
            }
        }
        disconnected
    }

    /// Profiles currently `connected`, in registry order.
    pub fn connected_profiles(&self) -> Vec<ProfileId> {
        self.registry
            .all()
            .iter()
            .filter(|profile| self.state(&profile.name) == Some(ConnectionState::Connected))
            .map(|profile| profile.name.clone())
            .collect()
    }

    /// Precondition for dispatch: every target is known and connected.
    pub fn ensure_connected(&self, targets: &[ProfileId]) -> Result<(), ValidationError> {
        if targets.is_empty() {
            return Err(ValidationError::NoProfilesSelected);
        }
        let mut missing = Vec::new();
        for target in targets {
            match self.state(target) {
                None => return Err(ValidationError::UnknownProfile(target.clone())),
                Some(ConnectionState::Connected) => {}
                Some(_) => missing.push(target.clone()),
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::NotConnected(missing))
        }
    }

    pub fn snapshot(&self) -> Vec<ProfileSnapshot> {
        self.registry
            .all()
            .iter()
            .filter_map(|profile| {
                let slot = self.slots.get(&profile.name)?;
                let runtime = slot.runtime();
                Some(ProfileSnapshot {
                    name: profile.name.clone(),
                    group: profile.group,
                    region: profile.region.clone(),
                    description: profile.description.clone(),
                    state: runtime.state,
                    status: runtime.state.display_status(),
                    credential_status: runtime.credential_status.clone(),
                    last_error: runtime.last_error.clone(),
                })
            })
            .collect()
    }

    /// Stores freshly computed credential statuses on their profiles.
    pub fn apply_credential_statuses(&self, report: &ValidationReport) {
        for (profile, status) in &report.results {
            if let Some(slot) = self.slots.get(profile) {
                slot.runtime().credential_status = Some(status.clone());
            }
        }
    }

    fn resolve_inputs(
        &self,
        profile: &str,
        supplied: Option<LoginInputs>,
    ) -> Result<LoginInputs, ConnectError> {
        if let Some(inputs) = supplied.filter(LoginInputs::is_usable) {
            return Ok(inputs);
        }
        let saved = match self.logins.resolve(profile) {
            Ok(saved) => saved,
            Err(err) => {
                warn!(profile = %profile, error = %err, "saved login unavailable");
                None
            }
        };
        saved
            .filter(LoginInputs::is_usable)
            .ok_or_else(|| ConnectError::MissingInputs(profile.to_string()))
    }

    fn auth_request(
        &self,
        profile: &str,
        mut inputs: LoginInputs,
        overrides: &ConnectOverrides,
    ) -> AuthRequest {
        if inputs.adfs_host.trim().is_empty() {
            if let Some(host) = self.settings.adfs_host.as_ref() {
                inputs.adfs_host = host.clone();
            }
        }
        let region = self.registry.get(profile).map(|def| def.region.clone());
        let mut request = AuthRequest::new(profile, region, inputs, &self.settings);
        if let Some(timeout) = overrides.timeout {
            request.timeout = timeout;
        }
        if let Some(no_sspi) = overrides.no_sspi {
            request.no_sspi = no_sspi;
        }
        if let Some(env_mode) = overrides.env_mode {
            request.env_mode = env_mode;
        }
        request
    }

    fn transition(
        &self,
        slot: &ProfileSlot,
        profile: &str,
        state: ConnectionState,
        message: Option<String>,
    ) {
        {
            let mut runtime = slot.runtime();
            runtime.state = state;
            runtime.last_error = match state {
                ConnectionState::Error => message.clone(),
                _ => None,
            };
        }
        info!(profile = %profile, state = %state, "connection state changed");
        if self
            .events
            .send(StatusEvent::new(profile, state, message))
            .is_err()
        {
            debug!(profile = %profile, "no status subscribers");
        }
    }

    async fn refresh_credential_status(&self, profile: &str) {
        let validator = self.validator.clone();
        let targets = vec![profile.to_string()];
        let report =
            tokio::task::spawn_blocking(move || validator.validate(&targets)).await;
        let status = match report {
            Ok(Ok(mut report)) => report.results.remove(profile),
            Ok(Err(err)) => {
                warn!(profile = %profile, error = %err, "credential status unavailable");
                None
            }
            Err(err) => {
                warn!(profile = %profile, error = %err, "credential check task failed");
                None
            }
        };
        if let Some(slot) = self.slots.get(profile) {
            slot.runtime().credential_status = status;
        }
    }
}
