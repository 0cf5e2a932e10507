use crate::config::AppConfig;
use crate::connection::{ConnectOutcome, ConnectRequest, ConnectionManager, ToggleOutcome};
use crate::dispatcher::CommandDispatcher;
use crate::error::ValidationError;
use crate::events::{Event, StatusEvent};
use crate::history::HistoryRing;
use crate::model::{ConnectionState, ProfileId};
use crate::protocol::{ClientMessage, command_targets};
use crate::provider::{Authenticator, CommandRunner, CredentialStore, LoginStore};
use crate::publisher::{EventSink, SessionPublisher, forward_status};
use crate::registry::ProfileRegistry;
use crate::validator::{CredentialValidator, ValidationReport};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// External collaborators the engine is assembled from.
pub struct Collaborators {
    pub authenticator: Arc<dyn Authenticator>,
    pub runner: Arc<dyn CommandRunner>,
    pub credentials: Arc<dyn CredentialStore>,
    pub logins: Arc<dyn LoginStore>,
}

/// Process-wide state shared by every session.
pub struct Engine {
    pub registry: Arc<ProfileRegistry>,
    pub connections: Arc<ConnectionManager>,
    pub dispatcher: Arc<CommandDispatcher>,
    pub validator: CredentialValidator,
    pub history: Arc<HistoryRing>,
    pub default_command: String,
}

impl Engine {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let registry = Arc::new(config.registry()?);
        let validator = CredentialValidator::new(registry.clone(), collaborators.credentials);
        let history = Arc::new(HistoryRing::new(config.max_history));
        let connections = Arc::new(ConnectionManager::new(
            registry.clone(),
            config.connection.clone(),
            collaborators.authenticator,
            collaborators.logins,
            validator.clone(),
        ));
        let dispatcher = Arc::new(CommandDispatcher::new(
            registry.clone(),
            collaborators.runner,
            history.clone(),
            config.command.clone(),
        ));
        Ok(Arc::new(Self {
            registry,
            connections,
            dispatcher,
            validator,
            history,
            default_command: config.command.default_command.clone(),
        }))
    }

    /// Validates credentials off the async threads and records the statuses
    /// on each profile.
    pub async fn validate_credentials(&self, profiles: Vec<ProfileId>) -> ValidationReport {
        let validator = self.validator.clone();
        let targets = profiles.clone();
        let report = match tokio::task::spawn_blocking(move || validator.validate_or_unknown(&targets))
            .await
        {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "credential validation task failed");
                let targets = self.validator.resolve_targets(&profiles);
                ValidationReport::unavailable(&targets, "validation task failed")
            }
        };
        self.connections.apply_credential_statuses(&report);
        report
    }
}

/// One connected client. Dropping the session cancels its in-flight command
/// executions; connection state is left untouched.
pub struct Session {
    engine: Arc<Engine>,
    publisher: Arc<SessionPublisher>,
    cancel: CancellationToken,
}

impl Session {
    pub fn open(engine: Arc<Engine>) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (publisher, rx) = SessionPublisher::channel();
        let cancel = CancellationToken::new();
        let status_rx = engine.connections.subscribe();
        for profile in engine.connections.snapshot() {
            let message = profile.last_error.clone();
            publisher.publish(Event::ConnectionStatus(StatusEvent::new(
                &profile.name,
                profile.state,
                message,
            )));
        }
        forward_status(status_rx, publisher.clone(), cancel.clone());
        debug!("session opened");
        let session = Self {
            engine,
            publisher,
            cancel,
        };
        (session, rx)
    }

    pub fn handle_text(&self, text: &str) {
        match ClientMessage::parse(text) {
            Ok(message) => self.handle(message),
            Err(err) => {
                warn!(error = %err, "rejecting malformed client message");
                self.publisher
                    .publish(Event::error(format!("Invalid message: {err}")));
            }
        }
    }

    pub fn handle(&self, message: ClientMessage) {
        match message {
            ClientMessage::ConnectProfile {
                profile,
                credentials,
            } => self.spawn_connect(profile, ClientMessage::connect_request(credentials), false),
            ClientMessage::ToggleProfile {
                profile,
                credentials,
            } => self.spawn_connect(profile, ClientMessage::connect_request(credentials), true),
            ClientMessage::DisconnectProfile { profile } => self.spawn_disconnect(profile),
            ClientMessage::ExecuteCommand {
                profile,
                profiles,
                command,
                timeout,
            } => {
                let targets = command_targets(profile, profiles);
                if let Err(err) = self.execute(&command, targets, timeout) {
                    self.publisher.publish(Event::error(err.to_string()));
                }
            }
            ClientMessage::ValidateCredentials { profiles } => {
                self.spawn_validate(profiles.unwrap_or_default())
            }
        }
    }

    fn spawn_connect(&self, profile: ProfileId, request: ConnectRequest, toggle: bool) {
        let engine = self.engine.clone();
        let publisher = self.publisher.clone();
        // Connection attempts outlive the session that started them.
        tokio::spawn(async move {
            let result = if toggle {
                engine
                    .connections
                    .toggle(&profile, request)
                    .await
                    .map(|outcome| match outcome {
                        ToggleOutcome::Connect(outcome) => Some(outcome),
                        ToggleOutcome::Disconnected => None,
                    })
            } else {
                engine.connections.connect(&profile, request).await.map(Some)
            };
            match result {
                Ok(Some(ConnectOutcome::AlreadyConnected)) => {
                    publisher.publish(Event::ConnectionStatus(StatusEvent::new(
                        &profile,
                        ConnectionState::Connected,
                        Some(format!("{profile} is already connected")),
                    )));
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(profile = %profile, error = %err, "connect rejected");
                    publisher.publish(Event::error(err.to_string()));
                }
            }
        });
    }

    fn spawn_disconnect(&self, profile: ProfileId) {
        let engine = self.engine.clone();
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.connections.disconnect(&profile).await {
                publisher.publish(Event::error(err.to_string()));
            }
        });
    }

    fn execute(
        &self,
        command: &str,
        targets: Vec<ProfileId>,
        timeout: Option<u64>,
    ) -> Result<(), ValidationError> {
        if command.trim().is_empty() {
            return Err(ValidationError::EmptyCommand);
        }
        self.engine.connections.ensure_connected(&targets)?;
        let request = self.engine.dispatcher.request(command, targets, timeout);
        info!(
            request_id = %request.request_id,
            targets = request.targets.len(),
            "command accepted"
        );
        let dispatcher = self.engine.dispatcher.clone();
        let sink: Arc<dyn EventSink> = self.publisher.clone();
        let cancel = self.cancel.child_token();
        tokio::spawn(async move {
            dispatcher.dispatch(request, sink, cancel).await;
        });
        Ok(())
    }

    fn spawn_validate(&self, profiles: Vec<ProfileId>) {
        let engine = self.engine.clone();
        let publisher = self.publisher.clone();
        tokio::spawn(async move {
            let report = engine.validate_credentials(profiles).await;
            publisher.publish(Event::ValidationResult(report));
        });
    }

    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            debug!("session closed");
        }
        self.cancel.cancel();
        self.publisher.close();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
