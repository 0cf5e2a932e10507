use crate::auth::{AuthRequest, AuthSuccess, AuthenticationFailure, LoginInputs};
use crate::credentials::RawCredentials;
use crate::error::{ExecutionFailure, StoreError};
use crate::model::ProfileId;
use crate::runner::{OutputSink, RunOutcome, RunSpec};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Runs one federated login for one profile. Implementations never retry;
/// the connection manager owns the retry policy.
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        request: &'a AuthRequest,
    ) -> BoxFuture<'a, Result<AuthSuccess, AuthenticationFailure>>;
}

pub trait CommandRunner: Send + Sync {
    fn run<'a>(
        &'a self,
        spec: &'a RunSpec,
        output: &'a dyn OutputSink,
    ) -> BoxFuture<'a, Result<RunOutcome, ExecutionFailure>>;
}

/// Read-only access to stored session credential material.
pub trait CredentialStore: Send + Sync {
    /// `Ok(None)` means nothing is stored for the profile; `Err` means the
    /// store itself could not be read.
    fn load(&self, profile: &str) -> Result<Option<RawCredentials>, StoreError>;
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum LoginAccount {
    Default,
    Profile(ProfileId),
}

impl LoginAccount {
    pub fn key(&self) -> String {
        match self {
            LoginAccount::Default => "default".to_string(),
            LoginAccount::Profile(profile) => format!("profile:{profile}"),
        }
    }
}

impl fmt::Display for LoginAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Saved ADFS logins, one per profile plus a shared default.
pub trait LoginStore: Send + Sync {
    fn get(&self, account: &LoginAccount) -> Result<Option<LoginInputs>, StoreError>;
    fn set(&self, account: &LoginAccount, inputs: &LoginInputs) -> Result<(), StoreError>;
    fn clear(&self, account: &LoginAccount) -> Result<(), StoreError>;

    /// Saved login for `profile`, falling back to the default entry.
    fn resolve(&self, profile: &str) -> Result<Option<LoginInputs>, StoreError> {
        if let Some(inputs) = self.get(&LoginAccount::Profile(profile.to_string()))? {
            return Ok(Some(inputs));
        }
        self.get(&LoginAccount::Default)
    }
}

/// Process-local login store. Logins saved here last until the process exits.
#[derive(Default)]
pub struct MemoryLoginStore {
    entries: Mutex<HashMap<LoginAccount, LoginInputs>>,
}

impl MemoryLoginStore {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<LoginAccount, LoginInputs>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LoginStore for MemoryLoginStore {
    fn get(&self, account: &LoginAccount) -> Result<Option<LoginInputs>, StoreError> {
        Ok(self.entries().get(account).cloned())
    }

    fn set(&self, account: &LoginAccount, inputs: &LoginInputs) -> Result<(), StoreError> {
        self.entries().insert(account.clone(), inputs.clone());
        Ok(())
    }

    fn clear(&self, account: &LoginAccount) -> Result<(), StoreError> {
        self.entries().remove(account);
        Ok(())
    }
}
