use adfs_core::auth::LoginInputs;
use adfs_core::error::StoreError;
use adfs_core::provider::{LoginAccount, LoginStore};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const SERVICE: &str = "adfs-fleet";
const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredLogin {
    version: u32,
    username: String,
    password: String,
    adfs_host: String,
}

/// Saved ADFS logins in the OS keyring, one entry per account key.
#[derive(Clone, Debug)]
pub struct KeyringLoginStore {
    service: String,
}

impl Default for KeyringLoginStore {
    fn default() -> Self {
        Self::new(SERVICE)
    }
}

impl KeyringLoginStore {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, account: &LoginAccount) -> Result<Entry, StoreError> {
        Entry::new(&self.service, &account.key())
            .map_err(|err| StoreError::unavailable("open keyring entry", err))
    }
}

impl LoginStore for KeyringLoginStore {
    fn get(&self, account: &LoginAccount) -> Result<Option<LoginInputs>, StoreError> {
        let value = match self.entry(account)?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(err) => return Err(StoreError::unavailable("read login from keyring", err)),
        };
        let decoded = decode_login(&value);
        if decoded.is_none() {
            warn!(account = %account, "ignoring unreadable saved login");
        }
        Ok(decoded)
    }

    fn set(&self, account: &LoginAccount, inputs: &LoginInputs) -> Result<(), StoreError> {
        let payload = encode_login(inputs).map_err(|err| StoreError::Write {
            message: "serialize login".to_string(),
            source: Some(err.into()),
        })?;
        self.entry(account)?
            .set_password(&payload)
            .map_err(|err| StoreError::Write {
                message: "write login to keyring".to_string(),
                source: Some(err.into()),
            })?;
        debug!(account = %account, "saved login");
        Ok(())
    }

    fn clear(&self, account: &LoginAccount) -> Result<(), StoreError> {
        match self.entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(StoreError::Write {
                message: "delete login from keyring".to_string(),
                source: Some(err.into()),
            }),
        }
    }
}

fn encode_login(inputs: &LoginInputs) -> serde_json::Result<String> {
    serde_json::to_string(&StoredLogin {
        version: PAYLOAD_VERSION,
        username: inputs.username.clone(),
        password: inputs.password.clone(),
        adfs_host: inputs.adfs_host.clone(),
    })
}

/// Unknown versions and malformed payloads decode to nothing.
fn decode_login(value: &str) -> Option<LoginInputs> {
    let stored: StoredLogin = serde_json::from_str(value).ok()?;
    if stored.version != PAYLOAD_VERSION {
        return None;
    }
    Some(LoginInputs {
        username: stored.username,
        password: stored.password,
        adfs_host: stored.adfs_host,
    })
}
