//! Credential storage.
//!
//! The client never persists secrets itself; it reads them through a
//! [`SecretStore`] handed to it at construction time.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::api::ApiError;

/// The keyring service name for jiralink credentials.
pub const KEYRING_SERVICE: &str = "jiralink";

/// Access to credential material.
pub trait SecretStore: Send + Sync {
    /// Retrieve a secret, `Ok(None)` when nothing is stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, ApiError>;

    /// Store a secret, replacing any previous value.
    fn store(&self, key: &str, value: &str) -> Result<(), ApiError>;

    /// Delete a secret. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> Result<(), ApiError>;
}

/// Secrets kept in the OS keyring.
///
/// Each key is used as the keyring account under a shared service name.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl KeyringStore {
    /// Create a store for the given keyring service.
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, ApiError> {
        keyring::Entry::new(&self.service, key)
            .map_err(|e| ApiError::Keyring(format!("failed to access keyring: {}", e)))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        match self.entry(key)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(ApiError::Keyring(format!("failed to retrieve secret: {}", e))),
        }
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|e| ApiError::Keyring(format!("failed to store secret: {}", e)))
    }

    fn delete(&self, key: &str) -> Result<(), ApiError> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(ApiError::Keyring(format!("failed to delete secret: {}", e))),
        }
    }
}

/// In-process secret store, for tests and embedders that manage secrets themselves.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<HashMap<String, String>>,
}

impl MemorySecretStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding a single secret.
    pub fn with_secret(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut secrets) = store.secrets.lock() {
            secrets.insert(key.to_string(), value.to_string());
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, ApiError> {
        self.secrets
            .lock()
            .map_err(|_| ApiError::Keyring("secret store lock poisoned".to_string()))
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, key: &str) -> Result<Option<String>, ApiError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> Result<(), ApiError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
