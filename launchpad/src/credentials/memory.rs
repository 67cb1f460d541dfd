//! In-memory resolvers backed by static tables.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{CredentialRef, CredentialResolver, ResolveError, Secret, ZoneResolver};

/// Account table mapping account references to tokens.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    accounts: RwLock<HashMap<String, Secret>>,
}

impl StaticCredentials {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an account.
    #[must_use]
    pub fn with_account(self, account: impl Into<String>, token: impl Into<String>) -> Self {
        self.insert(account, token);
        self
    }

    /// Adds or replaces an account.
    pub fn insert(&self, account: impl Into<String>, token: impl Into<String>) {
        self.accounts.write().insert(account.into(), Secret::new(token));
    }

    /// Removes an account, returning true if it existed.
    pub fn remove(&self, account: &str) -> bool {
        self.accounts.write().remove(account).is_some()
    }

    /// Number of known accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    /// Returns true if no accounts are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl CredentialResolver for StaticCredentials {
    async fn resolve_credential(&self, account: &CredentialRef) -> Result<Secret, ResolveError> {
        self.accounts
            .read()
            .get(account.expose())
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(format!("credential {account}")))
    }
}

/// Zone table keyed by provider token.
#[derive(Debug, Default)]
pub struct StaticZones {
    zones: RwLock<HashMap<String, Vec<String>>>,
}

impl StaticZones {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `token` the given zones.
    #[must_use]
    pub fn with_zones(self, token: impl Into<String>, zones: &[&str]) -> Self {
        self.zones
            .write()
            .insert(token.into(), zones.iter().map(|z| (*z).to_string()).collect());
        self
    }
}

#[async_trait]
impl ZoneResolver for StaticZones {
    async fn resolve_zones(&self, token: &Secret) -> Result<Vec<String>, ResolveError> {
        self.zones
            .read()
            .get(token.expose())
            .cloned()
            .ok_or_else(|| ResolveError::Unauthorized("token is not valid for any zone".into()))
    }
}
