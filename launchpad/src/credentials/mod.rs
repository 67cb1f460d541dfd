//! Credential and tunnel-zone resolution.
//!
//! The engine never stores tokens. Repositories carry an opaque
//! [`CredentialRef`] naming an account; executors resolve it to a
//! [`Secret`] through a [`CredentialResolver`] right before use.

mod memory;

pub use memory::{StaticCredentials, StaticZones};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::observability::credential_fingerprint;

/// Opaque reference to an account whose token authorizes fetches.
///
/// Debug and Display print a fingerprint instead of the raw reference.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialRef(String);

impl CredentialRef {
    /// Wraps an account reference.
    #[must_use]
    pub fn new(account: impl Into<String>) -> Self {
        Self(account.into())
    }

    /// Returns the raw reference. Never log this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the reference is empty or whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Stable non-reversible identifier safe for logs.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        credential_fingerprint(&self.0)
    }
}

impl From<&str> for CredentialRef {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CredentialRef {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CredentialRef({})", self.fingerprint())
    }
}

impl fmt::Display for CredentialRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cred:{}", self.fingerprint())
    }
}

/// A resolved token.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the token for use in a request.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Errors from credential and zone resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// No credential or zone is known for the input.
    #[error("{0} not found")]
    NotFound(String),
    /// The provider rejected the token.
    #[error("{0}")]
    Unauthorized(String),
    /// The provider could not be reached or answered unexpectedly.
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Resolves an account reference to its access token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// Returns the account's token, or `NotFound`.
    async fn resolve_credential(&self, account: &CredentialRef) -> Result<Secret, ResolveError>;
}

/// Lists the DNS zones a provider token may manage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ZoneResolver: Send + Sync {
    /// Returns the zone names, or `Unauthorized` if the token is rejected.
    async fn resolve_zones(&self, token: &Secret) -> Result<Vec<String>, ResolveError>;
}
