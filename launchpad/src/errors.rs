//! Error types for the launchpad orchestrator.
//!
//! Request-time failures (`NotFound`, `Validation`, `AlreadyRunning`,
//! `Conflict`) are returned synchronously to the caller. Failures that happen
//! while a run is in flight are reported through the run's progress channel
//! and the repository state, never through these return values.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::core::{RunId, Stage};
use crate::credentials::ResolveError;
use crate::store::StoreError;

/// The main error type for launchpad operations.
#[derive(Debug, Error)]
pub enum LaunchpadError {
    /// An unknown repository key or run id.
    #[error("not found: {0}")]
    NotFound(String),

    /// A non-terminal run already exists for the repository.
    #[error("repository {key} already has an active run ({run_id})")]
    AlreadyRunning {
        /// The repository key.
        key: String,
        /// The run currently holding the repository.
        run_id: RunId,
    },

    /// A malformed repository configuration.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// A step executor reported a fatal outcome.
    #[error("{0}")]
    StageFailure(#[from] StageFailure),

    /// The run was cancelled.
    #[error("run cancelled: {0}")]
    Cancelled(String),

    /// A credential was rejected by an upstream provider.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The operation conflicts with the repository's current activity.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The record store failed.
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl LaunchpadError {
    /// Returns the machine-readable kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::Validation(_) => ErrorKind::Validation,
            Self::StageFailure(_) => ErrorKind::StageFailure,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// Converts the error into the `{kind, message}` shape returned to front adapters.
    #[must_use]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<ResolveError> for LaunchpadError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(what) => Self::NotFound(what),
            ResolveError::Unauthorized(why) => Self::Unauthorized(why),
            ResolveError::Upstream(msg) => Self::Unauthorized(msg),
        }
    }
}

/// Machine-readable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown repository or run.
    NotFound,
    /// Conflicting concurrent run.
    AlreadyRunning,
    /// Malformed configuration.
    Validation,
    /// Executor failure.
    StageFailure,
    /// Run cancelled.
    Cancelled,
    /// Credential rejected.
    Unauthorized,
    /// Conflicting repository activity.
    Conflict,
    /// Record store failure.
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::AlreadyRunning => "already_running",
            Self::Validation => "validation",
            Self::StageFailure => "stage_failure",
            Self::Cancelled => "cancelled",
            Self::Unauthorized => "unauthorized",
            Self::Conflict => "conflict",
            Self::Store => "store",
        };
        f.write_str(s)
    }
}

/// Error body returned by request/response interfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error kind.
    pub kind: ErrorKind,
    /// Human readable detail.
    pub message: String,
}

/// Error raised when a repository configuration is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    /// The offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("field".to_string(), serde_json::Value::String(self.field.clone()));
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map
    }
}

/// A stage that ended the run with a fatal outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct StageFailure {
    /// The failing stage.
    pub stage: Stage,
    /// The executor's error detail.
    pub cause: String,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: Stage, cause: impl Into<String>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

/// Result alias for launchpad operations.
pub type Result<T, E = LaunchpadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("ports.host", "must be between 1 and 65535");
        assert_eq!(err.to_string(), "invalid ports.host: must be between 1 and 65535");
        assert_eq!(err.to_dict()["field"], serde_json::json!("ports.host"));
    }

    #[test]
    fn test_error_kinds() {
        let err = LaunchpadError::NotFound("acme.widgets.main".into());
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = LaunchpadError::AlreadyRunning {
            key: "acme.widgets.main".into(),
            run_id: RunId::new(7),
        };
        assert_eq!(err.kind(), ErrorKind::AlreadyRunning);
        assert!(err.to_string().contains("run-7"));

        let err: LaunchpadError = StageFailure::new(Stage::Build, "build command failed").into();
        assert_eq!(err.kind(), ErrorKind::StageFailure);
        assert_eq!(err.to_string(), "build stage failed: build command failed");
    }

    #[test]
    fn test_error_response_serialization() {
        let err = LaunchpadError::Conflict("run active".into());
        let body = serde_json::to_value(err.to_response()).unwrap();
        assert_eq!(body["kind"], "conflict");
        assert_eq!(body["message"], "conflict: run active");
    }

    #[test]
    fn test_resolve_error_conversion() {
        let err: LaunchpadError = ResolveError::NotFound("account acme".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err: LaunchpadError = ResolveError::Unauthorized("token rejected".into()).into();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
