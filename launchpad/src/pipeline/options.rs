//! Run options and the trigger interface types.

use serde::{Deserialize, Serialize};

use super::RetryConfig;
use crate::core::{RunId, Stage};
use crate::errors::ValidationError;
use crate::repository::RepositoryKey;

/// Per-run options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Stages to execute even if their success condition holds.
    #[serde(default)]
    pub force_stages: Vec<Stage>,
    /// Whether the run ends with `Expose`.
    #[serde(default)]
    pub expose: bool,
    /// Overrides the engine's retry policy for this run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
}

impl RunOptions {
    /// Options for a plain run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces `stage` and everything after it.
    #[must_use]
    pub fn force(mut self, stage: Stage) -> Self {
        if !self.force_stages.contains(&stage) {
            self.force_stages.push(stage);
        }
        self
    }

    /// Requests exposure through the tunnel.
    #[must_use]
    pub fn with_expose(mut self, expose: bool) -> Self {
        self.expose = expose;
        self
    }

    /// Sets a run-scoped retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Returns true if the run includes `Expose`.
    #[must_use]
    pub fn wants_expose(&self) -> bool {
        self.expose || self.force_stages.contains(&Stage::Expose)
    }

    /// The earliest forced stage.
    #[must_use]
    pub fn earliest_forced(&self) -> Option<Stage> {
        self.force_stages.iter().min().copied()
    }
}

/// Body of a trigger-run request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// `owner.name.branch`.
    pub repository_key: String,
    /// Stages to redo.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_stages: Vec<Stage>,
    /// Whether to expose the container.
    #[serde(default)]
    pub expose: bool,
}

impl RunRequest {
    /// Parses the key and builds run options.
    pub fn into_parts(self) -> Result<(RepositoryKey, RunOptions), ValidationError> {
        let key: RepositoryKey = self.repository_key.parse()?;
        let options = RunOptions {
            force_stages: self.force_stages,
            expose: self.expose,
            retry: None,
        };
        Ok((key, options))
    }
}

/// Successful trigger-run response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    /// The new run.
    pub run_id: RunId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_dedupes_and_orders() {
        let options = RunOptions::new().force(Stage::Run).force(Stage::Fetch).force(Stage::Run);
        assert_eq!(options.force_stages, vec![Stage::Run, Stage::Fetch]);
        assert_eq!(options.earliest_forced(), Some(Stage::Fetch));
        assert!(!options.wants_expose());
        assert!(options.force(Stage::Expose).wants_expose());
    }

    #[test]
    fn test_run_request_parsing() {
        let request: RunRequest = serde_json::from_str(
            r#"{"repositoryKey": "Acme.Widgets.main", "forceStages": ["fetch"]}"#,
        )
        .unwrap();
        let (key, options) = request.into_parts().unwrap();
        assert_eq!(key.as_str(), "acme.widgets.main");
        assert_eq!(options.force_stages, vec![Stage::Fetch]);
        assert!(!options.expose);
    }

    #[test]
    fn test_run_request_rejects_bad_key() {
        let request = RunRequest {
            repository_key: "widgets".into(),
            force_stages: vec![],
            expose: false,
        };
        let err = request.into_parts().unwrap_err();
        assert_eq!(err.field, "repository_key");
    }

    #[test]
    fn test_run_response_shape() {
        let body = serde_json::to_value(RunResponse { run_id: RunId::new(4) }).unwrap();
        assert_eq!(body, serde_json::json!({ "runId": 4 }));
    }
}
