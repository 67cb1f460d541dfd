//! Mutable lifecycle record of a repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{ContainerStatus, LifecycleState, Stage, TransitionError};

/// Last-known state of a repository, owned by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryState {
    /// A checkout exists.
    pub fetched: bool,
    /// Commit of the checkout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_commit_hash: Option<String>,
    /// An image built from the checkout exists.
    pub built: bool,
    /// The verified image id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// A container was started.
    pub running: bool,
    /// Container status.
    #[serde(default)]
    pub container_status: ContainerStatus,
    /// Public URL of the container, if exposed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_url: Option<String>,
    /// Lifecycle machine state.
    #[serde(default)]
    pub lifecycle: LifecycleState,
    /// Last modification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RepositoryState {
    /// State of a freshly registered repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when `stage`'s success condition already holds.
    #[must_use]
    pub fn satisfies(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.fetched,
            Stage::Build => self.built,
            Stage::Run => self.running && self.container_status == ContainerStatus::Running,
            Stage::Expose => self.tunnel_url.is_some(),
        }
    }

    /// Moves the lifecycle machine to `next`.
    pub fn transition(&mut self, next: LifecycleState) -> Result<(), TransitionError> {
        if !self.lifecycle.can_transition_to(&next) {
            return Err(TransitionError {
                from: self.lifecycle,
                to: next,
            });
        }
        self.lifecycle = next;
        self.touch();
        Ok(())
    }

    /// Merges an executor's delta, returning true if an artifact changed.
    ///
    /// A new commit invalidates the built image.
    pub fn apply(&mut self, delta: &StateDelta) -> bool {
        let mut changed = false;

        if let Some(hash) = &delta.commit_hash {
            if self.last_commit_hash.as_deref() != Some(hash.as_str()) {
                changed = true;
                self.built = false;
                self.image_id = None;
            }
            self.fetched = true;
            self.last_commit_hash = Some(hash.clone());
        }

        if let Some(image) = &delta.image_id {
            changed |= self.image_id.as_deref() != Some(image.as_str()) || !self.built;
            self.built = true;
            self.image_id = Some(image.clone());
        }

        if let Some(status) = delta.container_status {
            changed = true;
            self.running = matches!(status, ContainerStatus::Running | ContainerStatus::Starting);
            self.container_status = status;
        }

        if let Some(url) = &delta.tunnel_url {
            changed |= self.tunnel_url.as_deref() != Some(url.as_str());
            self.tunnel_url = Some(url.clone());
        }

        self.touch();
        changed
    }

    /// Records a container status observed outside a run.
    pub fn observe_container(&mut self, status: ContainerStatus) -> Result<(), TransitionError> {
        match status {
            ContainerStatus::Crashed if self.lifecycle != LifecycleState::Crashed => {
                self.transition(LifecycleState::Crashed)?;
            }
            ContainerStatus::Running if self.lifecycle == LifecycleState::Crashed => {
                self.transition(LifecycleState::Running)?;
            }
            ContainerStatus::Offline if self.lifecycle == LifecycleState::Running => {
                self.transition(LifecycleState::Stopped)?;
            }
            _ => {}
        }
        self.running = matches!(status, ContainerStatus::Running | ContainerStatus::Starting);
        self.container_status = status;
        self.touch();
        Ok(())
    }

    /// Records an explicit stop.
    ///
    /// Only a `Running` or `Crashed` repository moves to `Stopped`; any other
    /// lifecycle state is kept and just loses its container.
    pub fn mark_stopped(&mut self) {
        if matches!(self.lifecycle, LifecycleState::Running | LifecycleState::Crashed) {
            self.lifecycle = LifecycleState::Stopped;
        }
        self.running = false;
        self.container_status = ContainerStatus::Offline;
        self.tunnel_url = None;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}

/// Partial state update returned by a successful executor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateDelta {
    /// New checkout commit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Verified image id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Status of the freshly started container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_status: Option<ContainerStatus>,
    /// Public URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tunnel_url: Option<String>,
}

impl StateDelta {
    /// Delta of a successful fetch.
    #[must_use]
    pub fn fetched(commit_hash: impl Into<String>) -> Self {
        Self {
            commit_hash: Some(commit_hash.into()),
            ..Self::default()
        }
    }

    /// Delta of a successful build.
    #[must_use]
    pub fn built(image_id: impl Into<String>) -> Self {
        Self {
            image_id: Some(image_id.into()),
            ..Self::default()
        }
    }

    /// Delta of a successful container start.
    #[must_use]
    pub fn started(status: ContainerStatus) -> Self {
        Self {
            container_status: Some(status),
            ..Self::default()
        }
    }

    /// Delta of a successful exposure.
    #[must_use]
    pub fn exposed(url: impl Into<String>) -> Self {
        Self {
            tunnel_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Returns true if the delta carries the artifact `stage` must produce.
    #[must_use]
    pub fn provides(&self, stage: Stage) -> bool {
        match stage {
            Stage::Fetch => self.commit_hash.is_some(),
            Stage::Build => self.image_id.is_some(),
            Stage::Run => self.container_status.is_some(),
            Stage::Expose => self.tunnel_url.is_some(),
        }
    }

    /// Short description of the produced artifact for progress messages.
    #[must_use]
    pub fn describe(&self, stage: Stage, state: &RepositoryState, host_port: u16) -> String {
        match stage {
            Stage::Fetch => format!("fetched {}", self.commit_hash.as_deref().unwrap_or("unknown")),
            Stage::Build => format!("built image {}", self.image_id.as_deref().unwrap_or("unknown")),
            Stage::Run => format!("container {} on port {host_port}", state.container_status),
            Stage::Expose => format!("exposed at {}", self.tunnel_url.as_deref().unwrap_or("unknown")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running_state() -> RepositoryState {
        RepositoryState {
            fetched: true,
            last_commit_hash: Some("abc123".into()),
            built: true,
            image_id: Some("sha256:1".into()),
            running: true,
            container_status: ContainerStatus::Running,
            tunnel_url: None,
            lifecycle: LifecycleState::Running,
            updated_at: None,
        }
    }

    #[test]
    fn test_new_state_satisfies_nothing() {
        let state = RepositoryState::new();
        for stage in Stage::ALL {
            assert!(!state.satisfies(stage));
        }
        assert_eq!(state.lifecycle, LifecycleState::New);
    }

    #[test]
    fn test_running_state_satisfies_run_not_expose() {
        let state = running_state();
        assert!(state.satisfies(Stage::Fetch));
        assert!(state.satisfies(Stage::Build));
        assert!(state.satisfies(Stage::Run));
        assert!(!state.satisfies(Stage::Expose));
    }

    #[test]
    fn test_new_commit_invalidates_image() {
        let mut state = running_state();
        assert!(state.apply(&StateDelta::fetched("def456")));
        assert!(state.fetched);
        assert!(!state.built);
        assert!(state.image_id.is_none());
    }

    #[test]
    fn test_same_commit_is_not_a_change() {
        let mut state = running_state();
        assert!(!state.apply(&StateDelta::fetched("abc123")));
        assert!(state.built);
    }

    #[test]
    fn test_apply_container_status() {
        let mut state = RepositoryState::new();
        assert!(state.apply(&StateDelta::started(ContainerStatus::Running)));
        assert!(state.running);
        assert!(state.apply(&StateDelta::started(ContainerStatus::Crashed)));
        assert!(!state.running);
    }

    #[test]
    fn test_transition_rejects_illegal_moves() {
        let mut state = RepositoryState::new();
        let err = state.transition(LifecycleState::Crashed).unwrap_err();
        assert_eq!(err.from, LifecycleState::New);
        assert!(state.transition(LifecycleState::Fetching).is_ok());
        assert!(state.updated_at.is_some());
    }

    #[test]
    fn test_observe_crash_and_recovery() {
        let mut state = running_state();
        state.observe_container(ContainerStatus::Crashed).unwrap();
        assert_eq!(state.lifecycle, LifecycleState::Crashed);
        assert!(!state.running);

        state.observe_container(ContainerStatus::Running).unwrap();
        assert_eq!(state.lifecycle, LifecycleState::Running);
        assert!(state.running);
    }

    #[test]
    fn test_mark_stopped_clears_tunnel() {
        let mut state = running_state();
        state.tunnel_url = Some("https://widgets.example.com".into());
        state.mark_stopped();
        assert_eq!(state.lifecycle, LifecycleState::Stopped);
        assert_eq!(state.container_status, ContainerStatus::Offline);
        assert!(state.tunnel_url.is_none());

        let mut failed = RepositoryState::new();
        failed.lifecycle = LifecycleState::Failed(Stage::Run);
        failed.mark_stopped();
        assert_eq!(failed.lifecycle, LifecycleState::Failed(Stage::Run));
    }

    #[test]
    fn test_delta_provides() {
        assert!(StateDelta::fetched("a").provides(Stage::Fetch));
        assert!(!StateDelta::fetched("a").provides(Stage::Build));
        assert!(StateDelta::exposed("https://x").provides(Stage::Expose));
    }

    #[test]
    fn test_delta_describe() {
        let state = running_state();
        assert_eq!(
            StateDelta::fetched("abc123").describe(Stage::Fetch, &state, 8080),
            "fetched abc123"
        );
        assert_eq!(
            StateDelta::started(ContainerStatus::Running).describe(Stage::Run, &state, 8080),
            "container running on port 8080"
        );
    }
}
