//! Container status and repository lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Stage;

/// Observed status of a repository's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    /// No container exists or it was stopped.
    #[default]
    Offline,
    /// The container was created but is not serving yet.
    Starting,
    /// The container is running.
    Running,
    /// The container exited unexpectedly.
    Crashed,
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "offline"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Crashed => write!(f, "crashed"),
        }
    }
}

impl ContainerStatus {
    /// Maps a container engine state string (`docker inspect .State.Status`).
    #[must_use]
    pub fn from_engine_state(state: &str) -> Self {
        match state.trim() {
            "running" => Self::Running,
            "created" | "restarting" => Self::Starting,
            "exited" | "dead" | "removing" | "paused" => Self::Crashed,
            _ => Self::Offline,
        }
    }
}

/// Lifecycle state of a repository.
///
/// The happy path is `New → Fetching → Fetched → Building → Built →
/// Starting → Running`. Each in-progress state may instead move to
/// `Failed(stage)`, from which a later run re-enters that stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum LifecycleState {
    /// Registered, never fetched.
    #[default]
    New,
    /// Fetch in progress.
    Fetching,
    /// Source checked out.
    Fetched,
    /// Build in progress.
    Building,
    /// Image built.
    Built,
    /// Container starting.
    Starting,
    /// Container running.
    Running,
    /// The named stage failed during the last run.
    Failed(Stage),
    /// The container exited after it was reported running.
    Crashed,
    /// The container was stopped on request.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Fetching => write!(f, "fetching"),
            Self::Fetched => write!(f, "fetched"),
            Self::Building => write!(f, "building"),
            Self::Built => write!(f, "built"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Failed(stage) => write!(f, "failed({stage})"),
            Self::Crashed => write!(f, "crashed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

impl LifecycleState {
    /// The in-progress state entered when `stage` starts executing.
    ///
    /// Expose has no lifecycle state of its own; the repository stays `Running`.
    #[must_use]
    pub const fn entering(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Fetch => Some(Self::Fetching),
            Stage::Build => Some(Self::Building),
            Stage::Run => Some(Self::Starting),
            Stage::Expose => None,
        }
    }

    /// The settled state reached when `stage` succeeds.
    #[must_use]
    pub const fn completed(stage: Stage) -> Option<Self> {
        match stage {
            Stage::Fetch => Some(Self::Fetched),
            Stage::Build => Some(Self::Built),
            Stage::Run => Some(Self::Running),
            Stage::Expose => None,
        }
    }

    /// The stage an in-progress state belongs to.
    #[must_use]
    pub const fn in_progress_stage(&self) -> Option<Stage> {
        match self {
            Self::Fetching => Some(Stage::Fetch),
            Self::Building => Some(Stage::Build),
            Self::Starting => Some(Stage::Run),
            _ => None,
        }
    }

    /// Returns true while a stage is executing.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(self, Self::Fetching | Self::Building | Self::Starting)
    }

    /// Returns true if the machine allows moving from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next && !self.is_in_progress() {
            return true;
        }
        match (self, next) {
            (Self::Fetching, Self::Fetched | Self::Failed(Stage::Fetch))
            | (Self::Building, Self::Built | Self::Failed(Stage::Build))
            | (Self::Starting, Self::Running | Self::Failed(Stage::Run)) => true,
            (Self::Fetching | Self::Building | Self::Starting, _) => false,
            (_, Self::Fetching | Self::Building | Self::Starting) => true,
            (Self::Running, Self::Crashed | Self::Stopped)
            | (Self::Crashed, Self::Running | Self::Stopped) => true,
            _ => false,
        }
    }
}

/// Error for a transition the lifecycle machine does not allow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal lifecycle transition {from} -> {to}")]
pub struct TransitionError {
    /// The current state.
    pub from: LifecycleState,
    /// The rejected target.
    pub to: LifecycleState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_status_display() {
        assert_eq!(ContainerStatus::Offline.to_string(), "offline");
        assert_eq!(ContainerStatus::Crashed.to_string(), "crashed");
        assert_eq!(ContainerStatus::default(), ContainerStatus::Offline);
    }

    #[test]
    fn test_container_status_from_engine_state() {
        assert_eq!(ContainerStatus::from_engine_state("running\n"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from_engine_state("created"), ContainerStatus::Starting);
        assert_eq!(ContainerStatus::from_engine_state("exited"), ContainerStatus::Crashed);
        assert_eq!(ContainerStatus::from_engine_state(""), ContainerStatus::Offline);
    }

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            LifecycleState::New,
            LifecycleState::Fetching,
            LifecycleState::Fetched,
            LifecycleState::Building,
            LifecycleState::Built,
            LifecycleState::Starting,
            LifecycleState::Running,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_in_progress_states_only_settle_on_their_own_stage() {
        assert!(LifecycleState::Building.can_transition_to(&LifecycleState::Failed(Stage::Build)));
        assert!(!LifecycleState::Building.can_transition_to(&LifecycleState::Failed(Stage::Fetch)));
        assert!(!LifecycleState::Fetching.can_transition_to(&LifecycleState::Running));
        assert!(!LifecycleState::Starting.can_transition_to(&LifecycleState::Starting));
    }

    #[test]
    fn test_failed_reenters_stage() {
        let failed = LifecycleState::Failed(Stage::Build);
        assert!(failed.can_transition_to(&LifecycleState::Building));
        assert!(failed.can_transition_to(&LifecycleState::Fetching));
        assert!(!failed.can_transition_to(&LifecycleState::Running));
    }

    #[test]
    fn test_in_progress_stage() {
        assert_eq!(LifecycleState::Building.in_progress_stage(), Some(Stage::Build));
        assert_eq!(LifecycleState::Built.in_progress_stage(), None);
    }

    #[test]
    fn test_running_side_transitions() {
        assert!(LifecycleState::Running.can_transition_to(&LifecycleState::Crashed));
        assert!(LifecycleState::Running.can_transition_to(&LifecycleState::Stopped));
        assert!(LifecycleState::Running.can_transition_to(&LifecycleState::Fetching));
        assert!(!LifecycleState::New.can_transition_to(&LifecycleState::Crashed));
        assert!(!LifecycleState::Stopped.can_transition_to(&LifecycleState::Crashed));
    }

    #[test]
    fn test_lifecycle_serde() {
        let json = serde_json::to_value(LifecycleState::Failed(Stage::Build)).unwrap();
        assert_eq!(json, serde_json::json!({"state": "failed", "stage": "build"}));
        let json = serde_json::to_value(LifecycleState::Running).unwrap();
        assert_eq!(json, serde_json::json!({"state": "running"}));
    }

    #[test]
    fn test_stage_lifecycle_mapping() {
        assert_eq!(LifecycleState::entering(Stage::Run), Some(LifecycleState::Starting));
        assert_eq!(LifecycleState::completed(Stage::Fetch), Some(LifecycleState::Fetched));
        assert_eq!(LifecycleState::entering(Stage::Expose), None);
    }
}
