//! Run bookkeeping: step records, outcomes and summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{RunId, Stage};
use crate::repository::{RepositoryKey, RepositoryState};

/// What happened to one stage within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The executor ran and succeeded.
    Executed,
    /// The stage's success condition already held.
    Skipped,
    /// The executor reported a fatal outcome or exhausted its retries.
    Failed,
    /// The run was cancelled while the stage was executing.
    Cancelled,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed => write!(f, "executed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Record of one stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// The stage.
    pub stage: Stage,
    /// What happened.
    pub status: StepStatus,
    /// Executor invocations, including retries.
    pub attempts: u32,
    /// Wall time spent in the stage.
    pub duration_ms: u64,
    /// Result or error detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepRecord {
    /// Records a skipped stage.
    #[must_use]
    pub fn skipped(stage: Stage) -> Self {
        Self {
            stage,
            status: StepStatus::Skipped,
            attempts: 0,
            duration_ms: 0,
            detail: None,
        }
    }
}

/// Terminal outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every requested stage executed or was skipped.
    Completed,
    /// A stage failed; later stages were not attempted.
    Failed {
        /// The failing stage, or `None` for run-level failures such as store errors.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stage: Option<Stage>,
        /// Error detail.
        cause: String,
    },
    /// The run was cancelled.
    Cancelled {
        /// Cancellation reason.
        reason: String,
    },
}

impl RunOutcome {
    /// Returns true for a completed run.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Summary attached to a run's `close` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// The run.
    pub run_id: RunId,
    /// The repository.
    pub repository: RepositoryKey,
    /// Terminal outcome.
    pub outcome: RunOutcome,
    /// Stage records in execution order.
    pub steps: Vec<StepRecord>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run reached its terminal state.
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Number of stages whose executor actually ran.
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.status != StepStatus::Skipped).count()
    }

    /// One-line human readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        let steps = self
            .steps
            .iter()
            .map(|s| format!("{} {}", s.stage, s.status))
            .collect::<Vec<_>>()
            .join(", ");
        let head = match &self.outcome {
            RunOutcome::Completed => "run completed".to_string(),
            RunOutcome::Failed { stage: Some(stage), .. } => format!("run failed at {stage}"),
            RunOutcome::Failed { stage: None, .. } => "run failed".to_string(),
            RunOutcome::Cancelled { reason } => format!("run cancelled ({reason})"),
        };
        if steps.is_empty() {
            head
        } else {
            format!("{head}: {steps}")
        }
    }
}

/// Point-in-time view of a run handed to late subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// The stage currently executing, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_stage: Option<Stage>,
    /// Stages finished so far.
    pub steps: Vec<StepRecord>,
    /// Repository state as of the last persisted write.
    pub state: RepositoryState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcome: RunOutcome, steps: Vec<StepRecord>) -> RunSummary {
        RunSummary {
            run_id: RunId::new(1),
            repository: RepositoryKey::new("acme", "widgets", "main"),
            outcome,
            steps,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        }
    }

    #[test]
    fn test_describe_completed() {
        let s = summary(
            RunOutcome::Completed,
            vec![StepRecord::skipped(Stage::Fetch), StepRecord::skipped(Stage::Build)],
        );
        assert_eq!(s.describe(), "run completed: fetch skipped, build skipped");
        assert_eq!(s.executed_count(), 0);
    }

    #[test]
    fn test_describe_failed() {
        let s = summary(
            RunOutcome::Failed {
                stage: Some(Stage::Build),
                cause: "build command failed".into(),
            },
            vec![],
        );
        assert_eq!(s.describe(), "run failed at build");
    }

    #[test]
    fn test_outcome_serde() {
        let json = serde_json::to_value(RunOutcome::Cancelled { reason: "user".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "cancelled", "reason": "user"}));

        let json = serde_json::to_value(RunOutcome::Failed { stage: None, cause: "store".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"status": "failed", "cause": "store"}));
    }
}
