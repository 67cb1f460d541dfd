//! Step executors: the four capabilities the engine sequences.
//!
//! Each executor talks to one external subsystem and reports a
//! [`StepOutcome`]. Executors must be safe to invoke again after a crash
//! mid-step; none may claim an artifact it has not verified.

mod docker;
mod git;
mod process;
#[cfg(feature = "cloudflare")]
mod cloudflare;

pub use docker::{DockerBuilder, DockerConfig, DockerRunner};
pub use git::{GitConfig, GitFetcher};
pub use process::{run_command, CommandOutput, CommandResult};
#[cfg(feature = "cloudflare")]
pub use cloudflare::{CloudflareConfig, CloudflareTunnel, CloudflareZones};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::cancellation::CancellationToken;
use crate::core::{ContainerStatus, ProgressEvent, Stage};
use crate::progress::ProgressChannel;
use crate::repository::{RepositoryConfig, RepositoryKey, RepositoryState, StateDelta};

/// Category of an executor failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorErrorKind {
    /// Credential missing or rejected.
    Auth,
    /// Transient network failure.
    Network,
    /// A command exited unsuccessfully.
    Command,
    /// The host port belongs to another repository.
    PortConflict,
    /// The provider throttled the request.
    RateLimited,
    /// The run was cancelled while the step was executing.
    Cancelled,
    /// Anything else.
    Internal,
}

impl fmt::Display for ExecutorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Auth => "auth",
            Self::Network => "network",
            Self::Command => "command",
            Self::PortConflict => "port_conflict",
            Self::RateLimited => "rate_limited",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Error detail carried by a failed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ExecutorError {
    /// Failure category.
    pub kind: ExecutorErrorKind,
    /// Message shown verbatim to observers.
    pub message: String,
}

impl ExecutorError {
    /// Creates an error.
    #[must_use]
    pub fn new(kind: ExecutorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// An authentication failure.
    #[must_use]
    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Auth, message)
    }

    /// A transient network failure.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Network, message)
    }

    /// A failed command.
    #[must_use]
    pub fn command(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Command, message)
    }

    /// A cancelled step.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::new(ExecutorErrorKind::Cancelled, "cancelled")
    }

    /// An internal failure.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ExecutorErrorKind::Internal, message)
    }
}

impl From<anyhow::Error> for ExecutorError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(format!("{err:#}"))
    }
}

/// Result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step succeeded; merge the delta into the repository state.
    Success(StateDelta),
    /// A transient failure; the engine may retry with backoff.
    Retryable(ExecutorError),
    /// A permanent failure; the run ends.
    Fatal(ExecutorError),
}

impl StepOutcome {
    /// Returns true for [`StepOutcome::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Everything an executor may read while performing a step.
pub struct StepContext<'a> {
    /// The stage being executed.
    pub stage: Stage,
    /// Repository key.
    pub key: &'a RepositoryKey,
    /// Declared configuration.
    pub config: &'a RepositoryConfig,
    /// State before the step.
    pub state: &'a RepositoryState,
    /// 1-based attempt number.
    pub attempt: u32,
    /// Cancellation token of the run.
    pub cancel: &'a CancellationToken,
    progress: Option<&'a ProgressChannel>,
}

impl<'a> StepContext<'a> {
    /// Creates a context.
    #[must_use]
    pub fn new(
        stage: Stage,
        key: &'a RepositoryKey,
        config: &'a RepositoryConfig,
        state: &'a RepositoryState,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            stage,
            key,
            config,
            state,
            attempt: 1,
            cancel,
            progress: None,
        }
    }

    /// Routes [`info`](Self::info) and [`warn`](Self::warn) to a progress channel.
    #[must_use]
    pub fn with_progress(mut self, progress: &'a ProgressChannel) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Sets the attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Publishes an `info` line for this stage.
    pub fn info(&self, message: impl Into<String>) {
        if let Some(progress) = self.progress {
            progress.publish(ProgressEvent::info(self.stage, message));
        }
    }

    /// Publishes a `warn` line for this stage.
    pub fn warn(&self, message: impl Into<String>) {
        if let Some(progress) = self.progress {
            progress.publish(ProgressEvent::warn(self.stage, message));
        }
    }
}

impl fmt::Debug for StepContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext")
            .field("stage", &self.stage)
            .field("key", &self.key)
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// One pipeline capability.
#[async_trait]
pub trait StepExecutor: Send + Sync + fmt::Debug {
    /// The stage this executor performs.
    fn stage(&self) -> Stage;

    /// Performs the step.
    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome;
}

/// Out-of-band access to a repository's container.
#[async_trait]
pub trait ContainerControl: Send + Sync + fmt::Debug {
    /// Inspects the container's current status.
    async fn status(&self, key: &RepositoryKey) -> Result<ContainerStatus, ExecutorError>;

    /// Stops and removes the container. Succeeds if none exists.
    async fn stop(&self, key: &RepositoryKey) -> Result<(), ExecutorError>;
}

/// The executors an engine sequences.
#[derive(Debug, Clone)]
pub struct StepExecutors {
    /// `FetchSource`.
    pub fetch: Arc<dyn StepExecutor>,
    /// `BuildImage`.
    pub build: Arc<dyn StepExecutor>,
    /// `RunContainer`.
    pub run: Arc<dyn StepExecutor>,
    /// `ExposeTunnel`; runs requesting exposure fail without it.
    pub expose: Option<Arc<dyn StepExecutor>>,
}

impl StepExecutors {
    /// Groups the three mandatory executors.
    #[must_use]
    pub fn new(
        fetch: Arc<dyn StepExecutor>,
        build: Arc<dyn StepExecutor>,
        run: Arc<dyn StepExecutor>,
    ) -> Self {
        Self {
            fetch,
            build,
            run,
            expose: None,
        }
    }

    /// Adds the tunnel executor.
    #[must_use]
    pub fn with_expose(mut self, expose: Arc<dyn StepExecutor>) -> Self {
        self.expose = Some(expose);
        self
    }

    /// Returns the executor for `stage`.
    #[must_use]
    pub fn for_stage(&self, stage: Stage) -> Option<&Arc<dyn StepExecutor>> {
        match stage {
            Stage::Fetch => Some(&self.fetch),
            Stage::Build => Some(&self.build),
            Stage::Run => Some(&self.run),
            Stage::Expose => self.expose.as_ref(),
        }
    }
}
