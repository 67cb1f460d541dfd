//! The pipeline engine.
//!
//! `start_run` validates and registers a run, then drives the stages on a
//! spawned task. Everything that happens after registration is reported
//! through the run's progress channel and the stored repository state.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::registry::{ActiveRun, RunRegistry};
use super::retry::{backoff, should_retry, RetryDecision, RetryState};
use super::{RetryConfig, RunOptions, RunRequest, RunResponse};
use crate::cancellation::CancellationToken;
use crate::config::EngineConfig;
use crate::core::{
    ContainerStatus, EventStage, LifecycleState, MonotonicCounter, ProgressEvent, RunId, RunOutcome,
    RunSnapshot, RunSummary, Stage, StepRecord, StepStatus,
};
use crate::errors::{LaunchpadError, Result, StageFailure, ValidationError};
use crate::executors::{
    ContainerControl, ExecutorError, ExecutorErrorKind, StepContext, StepExecutor, StepExecutors, StepOutcome,
};
use crate::progress::{ProgressChannel, ProgressHub, Subscription};
use crate::repository::{RepositoryConfig, RepositoryKey, RepositoryState};
use crate::store::{RecordStore, RepositoryRecord};

/// Handle returned by [`Engine::start_run`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// The run.
    pub run_id: RunId,
    /// The repository.
    pub key: RepositoryKey,
    channel: Arc<ProgressChannel>,
}

impl RunHandle {
    /// Subscribes to the run from its first event.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.channel.subscribe()
    }
}

/// Builder for [`Engine`].
#[derive(Debug)]
pub struct EngineBuilder {
    store: Arc<dyn RecordStore>,
    executors: StepExecutors,
    control: Option<Arc<dyn ContainerControl>>,
    config: EngineConfig,
}

impl EngineBuilder {
    /// Sets the container probe used by stop and refresh.
    #[must_use]
    pub fn with_container_control(mut self, control: Arc<dyn ContainerControl>) -> Self {
        self.control = Some(control);
        self
    }

    /// Sets the engine configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> Engine {
        let hub = ProgressHub::new(self.config.channel_config(), self.config.grace());
        Engine {
            inner: Arc::new(EngineInner {
                store: self.store,
                executors: self.executors,
                control: self.control,
                hub,
                registry: RunRegistry::new(),
                run_ids: MonotonicCounter::new(),
                config: self.config,
            }),
        }
    }
}

/// Deployment orchestrator: admits runs and sequences their stages.
#[derive(Debug, Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

#[derive(Debug)]
struct EngineInner {
    store: Arc<dyn RecordStore>,
    executors: StepExecutors,
    control: Option<Arc<dyn ContainerControl>>,
    hub: ProgressHub,
    registry: RunRegistry,
    run_ids: MonotonicCounter,
    config: EngineConfig,
}

impl Engine {
    /// Starts building an engine over a store and the step executors.
    #[must_use]
    pub fn builder(store: Arc<dyn RecordStore>, executors: StepExecutors) -> EngineBuilder {
        EngineBuilder {
            store,
            executors,
            control: None,
            config: EngineConfig::default(),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Validates and registers a run, then executes it in the background.
    ///
    /// Returns as soon as the run is registered and its channel is open.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key, `Validation` for an invalid stored
    /// configuration, `AlreadyRunning` if the key has an active run.
    #[instrument(skip(self, options), fields(repository = %key))]
    pub async fn start_run(&self, key: &RepositoryKey, options: RunOptions) -> Result<RunHandle> {
        let inner = &self.inner;
        let guard = inner.registry.lock_key(key).await;

        let record = inner
            .store
            .get(key)
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("repository {key}")))?;
        record.config.validate()?;
        if options.wants_expose() && inner.executors.expose.is_none() {
            return Err(ValidationError::new("expose", "no tunnel executor is configured").into());
        }

        let run_id = inner.run_ids.next_run_id();
        let run = inner.registry.register(key, || ActiveRun {
            run_id,
            key: key.clone(),
            cancel: Arc::new(CancellationToken::new()),
            channel: inner.hub.open(run_id),
            started_at: Utc::now(),
        })?;
        drop(guard);

        run.channel.update_snapshot(RunSnapshot {
            current_stage: None,
            steps: Vec::new(),
            state: record.state.clone(),
        });
        info!(run_id = %run_id, force = ?options.force_stages, expose = options.wants_expose(), "Run started");

        let handle = RunHandle {
            run_id,
            key: key.clone(),
            channel: run.channel.clone(),
        };
        tokio::spawn(self.inner.clone().execute_run(run, record, options));
        Ok(handle)
    }

    /// Trigger-run entry point for request/response front ends.
    ///
    /// # Errors
    ///
    /// As [`start_run`](Self::start_run), plus `Validation` for a malformed key.
    pub async fn trigger(&self, request: RunRequest) -> Result<RunResponse> {
        let (key, options) = request.into_parts()?;
        let handle = self.start_run(&key, options).await?;
        Ok(RunResponse { run_id: handle.run_id })
    }

    /// Requests cooperative cancellation of an active run.
    ///
    /// # Errors
    ///
    /// `NotFound` unless the run is active.
    #[instrument(skip(self))]
    pub fn cancel_run(&self, run_id: RunId) -> Result<()> {
        let run = self
            .inner
            .registry
            .by_run(run_id)
            .ok_or_else(|| LaunchpadError::NotFound(format!("active run {run_id}")))?;
        if run.cancel.cancel("cancelled by request") {
            info!(repository = %run.key, "Cancellation requested");
        }
        Ok(())
    }

    /// Subscribes to a run's progress from its retained buffer.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run is unknown or its grace period has passed.
    pub fn subscribe(&self, run_id: RunId) -> Result<Subscription> {
        self.inner.hub.subscribe(run_id)
    }

    /// Resumes a subscription after the last sequence an observer saw.
    ///
    /// # Errors
    ///
    /// `NotFound` if the run is unknown or its grace period has passed.
    pub fn subscribe_after(&self, run_id: RunId, last_sequence: Option<u64>) -> Result<Subscription> {
        self.inner.hub.subscribe_after(run_id, last_sequence)
    }

    /// The active run of a repository, if any.
    #[must_use]
    pub fn active_run(&self, key: &RepositoryKey) -> Option<RunId> {
        self.inner.registry.by_key(key).map(|run| run.run_id)
    }

    /// Validates and upserts a configuration, keeping any existing state.
    ///
    /// # Errors
    ///
    /// `Validation` for an invalid configuration, `Conflict` while a run is
    /// active for the key or when the key belongs to another identity.
    #[instrument(skip(self, config), fields(repository = %config.key()))]
    pub async fn register_repository(&self, config: RepositoryConfig) -> Result<RepositoryRecord> {
        config.validate()?;
        let key = config.key();
        let _guard = self.inner.registry.lock_key(&key).await;
        self.ensure_idle(&key)?;

        let record = match self.inner.store.get(&key).await? {
            Some(existing) if !existing.config.same_identity(&config) => {
                return Err(LaunchpadError::Conflict(format!(
                    "key {key} is already registered to {}/{}@{}",
                    existing.config.owner, existing.config.name, existing.config.branch
                )));
            }
            Some(existing) => RepositoryRecord {
                config,
                state: existing.state,
            },
            None => RepositoryRecord::new(config),
        };
        self.inner.store.put(&key, record.clone()).await?;
        info!("Repository registered");
        Ok(record)
    }

    /// All records, sorted by key.
    ///
    /// # Errors
    ///
    /// `Store` if the record store fails.
    pub async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        Ok(self.inner.store.list().await?)
    }

    /// The stored record of a repository.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key.
    pub async fn repository(&self, key: &RepositoryKey) -> Result<RepositoryRecord> {
        self.inner
            .store
            .get(key)
            .await?
            .ok_or_else(|| LaunchpadError::NotFound(format!("repository {key}")))
    }

    /// A side-effect-free snapshot of a repository's state.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key.
    pub async fn repository_state(&self, key: &RepositoryKey) -> Result<RepositoryState> {
        Ok(self.repository(key).await?.state)
    }

    /// Records a container status reported from outside a run.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key, `Conflict` while a run is active or if
    /// the status is impossible in the current lifecycle state.
    #[instrument(skip(self), fields(repository = %key))]
    pub async fn report_container_status(&self, key: &RepositoryKey, status: ContainerStatus) -> Result<RepositoryState> {
        let _guard = self.inner.registry.lock_key(key).await;
        self.ensure_idle(key)?;
        self.observe(key, status).await
    }

    /// Probes the container and records its status.
    ///
    /// # Errors
    ///
    /// As [`report_container_status`](Self::report_container_status), plus
    /// `StageFailure` if the probe fails.
    #[instrument(skip(self), fields(repository = %key))]
    pub async fn refresh_container_status(&self, key: &RepositoryKey) -> Result<RepositoryState> {
        let control = self.control()?;
        let _guard = self.inner.registry.lock_key(key).await;
        self.ensure_idle(key)?;
        self.repository(key).await?;

        let status = control
            .status(key)
            .await
            .map_err(|err| StageFailure::new(Stage::Run, err.message))?;
        debug!(status = %status, "Probed container");
        self.observe(key, status).await
    }

    /// Stops the container and marks the repository stopped.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key, `Conflict` while a run is active,
    /// `StageFailure` if the container cannot be stopped.
    #[instrument(skip(self), fields(repository = %key))]
    pub async fn stop_repository(&self, key: &RepositoryKey) -> Result<RepositoryState> {
        let control = self.control()?;
        let _guard = self.inner.registry.lock_key(key).await;
        self.ensure_idle(key)?;
        let mut record = self.repository(key).await?;

        control
            .stop(key)
            .await
            .map_err(|err| StageFailure::new(Stage::Run, err.message))?;
        record.state.mark_stopped();
        self.inner.store.put(key, record.clone()).await?;
        info!("Repository stopped");
        Ok(record.state)
    }

    /// Removes a repository record.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown key, `Conflict` while a run is active or the
    /// container is still running.
    #[instrument(skip(self), fields(repository = %key))]
    pub async fn delete_repository(&self, key: &RepositoryKey) -> Result<RepositoryRecord> {
        let _guard = self.inner.registry.lock_key(key).await;
        self.ensure_idle(key)?;
        let record = self.repository(key).await?;
        if record.state.running {
            return Err(LaunchpadError::Conflict(format!(
                "repository {key} has a {} container; stop it first",
                record.state.container_status
            )));
        }

        self.inner.store.delete(key).await?;
        info!("Repository deleted");
        Ok(record)
    }

    #[cfg(test)]
    pub(crate) fn registry(&self) -> &RunRegistry {
        &self.inner.registry
    }

    fn ensure_idle(&self, key: &RepositoryKey) -> Result<()> {
        match self.inner.registry.by_key(key) {
            Some(run) => Err(LaunchpadError::Conflict(format!(
                "repository {key} has an active run ({})",
                run.run_id
            ))),
            None => Ok(()),
        }
    }

    fn control(&self) -> Result<Arc<dyn ContainerControl>> {
        self.inner
            .control
            .clone()
            .ok_or_else(|| LaunchpadError::Conflict("no container control is configured".to_string()))
    }

    async fn observe(&self, key: &RepositoryKey, status: ContainerStatus) -> Result<RepositoryState> {
        let mut record = self.repository(key).await?;
        let before = record.state.lifecycle;
        record
            .state
            .observe_container(status)
            .map_err(|err| LaunchpadError::Conflict(err.to_string()))?;
        self.inner.store.put(key, record.clone()).await?;
        if record.state.lifecycle != before {
            info!(from = %before, to = %record.state.lifecycle, status = %status, "Container status changed lifecycle");
        }
        Ok(record.state)
    }
}

/// How one stage ended.
enum StageEnd {
    Succeeded { changed: bool },
    Failed(ExecutorError),
    Cancelled,
    Store(LaunchpadError),
}

/// Mutable bookkeeping of one executing run.
struct RunProgress {
    key: RepositoryKey,
    config: RepositoryConfig,
    state: RepositoryState,
    steps: Vec<StepRecord>,
    current_stage: Option<Stage>,
}

impl RunProgress {
    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            current_stage: self.current_stage,
            steps: self.steps.clone(),
            state: self.state.clone(),
        }
    }

    fn record(&mut self, stage: Stage, status: StepStatus, attempts: u32, started: Instant, detail: Option<String>) {
        self.steps.push(StepRecord {
            stage,
            status,
            attempts,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            detail,
        });
    }
}

impl EngineInner {
    async fn execute_run(self: Arc<Self>, run: ActiveRun, record: RepositoryRecord, options: RunOptions) {
        let retry = options.retry.clone().unwrap_or_else(|| self.config.retry.clone());
        let mut progress = RunProgress {
            key: run.key.clone(),
            config: record.config,
            state: record.state,
            steps: Vec::new(),
            current_stage: None,
        };

        let outcome = self.drive(&run, &mut progress, &options, &retry).await;
        progress.current_stage = None;
        run.channel.update_snapshot(progress.snapshot());

        let close_stage = match &outcome {
            RunOutcome::Cancelled { .. } => EventStage::Cancelled,
            _ => EventStage::Pipeline,
        };
        let summary = RunSummary {
            run_id: run.run_id,
            repository: run.key.clone(),
            outcome,
            steps: progress.steps,
            started_at: run.started_at,
            finished_at: Utc::now(),
        };
        match &summary.outcome {
            RunOutcome::Completed => {
                info!(run_id = %run.run_id, repository = %run.key, executed = summary.executed_count(), "Run completed");
            }
            RunOutcome::Failed { stage, cause } => {
                warn!(run_id = %run.run_id, repository = %run.key, stage = ?stage, cause = %cause, "Run failed");
            }
            RunOutcome::Cancelled { reason } => {
                info!(run_id = %run.run_id, repository = %run.key, reason = %reason, "Run cancelled");
            }
        }

        // State is already persisted; an observer seeing close may start a new run.
        self.registry.deregister(&run.key, run.run_id);
        run.channel.publish(ProgressEvent::close(close_stage, summary));
    }

    async fn drive(
        &self,
        run: &ActiveRun,
        progress: &mut RunProgress,
        options: &RunOptions,
        retry: &RetryConfig,
    ) -> RunOutcome {
        // A stage left in progress by an interrupted process counts as failed.
        if let Some(stage) = progress.state.lifecycle.in_progress_stage() {
            warn!(repository = %progress.key, stage = %stage, "Recovering interrupted stage");
            if let Err(err) = progress.state.transition(LifecycleState::Failed(stage)) {
                error!(error = %err, "Cannot recover interrupted stage");
            }
        }

        // Stages at or after this one execute regardless of their condition.
        let mut redo_from = options.earliest_forced();
        if let LifecycleState::Failed(stage) = progress.state.lifecycle {
            redo_from = Some(redo_from.map_or(stage, |forced| forced.min(stage)));
        }

        for stage in Stage::ALL {
            if stage == Stage::Expose && !options.wants_expose() {
                break;
            }
            if run.cancel.is_cancelled() {
                return cancelled_outcome(&run.cancel);
            }

            let forced = redo_from.is_some_and(|from| stage >= from);
            if !forced && progress.state.satisfies(stage) {
                debug!(run_id = %run.run_id, stage = %stage, "Stage already satisfied");
                progress.steps.push(StepRecord::skipped(stage));
                continue;
            }

            let Some(executor) = self.executors.for_stage(stage).cloned() else {
                let cause = format!("no executor configured for {stage}");
                progress.steps.push(StepRecord {
                    stage,
                    status: StepStatus::Failed,
                    attempts: 0,
                    duration_ms: 0,
                    detail: Some(cause.clone()),
                });
                run.channel.publish(ProgressEvent::fatal(stage, cause.clone()));
                return RunOutcome::Failed { stage: Some(stage), cause };
            };

            match self.run_stage(run, progress, stage, executor.as_ref(), retry).await {
                StageEnd::Succeeded { changed } => {
                    // A new artifact invalidates everything built on the old one.
                    if let Some(next) = next_stage(stage).filter(|_| changed) {
                        redo_from = Some(redo_from.map_or(next, |from| from.min(next)));
                    }
                }
                StageEnd::Failed(err) => {
                    return RunOutcome::Failed {
                        stage: Some(stage),
                        cause: err.message,
                    };
                }
                StageEnd::Cancelled => return cancelled_outcome(&run.cancel),
                StageEnd::Store(err) => {
                    let cause = err.to_string();
                    error!(repository = %progress.key, error = %cause, "Record store failed during run");
                    run.channel.publish(ProgressEvent::fatal(EventStage::Pipeline, cause.clone()));
                    return RunOutcome::Failed { stage: None, cause };
                }
            }
        }

        RunOutcome::Completed
    }

    /// Executes one stage with retries and records its result.
    async fn run_stage(
        &self,
        run: &ActiveRun,
        progress: &mut RunProgress,
        stage: Stage,
        executor: &dyn StepExecutor,
        retry: &RetryConfig,
    ) -> StageEnd {
        let before = progress.state.clone();
        let started = Instant::now();
        progress.current_stage = Some(stage);

        if let Some(entering) = LifecycleState::entering(stage) {
            if let Err(err) = progress.state.transition(entering) {
                let err = ExecutorError::internal(err.to_string());
                return self.fail_stage(run, progress, stage, 0, started, err).await;
            }
        }
        if let Err(err) = self.persist(progress).await {
            progress.state = before;
            return StageEnd::Store(err);
        }
        run.channel.update_snapshot(progress.snapshot());

        if stage == Stage::Run {
            match self.port_owner(progress).await {
                Ok(Some(owner)) => {
                    let err = ExecutorError::new(
                        ExecutorErrorKind::PortConflict,
                        format!("host port {} is already used by {owner}", progress.config.ports.host),
                    );
                    return self.fail_stage(run, progress, stage, 0, started, err).await;
                }
                Ok(None) => {}
                Err(err) => return StageEnd::Store(err),
            }
        }

        let mut retry_state = RetryState::new();
        let mut attempts = 0;
        let result = loop {
            attempts += 1;
            let outcome = {
                let ctx = StepContext::new(stage, &progress.key, &progress.config, &progress.state, &run.cancel)
                    .with_progress(&run.channel)
                    .with_attempt(retry_state.next_attempt());
                AssertUnwindSafe(executor.execute(&ctx))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        StepOutcome::Fatal(ExecutorError::internal(format!(
                            "{stage} executor panicked: {}",
                            panic_message(panic.as_ref())
                        )))
                    })
            };

            // The in-flight outcome is discarded once the run is cancelled.
            if run.cancel.is_cancelled() {
                break None;
            }

            match outcome {
                StepOutcome::Success(delta) if delta.provides(stage) => break Some(Ok(delta)),
                StepOutcome::Success(_) => {
                    break Some(Err(ExecutorError::internal(format!(
                        "{stage} executor reported success without a result"
                    ))));
                }
                StepOutcome::Fatal(err) => break Some(Err(err)),
                StepOutcome::Retryable(err) => match should_retry(&mut retry_state, retry) {
                    RetryDecision::Retry(delay) => {
                        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                        warn!(
                            repository = %progress.key,
                            stage = %stage,
                            attempt = attempts,
                            delay_ms,
                            error = %err,
                            "Retrying stage"
                        );
                        run.channel.publish(ProgressEvent::warn(
                            stage,
                            format!(
                                "{}; retrying in {delay_ms} ms (attempt {} of {})",
                                err.message,
                                retry_state.next_attempt(),
                                retry.max_attempts
                            ),
                        ));
                        if !backoff(delay, &run.cancel).await {
                            break None;
                        }
                    }
                    RetryDecision::GiveUp => break Some(Err(err)),
                },
            }
        };

        match result {
            None => {
                progress.state = before;
                if stage == Stage::Run {
                    // The runner may already have removed the previous container.
                    progress.state.mark_stopped();
                }
                if let Err(err) = self.persist(progress).await {
                    error!(repository = %progress.key, error = %err, "Failed to restore state after cancellation");
                }
                progress.record(stage, StepStatus::Cancelled, attempts, started, None);
                StageEnd::Cancelled
            }
            Some(Err(err)) => self.fail_stage(run, progress, stage, attempts, started, err).await,
            Some(Ok(delta)) => {
                let changed = progress.state.apply(&delta);
                if stage == Stage::Run && progress.state.container_status == ContainerStatus::Crashed {
                    let err = ExecutorError::command("container exited immediately");
                    return self.fail_stage(run, progress, stage, attempts, started, err).await;
                }
                if let Some(completed) = LifecycleState::completed(stage) {
                    if let Err(err) = progress.state.transition(completed) {
                        let err = ExecutorError::internal(err.to_string());
                        return self.fail_stage(run, progress, stage, attempts, started, err).await;
                    }
                }
                if let Err(err) = self.persist(progress).await {
                    return StageEnd::Store(err);
                }

                let message = delta.describe(stage, &progress.state, progress.config.ports.host);
                run.channel.publish(ProgressEvent::info(stage, message.clone()));
                progress.record(stage, StepStatus::Executed, attempts, started, Some(message));
                run.channel.update_snapshot(progress.snapshot());
                StageEnd::Succeeded { changed }
            }
        }
    }

    async fn fail_stage(
        &self,
        run: &ActiveRun,
        progress: &mut RunProgress,
        stage: Stage,
        attempts: u32,
        started: Instant,
        err: ExecutorError,
    ) -> StageEnd {
        // Expose has no lifecycle state; a failed exposure leaves the repository running.
        if LifecycleState::entering(stage).is_some() {
            if let Err(transition) = progress.state.transition(LifecycleState::Failed(stage)) {
                error!(error = %transition, "Cannot record stage failure in lifecycle");
            }
        }
        if let Err(store) = self.persist(progress).await {
            return StageEnd::Store(store);
        }

        run.channel.publish(ProgressEvent::fatal(stage, err.message.clone()));
        progress.record(stage, StepStatus::Failed, attempts, started, Some(err.message.clone()));
        run.channel.update_snapshot(progress.snapshot());
        StageEnd::Failed(err)
    }

    async fn persist(&self, progress: &RunProgress) -> Result<()> {
        let record = RepositoryRecord {
            config: progress.config.clone(),
            state: progress.state.clone(),
        };
        self.store.put(&progress.key, record).await?;
        Ok(())
    }

    /// Another repository whose running container publishes our host port.
    async fn port_owner(&self, progress: &RunProgress) -> Result<Option<RepositoryKey>> {
        let host_port = progress.config.ports.host;
        Ok(self
            .store
            .list()
            .await?
            .into_iter()
            .find(|record| {
                record.state.running && record.config.ports.host == host_port && record.key() != progress.key
            })
            .map(|record| record.key()))
    }
}

fn next_stage(stage: Stage) -> Option<Stage> {
    Stage::ALL.get(stage.index() + 1).copied()
}

fn cancelled_outcome(cancel: &CancellationToken) -> RunOutcome {
    RunOutcome::Cancelled {
        reason: cancel.reason().unwrap_or_else(|| "cancelled".to_string()),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
