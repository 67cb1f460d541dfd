//! Mock executors, container control and store.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

use crate::core::{ContainerStatus, Stage};
use crate::executors::{ContainerControl, ExecutorError, StepContext, StepExecutor, StepOutcome};
use crate::repository::{RepositoryKey, StateDelta};
use crate::store::{InMemoryRecordStore, RecordStore, RepositoryRecord, StoreError};

/// Holds executors at their entry until a test releases them.
#[derive(Debug)]
pub struct Gate {
    permits: Semaphore,
    entered: Notify,
}

impl Gate {
    /// Creates a closed gate.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            permits: Semaphore::new(0),
            entered: Notify::new(),
        })
    }

    /// Lets one held invocation through.
    pub fn release(&self) {
        self.permits.add_permits(1);
    }

    /// Completes once an invocation has reached the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Waits for a permit. Returns false if the run was cancelled first.
    async fn pass(&self, ctx: &StepContext<'_>) -> bool {
        self.entered.notify_one();
        match ctx.cancel.run_until_cancelled(self.permits.acquire()).await {
            Some(Ok(permit)) => {
                permit.forget();
                true
            }
            Some(Err(_)) => true,
            None => false,
        }
    }
}

#[derive(Debug)]
enum Scripted {
    Outcome(StepOutcome),
    Panic(String),
}

/// An executor replaying a script of outcomes, then a fallback.
#[derive(Debug)]
pub struct ScriptedExecutor {
    stage: Stage,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<StepOutcome>,
    calls: AtomicUsize,
    attempts: Mutex<Vec<u32>>,
    gate: Option<Arc<Gate>>,
}

impl ScriptedExecutor {
    /// An executor that always succeeds with a canned result for `stage`.
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        let delta = match stage {
            Stage::Fetch => StateDelta::fetched("abc123"),
            Stage::Build => StateDelta::built("sha256:feed"),
            Stage::Run => StateDelta::started(ContainerStatus::Running),
            Stage::Expose => StateDelta::exposed("https://acme-widgets-main.example.com"),
        };
        Self {
            stage,
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(StepOutcome::Success(delta)),
            calls: AtomicUsize::new(0),
            attempts: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Queues an outcome for the next unscripted invocation.
    #[must_use]
    pub fn then(self, outcome: StepOutcome) -> Self {
        self.push(outcome);
        self
    }

    /// Queues a panic.
    #[must_use]
    pub fn then_panic(self, message: impl Into<String>) -> Self {
        self.script.lock().push_back(Scripted::Panic(message.into()));
        self
    }

    /// Holds every invocation at `gate`.
    #[must_use]
    pub fn with_gate(mut self, gate: Arc<Gate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Queues an outcome on a shared executor.
    pub fn push(&self, outcome: StepOutcome) {
        self.script.lock().push_back(Scripted::Outcome(outcome));
    }

    /// Replaces the outcome returned once the script is exhausted.
    pub fn set_fallback(&self, outcome: StepOutcome) {
        *self.fallback.lock() = outcome;
    }

    /// Number of invocations.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Attempt numbers seen, one per invocation.
    #[must_use]
    pub fn attempts_seen(&self) -> Vec<u32> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl StepExecutor for ScriptedExecutor {
    fn stage(&self) -> Stage {
        self.stage
    }

    async fn execute(&self, ctx: &StepContext<'_>) -> StepOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().push(ctx.attempt);

        if let Some(gate) = &self.gate {
            if !gate.pass(ctx).await {
                return StepOutcome::Fatal(ExecutorError::cancelled());
            }
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(Scripted::Outcome(outcome)) => outcome,
            Some(Scripted::Panic(message)) => panic!("{message}"),
            None => self.fallback.lock().clone(),
        }
    }
}

/// Container control answering a configurable status and counting stops.
#[derive(Debug)]
pub struct RecordingContainerControl {
    status: Mutex<Result<ContainerStatus, ExecutorError>>,
    stops: AtomicUsize,
}

impl Default for RecordingContainerControl {
    fn default() -> Self {
        Self {
            status: Mutex::new(Ok(ContainerStatus::Running)),
            stops: AtomicUsize::new(0),
        }
    }
}

impl RecordingContainerControl {
    /// A control reporting running containers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the probe answer.
    pub fn set_status(&self, status: Result<ContainerStatus, ExecutorError>) {
        *self.status.lock() = status;
    }

    /// Number of stop requests.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContainerControl for RecordingContainerControl {
    async fn status(&self, _key: &RepositoryKey) -> Result<ContainerStatus, ExecutorError> {
        self.status.lock().clone()
    }

    async fn stop(&self, _key: &RepositoryKey) -> Result<(), ExecutorError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory store whose writes fail once armed.
#[derive(Debug, Default)]
pub struct FailingRecordStore {
    inner: InMemoryRecordStore,
    fail_puts: AtomicBool,
}

impl FailingRecordStore {
    /// Creates a healthy store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for FailingRecordStore {
    async fn get(&self, key: &RepositoryKey) -> Result<Option<RepositoryRecord>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &RepositoryKey, record: RepositoryRecord) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("disk full".into()));
        }
        self.inner.put(key, record).await
    }

    async fn delete(&self, key: &RepositoryKey) -> Result<bool, StoreError> {
        self.inner.delete(key).await
    }

    async fn list(&self) -> Result<Vec<RepositoryRecord>, StoreError> {
        self.inner.list().await
    }
}
