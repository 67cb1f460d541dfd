//! Fixtures for engine tests.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

use super::mocks::ScriptedExecutor;
use crate::config::EngineConfig;
use crate::core::{ContainerStatus, LifecycleState, ProgressEvent, Stage};
use crate::executors::StepExecutors;
use crate::pipeline::{Engine, JitterStrategy, RetryConfig};
use crate::progress::Subscription;
use crate::repository::{RepositoryConfig, RepositoryState};
use crate::store::{RecordStore, RepositoryRecord};

/// The `acme/widgets@main` configuration publishing 8080/80.
#[must_use]
pub fn sample_config() -> RepositoryConfig {
    RepositoryConfig::new("acme", "widgets", "main")
}

/// A fetched, built and running state.
#[must_use]
pub fn running_state() -> RepositoryState {
    RepositoryState {
        fetched: true,
        last_commit_hash: Some("abc123".into()),
        built: true,
        image_id: Some("sha256:feed".into()),
        running: true,
        container_status: ContainerStatus::Running,
        tunnel_url: None,
        lifecycle: LifecycleState::Running,
        updated_at: None,
    }
}

/// Retry policy with 1 ms delays and no jitter.
#[must_use]
pub fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .with_base_delay_ms(1)
        .with_max_delay_ms(5)
        .with_jitter(JitterStrategy::None)
}

/// One scripted executor per stage.
#[derive(Debug, Clone)]
pub struct TestExecutors {
    /// Fetch.
    pub fetch: Arc<ScriptedExecutor>,
    /// Build.
    pub build: Arc<ScriptedExecutor>,
    /// Run.
    pub run: Arc<ScriptedExecutor>,
    /// Expose.
    pub expose: Arc<ScriptedExecutor>,
}

impl Default for TestExecutors {
    fn default() -> Self {
        Self {
            fetch: Arc::new(ScriptedExecutor::new(Stage::Fetch)),
            build: Arc::new(ScriptedExecutor::new(Stage::Build)),
            run: Arc::new(ScriptedExecutor::new(Stage::Run)),
            expose: Arc::new(ScriptedExecutor::new(Stage::Expose)),
        }
    }
}

impl TestExecutors {
    /// Always-succeeding executors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the fetch executor.
    #[must_use]
    pub fn with_fetch(mut self, fetch: ScriptedExecutor) -> Self {
        self.fetch = Arc::new(fetch);
        self
    }

    /// Replaces the build executor.
    #[must_use]
    pub fn with_build(mut self, build: ScriptedExecutor) -> Self {
        self.build = Arc::new(build);
        self
    }

    /// Replaces the run executor.
    #[must_use]
    pub fn with_run(mut self, run: ScriptedExecutor) -> Self {
        self.run = Arc::new(run);
        self
    }

    /// The executor set handed to the engine, tunnel included.
    #[must_use]
    pub fn executors(&self) -> StepExecutors {
        StepExecutors::new(self.fetch.clone(), self.build.clone(), self.run.clone())
            .with_expose(self.expose.clone())
    }

    /// Total invocations across all stages.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.fetch.call_count() + self.build.call_count() + self.run.call_count() + self.expose.call_count()
    }
}

/// An engine over `store` with fast retries.
#[must_use]
pub fn engine_with(store: Arc<dyn RecordStore>, executors: &TestExecutors) -> Engine {
    Engine::builder(store, executors.executors())
        .with_config(EngineConfig::default().with_retry(fast_retry()))
        .build()
}

/// Stores a record for `config` with `state`.
///
/// # Panics
///
/// Panics if the store rejects the write.
pub async fn seed(store: &dyn RecordStore, config: RepositoryConfig, state: RepositoryState) {
    let record = RepositoryRecord { config, state };
    store
        .put(&record.key(), record.clone())
        .await
        .unwrap_or_else(|err| panic!("seeding {} failed: {err}", record.key()));
}

/// Drains a subscription to its end, giving up after five seconds.
pub async fn collect_events(subscription: Subscription) -> Vec<ProgressEvent> {
    tokio::time::timeout(Duration::from_secs(5), subscription.collect::<Vec<_>>())
        .await
        .unwrap_or_default()
}
