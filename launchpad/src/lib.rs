//! # Launchpad
//!
//! A deployment orchestrator that takes a source repository from registration
//! to a running, optionally publicly exposed container.
//!
//! Launchpad provides:
//!
//! - **Lifecycle tracking**: a per-repository state machine persisted in a record store
//! - **Idempotent pipelines**: Fetch, Build, Run and Expose execute only when needed
//! - **Streamed progress**: ordered per-run events with replay for late observers
//! - **Pluggable executors**: git, docker and Cloudflare tunnel steps behind one trait
//! - **Cancellation and retry**: cooperative cancellation with backoff between attempts
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use launchpad::prelude::*;
//!
//! let store = Arc::new(JsonFileRecordStore::open("launchpad.json").await?);
//! let executors = StepExecutors::new(
//!     Arc::new(GitFetcher::new(GitConfig::default())),
//!     Arc::new(DockerBuilder::new(DockerConfig::default())),
//!     Arc::new(DockerRunner::new(DockerConfig::default())),
//! );
//! let engine = Engine::builder(store, executors).build();
//!
//! engine.register_repository(RepositoryConfig::new("acme", "widgets", "main")).await?;
//! let run = engine.start_run(&"acme.widgets.main".parse()?, RunOptions::new()).await?;
//! let mut events = run.subscribe();
//! while let Some(event) = events.next().await {
//!     println!("{}", event.to_json()?);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod core;
pub mod credentials;
pub mod errors;
pub mod executors;
pub mod observability;
pub mod pipeline;
pub mod progress;
pub mod repository;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::EngineConfig;
    pub use crate::core::{
        ContainerStatus, EventKind, EventStage, LifecycleState, ProgressEvent, RunId, RunOutcome,
        RunSummary, Stage,
    };
    pub use crate::credentials::{CredentialRef, CredentialResolver, Secret, StaticCredentials};
    pub use crate::errors::{ErrorKind, LaunchpadError, Result, ValidationError};
    pub use crate::executors::{
        ContainerControl, DockerBuilder, DockerConfig, DockerRunner, ExecutorError, GitConfig,
        GitFetcher, StepContext, StepExecutor, StepExecutors, StepOutcome,
    };
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{Engine, RetryConfig, RunHandle, RunOptions, RunRequest, RunResponse};
    pub use crate::progress::Subscription;
    pub use crate::repository::{RepositoryConfig, RepositoryKey, RepositoryState, StateDelta};
    pub use crate::store::{InMemoryRecordStore, JsonFileRecordStore, RecordStore, RepositoryRecord};

    #[cfg(feature = "cloudflare")]
    pub use crate::executors::{CloudflareConfig, CloudflareTunnel, CloudflareZones};
}
