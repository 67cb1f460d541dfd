//! Pipeline admission and execution.
//!
//! This module provides:
//! - The [`Engine`] that admits runs and sequences Fetch, Build, Run, Expose
//! - Run options and the trigger-run request types
//! - The active run registry enforcing one run per repository
//! - Retry policy with backoff and jitter

mod engine;
mod options;
mod registry;
mod retry;


pub use engine::{Engine, EngineBuilder, RunHandle};
pub use options::{RunOptions, RunRequest, RunResponse};
pub use registry::{ActiveRun, KeyGuard, RunRegistry};
pub use retry::{
    backoff, should_retry, BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState,
};
