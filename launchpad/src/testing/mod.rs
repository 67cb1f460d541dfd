//! Test doubles and fixtures for engine tests.
//!
//! This module provides:
//! - Scripted step executors with call counting and a release gate
//! - A recording container control and a record store that can be made to fail
//! - Fixtures for configs, states and fully wired engines

mod fixtures;
mod mocks;

pub use fixtures::{collect_events, engine_with, fast_retry, running_state, sample_config, seed, TestExecutors};
pub use mocks::{FailingRecordStore, Gate, RecordingContainerControl, ScriptedExecutor};
