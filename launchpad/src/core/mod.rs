//! Core domain types shared by the engine, channels and executors.
//!
//! - Run identifiers and monotonic counters
//! - Pipeline stages and event stages
//! - Container status and the repository lifecycle machine
//! - Progress events and run summaries

mod event;
mod ids;
mod run;
mod stage;
mod status;

pub use event::{EventKind, ProgressEvent};
pub use ids::{MonotonicCounter, RunId};
pub use run::{RunOutcome, RunSnapshot, RunSummary, StepRecord, StepStatus};
pub use stage::{EventStage, Stage};
pub use status::{ContainerStatus, LifecycleState, TransitionError};
