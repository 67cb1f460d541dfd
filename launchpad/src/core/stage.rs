//! Pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four ordered units of pipeline work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Clone or update the source checkout.
    Fetch,
    /// Build the container image.
    Build,
    /// Replace and start the container.
    Run,
    /// Provision a public hostname for the container.
    Expose,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Self; 4] = [Self::Fetch, Self::Build, Self::Run, Self::Expose];

    /// Returns the stage's position in the execution order.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Fetch => 0,
            Self::Build => 1,
            Self::Run => 2,
            Self::Expose => 3,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Build => "build",
            Self::Run => "run",
            Self::Expose => "expose",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" => Ok(Self::Fetch),
            "build" => Ok(Self::Build),
            "run" => Ok(Self::Run),
            "expose" => Ok(Self::Expose),
            other => Err(format!("unknown stage '{other}'")),
        }
    }
}

/// The stage a progress event is attributed to.
///
/// Besides the four pipeline stages, events may concern the run as a whole
/// (`pipeline`) or report its cancellation (`cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStage {
    /// See [`Stage::Fetch`].
    Fetch,
    /// See [`Stage::Build`].
    Build,
    /// See [`Stage::Run`].
    Run,
    /// See [`Stage::Expose`].
    Expose,
    /// The run as a whole.
    Pipeline,
    /// The run was cancelled.
    Cancelled,
}

impl From<Stage> for EventStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Fetch => Self::Fetch,
            Stage::Build => Self::Build,
            Stage::Run => Self::Run,
            Stage::Expose => Self::Expose,
        }
    }
}

impl fmt::Display for EventStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Build => f.write_str("build"),
            Self::Run => f.write_str("run"),
            Self::Expose => f.write_str("expose"),
            Self::Pipeline => f.write_str("pipeline"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Fetch < Stage::Build);
        assert!(Stage::Run < Stage::Expose);
        for (i, stage) in Stage::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn test_stage_parse() {
        assert_eq!("Fetch".parse::<Stage>().unwrap(), Stage::Fetch);
        assert_eq!(" expose ".parse::<Stage>().unwrap(), Stage::Expose);
        assert!("deploy".parse::<Stage>().is_err());
    }

    #[test]
    fn test_stage_serde() {
        assert_eq!(serde_json::to_string(&Stage::Build).unwrap(), "\"build\"");
        let stage: Stage = serde_json::from_str("\"run\"").unwrap();
        assert_eq!(stage, Stage::Run);
    }

    #[test]
    fn test_event_stage_from_stage() {
        assert_eq!(EventStage::from(Stage::Expose), EventStage::Expose);
        assert_eq!(EventStage::Cancelled.to_string(), "cancelled");
        assert_eq!(serde_json::to_string(&EventStage::Pipeline).unwrap(), "\"pipeline\"");
    }
}
