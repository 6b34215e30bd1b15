use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::CoreError;

/// One step of the fixed four-stage pipeline.
///
/// Declaration order is pipeline order; `Ord` follows it.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, ToSchema,
)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Research,
    Analysis,
    Implementation,
    Qa,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Research,
        Stage::Analysis,
        Stage::Implementation,
        Stage::Qa,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Implementation => "implementation",
            Self::Qa => "qa",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "research" => Some(Self::Research),
            "analysis" => Some(Self::Analysis),
            "implementation" => Some(Self::Implementation),
            "qa" => Some(Self::Qa),
            _ => None,
        }
    }

    /// Key under which this stage's output is threaded into later stage inputs.
    pub fn result_key(&self) -> &'static str {
        match self {
            Self::Research => "research_results",
            Self::Analysis => "analysis_results",
            Self::Implementation => "implementation_results",
            Self::Qa => "qa_results",
        }
    }

    /// Progress reported when the stage starts.
    pub fn enter_progress(&self) -> f64 {
        match self {
            Self::Research => 0.0,
            Self::Analysis => 0.25,
            Self::Implementation => 0.50,
            Self::Qa => 0.75,
        }
    }

    /// Progress reported once the stage's executor resolves successfully.
    pub fn exit_progress(&self) -> f64 {
        match self {
            Self::Research => 0.25,
            Self::Analysis => 0.50,
            Self::Implementation => 0.75,
            Self::Qa => 0.95,
        }
    }

    pub fn start_message(&self) -> &'static str {
        match self {
            Self::Research => "Starting research phase",
            Self::Analysis => "Starting analysis phase",
            Self::Implementation => "Starting implementation phase",
            Self::Qa => "Starting QA phase",
        }
    }

    pub fn finish_message(&self) -> &'static str {
        match self {
            Self::Research => "Research phase completed",
            Self::Analysis => "Analysis phase completed",
            Self::Implementation => "Implementation phase completed",
            Self::Qa => "QA phase completed",
        }
    }

    pub fn progress_phase(&self) -> ProgressPhase {
        match self {
            Self::Research => ProgressPhase::Research,
            Self::Analysis => ProgressPhase::Analysis,
            Self::Implementation => ProgressPhase::Implementation,
            Self::Qa => ProgressPhase::Qa,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| CoreError::InvalidStage(s.to_string()))
    }
}

/// Phase identifier carried by progress tuples and execution state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ProgressPhase {
    #[default]
    Initializing,
    Research,
    Analysis,
    Implementation,
    Qa,
    Reporting,
    Complete,
    Error,
}

impl ProgressPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Research => "research",
            Self::Analysis => "analysis",
            Self::Implementation => "implementation",
            Self::Qa => "qa",
            Self::Reporting => "reporting",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initializing" => Some(Self::Initializing),
            "research" => Some(Self::Research),
            "analysis" => Some(Self::Analysis),
            "implementation" => Some(Self::Implementation),
            "qa" => Some(Self::Qa),
            "reporting" => Some(Self::Reporting),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl fmt::Display for ProgressPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Stage> for ProgressPhase {
    fn from(stage: Stage) -> Self {
        stage.progress_phase()
    }
}
