use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::stage::Stage;

/// Structured output of one stage. Shape is stage-specific.
pub type PhaseResult = Map<String, Value>;

/// Accumulated stage outputs for a single run, keyed in pipeline order.
pub type StageResults = BTreeMap<Stage, PhaseResult>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Sort rank for a raw priority string. Unrecognized values sort after `low`.
    pub fn rank(raw: &str) -> u8 {
        match Self::parse(raw) {
            Some(Self::High) => 0,
            Some(Self::Medium) => 1,
            Some(Self::Low) => 2,
            None => 3,
        }
    }
}

fn default_priority() -> Option<String> {
    Some(Priority::Low.as_str().to_string())
}

/// A recommendation emitted by the analysis or qa stage.
///
/// `priority` is kept as the raw string so unrecognized values survive into
/// the report. A missing priority reads as `low`; `null` stays `None` and
/// ranks last. Fields beyond the core set (e.g. `category`) are preserved in
/// `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Recommendation {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default = "default_priority")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Stage>,
    #[serde(flatten)]
    #[cfg_attr(feature = "typescript", ts(skip))]
    pub extra: Map<String, Value>,
}

impl Recommendation {
    pub fn new(
        id: impl Into<String>,
        recommendation: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            id: id.into(),
            recommendation: recommendation.into(),
            priority: Some(priority.as_str().to_string()),
            phase: None,
            extra: Map::new(),
        }
    }

    /// Lenient construction from raw executor output, tagged with the stage
    /// that produced it.
    ///
    /// Scalar ids are stringified, a non-string priority becomes unranked and
    /// any `phase` the executor supplied is replaced by `phase`. A bare string
    /// is taken as the recommendation text. Other shapes yield `None`.
    pub fn from_stage_output(value: &Value, phase: Stage) -> Option<Self> {
        let mut fields = match value {
            Value::Object(map) => map.clone(),
            Value::String(text) => {
                return Some(Self {
                    id: String::new(),
                    recommendation: text.clone(),
                    priority: default_priority(),
                    phase: Some(phase),
                    extra: Map::new(),
                })
            }
            _ => return None,
        };

        let id = fields.remove("id").map(scalar_text).unwrap_or_default();
        let recommendation = fields
            .remove("recommendation")
            .map(scalar_text)
            .unwrap_or_default();
        let priority = match fields.remove("priority") {
            None => default_priority(),
            Some(Value::String(raw)) => Some(raw),
            Some(_) => None,
        };
        fields.remove("phase");

        Some(Self {
            id,
            recommendation,
            priority,
            phase: Some(phase),
            extra: fields,
        })
    }

    pub fn with_phase(mut self, phase: Stage) -> Self {
        self.phase = Some(phase);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn priority_rank(&self) -> u8 {
        self.priority.as_deref().map_or(3, Priority::rank)
    }

    pub fn is_priority(&self, priority: Priority) -> bool {
        self.priority.as_deref() == Some(priority.as_str())
    }

    pub fn category(&self) -> Option<&str> {
        self.extra.get("category").and_then(Value::as_str)
    }
}

fn scalar_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Qualitative verdict derived from the qa stage's test results.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ImplementationStatus {
    Successful,
    Partial,
    NeedsImprovement,
    Unknown,
}

impl ImplementationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::Partial => "partial",
            Self::NeedsImprovement => "needs_improvement",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ReportSummary {
    #[schema(value_type = Vec<Object>)]
    pub research_findings: Vec<Value>,
    #[schema(value_type = Vec<Object>)]
    pub analysis_insights: Vec<Value>,
    pub implementation_status: ImplementationStatus,
    #[schema(value_type = Object)]
    pub quality_metrics: Value,
    pub total_execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ImplementationDetails {
    #[schema(value_type = Object)]
    pub architecture: Value,
    #[schema(value_type = Object)]
    pub api_documentation: Value,
    #[schema(value_type = Object)]
    pub guide: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DetailedResults {
    #[schema(value_type = Object)]
    pub research: Value,
    #[schema(value_type = Object)]
    pub analysis: Value,
    pub implementation: ImplementationDetails,
    #[schema(value_type = Object)]
    pub quality_assurance: Value,
}

/// Terminal artifact of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct FinalReport {
    pub summary: ReportSummary,
    pub detailed_results: DetailedResults,
    #[schema(value_type = Vec<Object>)]
    pub recommendations: Vec<Recommendation>,
    pub next_steps: Vec<String>,
}

/// Terminal artifact of a failed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ErrorReport {
    pub error_type: String,
    pub error_message: String,
    /// First stage, in pipeline order, that did not produce a result.
    /// `unknown` when every stage had completed.
    pub phase: String,
    pub completed_steps: Vec<Stage>,
    pub recommendations: Vec<String>,
    pub execution_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct WorkflowMetrics {
    /// Seconds spent in each stage's executor call; stages that never ran report 0.
    #[schema(value_type = Object)]
    pub execution_time: BTreeMap<Stage, f64>,
    #[schema(value_type = Object)]
    pub quality_metrics: Value,
    pub completion_status: ImplementationStatus,
}

/// What a single orchestrator run resolves to. Never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WorkflowOutcome {
    Completed {
        execution_time: f64,
        execution_results: StageResults,
        final_report: FinalReport,
        metrics: WorkflowMetrics,
    },
    Failed {
        error: String,
        error_report: ErrorReport,
        partial_results: StageResults,
        execution_time: f64,
    },
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn execution_time(&self) -> f64 {
        match self {
            Self::Completed { execution_time, .. } | Self::Failed { execution_time, .. } => {
                *execution_time
            }
        }
    }
}
