use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::report::{ErrorReport, FinalReport};
use super::stage::ProgressPhase;
use crate::error::{CoreError, Result};

const MAX_WORKFLOW_ID_LEN: usize = 128;

/// Caller-supplied workflow payload. Each stage reads the subset it needs.
pub type WorkflowRequest = Map<String, Value>;

/// Accept any JSON object as a workflow request.
pub fn parse_request(value: Value) -> Result<WorkflowRequest> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::InvalidRequest(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn validate_workflow_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("workflow id cannot be empty".to_string()));
    }
    if id.len() > MAX_WORKFLOW_ID_LEN {
        return Err(CoreError::Validation(format!(
            "workflow id exceeds {} characters",
            MAX_WORKFLOW_ID_LEN
        )));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    #[default]
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// A single `(phase, progress, message)` notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProgressUpdate {
    pub phase: ProgressPhase,
    pub progress: f64,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(phase: impl Into<ProgressPhase>, progress: f64, message: impl Into<String>) -> Self {
        Self {
            phase: phase.into(),
            progress,
            message: message.into(),
        }
    }

    pub fn initial() -> Self {
        Self::new(ProgressPhase::Initializing, 0.0, "Starting workflow execution")
    }
}

/// Live state of one in-flight workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub current_phase: ProgressPhase,
    pub progress: f64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub result: Option<FinalReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub error_report: Option<ErrorReport>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionState {
    pub fn new() -> Self {
        let now = Utc::now();
        let initial = ProgressUpdate::initial();
        Self {
            status: ExecutionStatus::Running,
            current_phase: initial.phase,
            progress: initial.progress,
            message: initial.message,
            result: None,
            error: None,
            error_report: None,
            started_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    /// Apply a progress tuple. Progress never moves backwards and is kept in `[0, 1]`.
    pub fn apply(&mut self, update: ProgressUpdate) {
        self.current_phase = update.phase;
        self.progress = update.progress.clamp(0.0, 1.0).max(self.progress);
        self.message = update.message;
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, report: FinalReport) {
        self.status = ExecutionStatus::Completed;
        self.result = Some(report);
        self.finish();
    }

    pub fn fail(&mut self, error: impl Into<String>, report: Option<ErrorReport>) {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.error_report = report;
        self.finish();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn finish(&mut self) {
        let now = Utc::now();
        self.updated_at = now;
        self.finished_at = Some(now);
    }
}

impl Default for ExecutionState {
    fn default() -> Self {
        Self::new()
    }
}
