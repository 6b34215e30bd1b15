//! Event types for the crewflow event system

use chrono::{DateTime, Utc};
use crewflow_core::{ImplementationStatus, ProgressPhase};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope wrapping all events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: Event,
}

impl EventEnvelope {
    /// Create a new event envelope with auto-generated ID and timestamp
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// All possible events in the system
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A workflow was registered and its run scheduled
    #[serde(rename = "workflow.accepted")]
    WorkflowAccepted { workflow_id: String },

    /// The orchestrator crossed a stage checkpoint
    #[serde(rename = "workflow.progress")]
    WorkflowProgress {
        workflow_id: String,
        phase: ProgressPhase,
        progress: f64,
        message: String,
    },

    /// All stages succeeded and the final report was built
    #[serde(rename = "workflow.completed")]
    WorkflowCompleted {
        workflow_id: String,
        implementation_status: ImplementationStatus,
        execution_time: f64,
    },

    /// A stage failed; no further stages ran
    #[serde(rename = "workflow.failed")]
    WorkflowFailed {
        workflow_id: String,
        phase: String,
        error: String,
    },

    /// The registry entry was removed after its grace window
    #[serde(rename = "workflow.expired")]
    WorkflowExpired { workflow_id: String },

    /// A run aborted outside the normal failure path (e.g. executor panic)
    #[serde(rename = "error")]
    Error {
        message: String,
        workflow_id: Option<String>,
    },
}

impl Event {
    /// Get the workflow ID associated with this event, if any
    pub fn workflow_id(&self) -> Option<&str> {
        match self {
            Event::WorkflowAccepted { workflow_id }
            | Event::WorkflowProgress { workflow_id, .. }
            | Event::WorkflowCompleted { workflow_id, .. }
            | Event::WorkflowFailed { workflow_id, .. }
            | Event::WorkflowExpired { workflow_id } => Some(workflow_id),
            Event::Error { workflow_id, .. } => workflow_id.as_deref(),
        }
    }

    /// Wire name of the event, matching its serde tag
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::WorkflowAccepted { .. } => "workflow.accepted",
            Event::WorkflowProgress { .. } => "workflow.progress",
            Event::WorkflowCompleted { .. } => "workflow.completed",
            Event::WorkflowFailed { .. } => "workflow.failed",
            Event::WorkflowExpired { .. } => "workflow.expired",
            Event::Error { .. } => "error",
        }
    }
}
