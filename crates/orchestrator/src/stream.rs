//! Status stream: polls the registry on a fixed tick and yields snapshots
//! until a terminal event.

use std::time::Duration;

use crewflow_core::{ErrorReport, ExecutionState, ExecutionStatus, FinalReport, ProgressPhase};
use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::{OrchestratorError, Result};
use crate::registry::ExecutionRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub status: ExecutionStatus,
    pub current_phase: ProgressPhase,
    pub progress: f64,
    pub message: String,
}

impl From<&ExecutionState> for ProgressSnapshot {
    fn from(state: &ExecutionState) -> Self {
        Self {
            status: state.status,
            current_phase: state.current_phase,
            progress: state.progress,
            message: state.message.clone(),
        }
    }
}

/// One item of a status stream. `Complete`, `Error` and `Expired` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StatusEvent {
    Progress(ProgressSnapshot),
    Complete(FinalReport),
    Error {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_report: Option<ErrorReport>,
    },
    /// The entry was cleaned up before a terminal event was read.
    Expired { workflow_id: String },
}

impl StatusEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Complete(_) => "complete",
            Self::Error { .. } => "error",
            Self::Expired { .. } => "expired",
        }
    }

    /// Payload without the event tag.
    pub fn data(&self) -> Value {
        match self {
            Self::Progress(snapshot) => serde_json::to_value(snapshot),
            Self::Complete(report) => serde_json::to_value(report),
            Self::Error {
                error,
                error_report,
            } => Ok(serde_json::json!({
                "error": error,
                "error_report": error_report,
            })),
            Self::Expired { workflow_id } => Ok(serde_json::json!({
                "workflow_id": workflow_id,
            })),
        }
        .unwrap_or(Value::Null)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

pub type StatusStream = BoxStream<'static, StatusEvent>;

struct Poller {
    registry: ExecutionRegistry,
    workflow_id: String,
    ticker: Interval,
    queued: Option<StatusEvent>,
    done: bool,
}

impl Poller {
    fn poll(&mut self) -> StatusEvent {
        let Some(state) = self.registry.get(&self.workflow_id) else {
            self.done = true;
            return StatusEvent::Expired {
                workflow_id: self.workflow_id.clone(),
            };
        };

        if state.error.is_some() || state.status == ExecutionStatus::Failed {
            self.done = true;
            return StatusEvent::Error {
                error: state.error.clone().unwrap_or_default(),
                error_report: state.error_report.clone(),
            };
        }

        let snapshot = ProgressSnapshot::from(&state);
        if state.status == ExecutionStatus::Completed {
            self.done = true;
            self.queued = state.result.map(StatusEvent::Complete);
        }
        StatusEvent::Progress(snapshot)
    }
}

/// Floor for the poll tick; a zero period would panic in `tokio::time::interval`.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Open a status stream for `workflow_id`.
///
/// Fails with `WorkflowNotFound` when no entry exists; otherwise the first
/// snapshot is read immediately and then once per `interval` (at least 1ms).
pub fn status_stream(
    registry: &ExecutionRegistry,
    workflow_id: &str,
    interval: Duration,
) -> Result<StatusStream> {
    if !registry.contains(workflow_id) {
        return Err(OrchestratorError::WorkflowNotFound(workflow_id.to_string()));
    }

    let mut ticker = tokio::time::interval(interval.max(MIN_POLL_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let poller = Poller {
        registry: registry.clone(),
        workflow_id: workflow_id.to_string(),
        ticker,
        queued: None,
        done: false,
    };

    Ok(stream::unfold(poller, |mut poller| async move {
        if let Some(event) = poller.queued.take() {
            return Some((event, poller));
        }
        if poller.done {
            return None;
        }
        poller.ticker.tick().await;
        let event = poller.poll();
        Some((event, poller))
    })
    .boxed())
}
