//! Workflow service: accepts runs, executes them out-of-band, mirrors
//! progress into the registry and publishes lifecycle events.

use std::sync::Arc;
use std::time::Duration;

use crewflow_core::{
    validate_workflow_id, ErrorReport, ExecutionState, ProgressPhase, ProgressUpdate, Stage,
    StageResults, WorkflowOutcome, WorkflowRequest,
};
use events::{Event, EventBus};
use serde::{Deserialize, Serialize};
use tokio::task::JoinError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{OrchestratorError, PhaseError, Result};
use crate::progress::{self, ProgressSender, ProgressSink};
use crate::report::error_recommendations;
use crate::registry::ExecutionRegistry;
use crate::stream::{status_stream, StatusStream};
use crate::workflow::WorkflowOrchestrator;

const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    /// How long a terminal entry stays readable before removal.
    pub cleanup_grace: Duration,
    /// Tick of the status stream.
    pub poll_interval: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Acknowledgement {
    pub workflow_id: String,
    pub status: String,
}

impl Acknowledgement {
    fn accepted(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            status: "accepted".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct WorkflowService {
    orchestrator: Arc<WorkflowOrchestrator>,
    registry: ExecutionRegistry,
    event_bus: EventBus,
    settings: ServiceSettings,
}

impl WorkflowService {
    pub fn new(
        orchestrator: WorkflowOrchestrator,
        registry: ExecutionRegistry,
        event_bus: EventBus,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            registry,
            event_bus,
            settings,
        }
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Register `workflow_id` and schedule its run. Returns immediately.
    pub fn start(&self, workflow_id: &str, request: WorkflowRequest) -> Result<Acknowledgement> {
        validate_workflow_id(workflow_id)?;
        self.registry.start(workflow_id)?;

        info!(workflow_id, "Workflow accepted");
        self.event_bus.emit(Event::WorkflowAccepted {
            workflow_id: workflow_id.to_string(),
        });

        let service = self.clone();
        let id = workflow_id.to_string();
        tokio::spawn(async move {
            service.drive(id, request).await;
        });

        Ok(Acknowledgement::accepted(workflow_id))
    }

    /// Status stream for a live workflow.
    pub fn status(&self, workflow_id: &str) -> Result<StatusStream> {
        status_stream(&self.registry, workflow_id, self.settings.poll_interval)
    }

    /// Point-in-time copy of a live workflow's state.
    pub fn snapshot(&self, workflow_id: &str) -> Result<ExecutionState> {
        self.registry
            .get(workflow_id)
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))
    }

    async fn drive(self, workflow_id: String, request: WorkflowRequest) -> WorkflowOutcome {
        let (sender, mut receiver) = progress::channel();

        let registry = self.registry.clone();
        let bus = self.event_bus.clone();
        let forward_id = workflow_id.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(update) = receiver.next().await {
                debug!(
                    workflow_id = %forward_id,
                    phase = %update.phase,
                    progress = update.progress,
                    "Progress"
                );
                bus.emit(Event::WorkflowProgress {
                    workflow_id: forward_id.clone(),
                    phase: update.phase,
                    progress: update.progress,
                    message: update.message.clone(),
                });
                registry.update(&forward_id, update);
            }
        });

        // A panicking executor surfaces as a JoinError on `run`.
        let started = Instant::now();
        let sender = Arc::new(sender);
        let run = tokio::spawn({
            let orchestrator = Arc::clone(&self.orchestrator);
            let sender = Arc::clone(&sender);
            async move { orchestrator.execute(&request, sender.as_ref()).await }
        });

        let outcome = match run.await {
            Ok(outcome) => outcome,
            Err(e) => self.aborted(&workflow_id, &sender, e, started.elapsed().as_secs_f64()),
        };

        // Closing the sender lets the forwarder flush the final tuple and exit.
        drop(sender);
        if let Err(e) = forwarder.await {
            warn!(workflow_id = %workflow_id, error = %e, "Progress forwarder aborted");
        }

        self.record(&workflow_id, &outcome);
        self.schedule_cleanup(&workflow_id);
        outcome
    }

    /// Failure outcome for a run whose task panicked or was cancelled.
    ///
    /// Stage results died with the task, so the report is rebuilt from the last
    /// progress tuple: the stage in flight failed and every earlier stage ran.
    fn aborted(
        &self,
        workflow_id: &str,
        sender: &ProgressSender,
        join_error: JoinError,
        execution_time: f64,
    ) -> WorkflowOutcome {
        let failure = PhaseError::new("panic", abort_message(join_error));
        error!(workflow_id, error = %failure, "Workflow run aborted");
        self.event_bus.emit(Event::Error {
            message: failure.message.clone(),
            workflow_id: Some(workflow_id.to_string()),
        });

        let last_phase = sender.latest().phase;
        let in_flight = Stage::ALL
            .iter()
            .position(|stage| stage.progress_phase() == last_phase);
        let (phase, completed_steps) = match in_flight {
            Some(idx) => (Stage::ALL[idx].as_str(), Stage::ALL[..idx].to_vec()),
            None if last_phase == ProgressPhase::Initializing => {
                (Stage::Research.as_str(), Vec::new())
            }
            None => ("unknown", Stage::ALL.to_vec()),
        };

        sender.report(ProgressUpdate::new(
            ProgressPhase::Error,
            1.0,
            format!("Error: {}", failure),
        ));

        WorkflowOutcome::Failed {
            error: failure.to_string(),
            error_report: ErrorReport {
                error_type: failure.kind.clone(),
                error_message: failure.message.clone(),
                phase: phase.to_string(),
                completed_steps,
                recommendations: error_recommendations(&failure),
                execution_time,
            },
            partial_results: StageResults::new(),
            execution_time,
        }
    }

    fn record(&self, workflow_id: &str, outcome: &WorkflowOutcome) {
        match outcome {
            WorkflowOutcome::Completed {
                final_report,
                execution_time,
                ..
            } => {
                self.registry.complete(workflow_id, final_report.clone());
                self.event_bus.emit(Event::WorkflowCompleted {
                    workflow_id: workflow_id.to_string(),
                    implementation_status: final_report.summary.implementation_status,
                    execution_time: *execution_time,
                });
            }
            WorkflowOutcome::Failed {
                error,
                error_report,
                ..
            } => {
                warn!(workflow_id, phase = %error_report.phase, error = %error, "Workflow failed");
                self.registry
                    .fail(workflow_id, error.clone(), Some(error_report.clone()));
                self.event_bus.emit(Event::WorkflowFailed {
                    workflow_id: workflow_id.to_string(),
                    phase: error_report.phase.clone(),
                    error: error.clone(),
                });
            }
        }
    }

    fn schedule_cleanup(&self, workflow_id: &str) {
        let cleanup = self
            .registry
            .schedule_cleanup(workflow_id, self.settings.cleanup_grace);
        let bus = self.event_bus.clone();
        let workflow_id = workflow_id.to_string();
        tokio::spawn(async move {
            if let Ok(true) = cleanup.await {
                bus.emit(Event::WorkflowExpired { workflow_id });
            }
        });
    }
}

fn abort_message(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "Workflow run was cancelled".to_string();
    }
    let payload = join_error.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Workflow run panicked: {}", detail)
}

impl std::fmt::Debug for WorkflowService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowService")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
