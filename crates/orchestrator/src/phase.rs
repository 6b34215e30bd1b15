//! Phase Executor capability and the per-stage executor set.

use std::sync::Arc;

use async_trait::async_trait;
use crewflow_core::{PhaseResult, Stage};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::PhaseError;

/// One call into a Phase Executor.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseRequest {
    pub stage: Stage,
    pub task_description: String,
    pub expected_output: String,
    /// Original request merged with prior stage outputs and derived fields.
    pub context: Map<String, Value>,
}

/// Performs the domain work of a single stage.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, request: PhaseRequest) -> Result<PhaseResult, PhaseError>;
}

/// The four executors a run needs, one per stage.
#[derive(Clone)]
pub struct PhaseExecutors {
    research: Arc<dyn PhaseExecutor>,
    analysis: Arc<dyn PhaseExecutor>,
    implementation: Arc<dyn PhaseExecutor>,
    qa: Arc<dyn PhaseExecutor>,
}

impl PhaseExecutors {
    pub fn new(
        research: Arc<dyn PhaseExecutor>,
        analysis: Arc<dyn PhaseExecutor>,
        implementation: Arc<dyn PhaseExecutor>,
        qa: Arc<dyn PhaseExecutor>,
    ) -> Self {
        Self {
            research,
            analysis,
            implementation,
            qa,
        }
    }

    /// Use the same executor for every stage (e.g. a remote service that
    /// routes on `PhaseRequest::stage`).
    pub fn uniform(executor: Arc<dyn PhaseExecutor>) -> Self {
        Self {
            research: Arc::clone(&executor),
            analysis: Arc::clone(&executor),
            implementation: Arc::clone(&executor),
            qa: executor,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> &Arc<dyn PhaseExecutor> {
        match stage {
            Stage::Research => &self.research,
            Stage::Analysis => &self.analysis,
            Stage::Implementation => &self.implementation,
            Stage::Qa => &self.qa,
        }
    }
}

impl std::fmt::Debug for PhaseExecutors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseExecutors").finish_non_exhaustive()
    }
}
