use std::sync::Arc;

use events::EventBus;
use orchestrator::{
    ExecutionRegistry, HttpPhaseExecutor, PhaseError, PhaseExecutors, WorkflowOrchestrator,
    WorkflowService,
};

use crate::config::ServiceConfig;

#[derive(Clone)]
pub struct AppState {
    pub workflows: WorkflowService,
    pub event_bus: EventBus,
}

impl AppState {
    /// State backed by the remote HTTP phase executor named in `config`.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PhaseError> {
        let executor = HttpPhaseExecutor::new(config.executor_config())?;
        Ok(Self::with_executors(
            PhaseExecutors::uniform(Arc::new(executor)),
            config,
        ))
    }

    pub fn with_executors(executors: PhaseExecutors, config: &ServiceConfig) -> Self {
        let event_bus = EventBus::new();
        let workflows = WorkflowService::new(
            WorkflowOrchestrator::new(executors),
            ExecutionRegistry::new(),
            event_bus.clone(),
            config.service_settings(),
        );

        Self {
            workflows,
            event_bus,
        }
    }
}
