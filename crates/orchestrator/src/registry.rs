//! Execution Registry: live state of in-flight workflows, keyed by id.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crewflow_core::{ErrorReport, ExecutionState, FinalReport, ProgressUpdate};
use tracing::debug;

use crate::error::{OrchestratorError, Result};

/// Shared, cloneable map from workflow id to [`ExecutionState`].
///
/// Every mutation takes the write lock for the whole read-modify-write, so an
/// update can never land on an entry that a concurrent cleanup just removed.
/// Operations on a missing id are silently ignored.
#[derive(Clone, Default)]
pub struct ExecutionRegistry {
    entries: Arc<RwLock<HashMap<String, ExecutionState>>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ExecutionState>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ExecutionState>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Register a new running entry. Fails if the id is still live.
    pub fn start(&self, workflow_id: &str) -> Result<()> {
        let mut entries = self.write();
        if entries.contains_key(workflow_id) {
            return Err(OrchestratorError::WorkflowExists(workflow_id.to_string()));
        }
        entries.insert(workflow_id.to_string(), ExecutionState::new());
        debug!(workflow_id, "Registered execution");
        Ok(())
    }

    pub fn update(&self, workflow_id: &str, update: ProgressUpdate) {
        self.modify(workflow_id, |state| state.apply(update));
    }

    pub fn complete(&self, workflow_id: &str, report: FinalReport) {
        self.modify(workflow_id, |state| state.complete(report));
    }

    pub fn fail(&self, workflow_id: &str, error: impl Into<String>, report: Option<ErrorReport>) {
        let error = error.into();
        self.modify(workflow_id, |state| state.fail(error, report));
    }

    fn modify(&self, workflow_id: &str, f: impl FnOnce(&mut ExecutionState)) {
        match self.write().get_mut(workflow_id) {
            Some(state) => f(state),
            None => debug!(workflow_id, "Ignoring write to removed execution"),
        }
    }

    pub fn get(&self, workflow_id: &str) -> Option<ExecutionState> {
        self.read().get(workflow_id).cloned()
    }

    pub fn contains(&self, workflow_id: &str) -> bool {
        self.read().contains_key(workflow_id)
    }

    pub fn remove(&self, workflow_id: &str) -> Option<ExecutionState> {
        let removed = self.write().remove(workflow_id);
        if removed.is_some() {
            debug!(workflow_id, "Removed execution");
        }
        removed
    }

    /// Remove the entry once `grace` has elapsed, regardless of readers.
    ///
    /// The returned handle resolves to whether an entry was removed.
    pub fn schedule_cleanup(
        &self,
        workflow_id: impl Into<String>,
        grace: Duration,
    ) -> tokio::task::JoinHandle<bool> {
        let registry = self.clone();
        let workflow_id = workflow_id.into();
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            registry.remove(&workflow_id).is_some()
        })
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl std::fmt::Debug for ExecutionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewflow_core::{ExecutionStatus, ProgressPhase, Stage};

    #[test]
    fn test_start_creates_initializing_entry() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();

        let state = registry.get("wf-1").unwrap();
        assert_eq!(state.status, ExecutionStatus::Running);
        assert_eq!(state.current_phase, ProgressPhase::Initializing);
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.message, "Starting workflow execution");
    }

    #[test]
    fn test_duplicate_start_is_rejected() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();

        let err = registry.start("wf-1").unwrap_err();
        assert!(matches!(err, OrchestratorError::WorkflowExists(id) if id == "wf-1"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_mutates_entry() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();

        registry.update(
            "wf-1",
            ProgressUpdate::new(Stage::Analysis, 0.5, "Analysis phase completed"),
        );

        let state = registry.get("wf-1").unwrap();
        assert_eq!(state.current_phase, ProgressPhase::Analysis);
        assert_eq!(state.progress, 0.5);
        assert_eq!(state.message, "Analysis phase completed");
    }

    #[test]
    fn test_writes_to_missing_entry_are_noops() {
        let registry = ExecutionRegistry::new();

        registry.update("ghost", ProgressUpdate::initial());
        registry.fail("ghost", "boom", None);

        assert!(registry.get("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_fail_stores_error() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();
        registry.fail("wf-1", "Research failed", None);

        let state = registry.get("wf-1").unwrap();
        assert_eq!(state.status, ExecutionStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("Research failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_removes_after_grace() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();

        let handle = registry.schedule_cleanup("wf-1", Duration::from_secs(5));

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert!(registry.contains("wf-1"));

        assert!(handle.await.unwrap());
        assert!(!registry.contains("wf-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_id_reusable_after_cleanup() {
        let registry = ExecutionRegistry::new();
        registry.start("wf-1").unwrap();
        registry.schedule_cleanup("wf-1", Duration::from_secs(5)).await.unwrap();

        assert!(registry.start("wf-1").is_ok());
    }

    #[test]
    fn test_clones_share_entries() {
        let registry = ExecutionRegistry::new();
        let other = registry.clone();
        registry.start("wf-1").unwrap();
        assert!(other.contains("wf-1"));
    }
}
