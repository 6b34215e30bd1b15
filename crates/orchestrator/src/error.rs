use crewflow_core::{CoreError, Stage};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Workflow already running: {0}")]
    WorkflowExists(String),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Phase {stage} failed: {source}")]
    PhaseFailed {
        stage: Stage,
        #[source]
        source: PhaseError,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl OrchestratorError {
    pub fn phase_failed(stage: Stage, source: PhaseError) -> Self {
        Self::PhaseFailed { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Failure reported by a Phase Executor.
///
/// `kind` is a short machine-readable tag (`http_503`, `timeout`,
/// `invalid_output`, ...) that ends up as `ErrorReport.error_type`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PhaseError {
    pub kind: String,
    pub message: String,
}

impl PhaseError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("timeout", message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new("transport", message)
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::new("invalid_output", message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(format!("http_{}", status), message)
    }

    /// Whether an executor-level retry may succeed.
    pub fn is_retryable(&self) -> bool {
        if self.kind == "transport" {
            return true;
        }
        self.kind
            .strip_prefix("http_")
            .and_then(|code| code.parse::<u16>().ok())
            .is_some_and(|code| code >= 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_error_display_is_message() {
        let err = PhaseError::timeout("research timeout after 30s");
        assert_eq!(err.to_string(), "research timeout after 30s");
        assert_eq!(err.kind, "timeout");
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(PhaseError::http(503, "unavailable").is_retryable());
        assert!(PhaseError::transport("connection reset").is_retryable());
        assert!(!PhaseError::http(404, "missing").is_retryable());
        assert!(!PhaseError::timeout("slow").is_retryable());
        assert!(!PhaseError::invalid_output("not an object").is_retryable());
    }

    #[test]
    fn test_orchestrator_error_display() {
        let err = OrchestratorError::WorkflowExists("wf-1".to_string());
        assert_eq!(err.to_string(), "Workflow already running: wf-1");

        let err = OrchestratorError::phase_failed(Stage::Qa, PhaseError::transport("refused"));
        assert_eq!(err.to_string(), "Phase qa failed: refused");
    }
}
