pub mod error;
pub mod fallback;
pub mod http_executor;
pub mod phase;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod report;
pub mod service;
pub mod stream;
pub mod workflow;

pub use error::{OrchestratorError, PhaseError, Result};
pub use http_executor::{HttpExecutorConfig, HttpPhaseExecutor};
pub use phase::{PhaseExecutor, PhaseExecutors, PhaseRequest};
pub use progress::{ProgressReceiver, ProgressSender, ProgressSink};
pub use registry::ExecutionRegistry;
pub use report::ReportCompiler;
pub use service::{Acknowledgement, ServiceSettings, WorkflowService};
pub use stream::{ProgressSnapshot, StatusEvent, StatusStream};
pub use workflow::WorkflowOrchestrator;
