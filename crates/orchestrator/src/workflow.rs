//! Workflow Orchestrator: drives the four stages in order and resolves every
//! run to a [`WorkflowOutcome`].

use std::collections::BTreeMap;
use std::time::Instant;

use crewflow_core::{
    PhaseResult, ProgressPhase, ProgressUpdate, Stage, StageResults, WorkflowOutcome,
    WorkflowRequest,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::error::{OrchestratorError, PhaseError, Result};
use crate::fallback;
use crate::phase::{PhaseExecutors, PhaseRequest};
use crate::progress::ProgressSink;
use crate::prompts::prompt_for;
use crate::report::ReportCompiler;

/// Accumulated state of one run.
#[derive(Default)]
struct RunState {
    results: StageResults,
    stage_times: BTreeMap<Stage, f64>,
}

#[derive(Debug, Clone)]
pub struct WorkflowOrchestrator {
    executors: PhaseExecutors,
}

impl WorkflowOrchestrator {
    pub fn new(executors: PhaseExecutors) -> Self {
        Self { executors }
    }

    /// Run all stages for `request`. Always resolves; stage failures become a
    /// `Failed` outcome carrying an error report.
    pub async fn execute(
        &self,
        request: &WorkflowRequest,
        progress: &dyn ProgressSink,
    ) -> WorkflowOutcome {
        let started = Instant::now();
        let mut run = RunState::default();

        match self.run_stages(request, progress, &mut run).await {
            Ok(()) => {
                progress.report(ProgressUpdate::new(
                    ProgressPhase::Reporting,
                    0.95,
                    "Generating final report",
                ));

                let compiler = ReportCompiler::new(&run.results);
                let final_report = compiler.final_report(started.elapsed().as_secs_f64());
                let metrics = compiler.metrics(&run.stage_times);

                progress.report(ProgressUpdate::new(
                    ProgressPhase::Complete,
                    1.0,
                    "Workflow execution completed",
                ));

                let execution_time = started.elapsed().as_secs_f64();
                info!(
                    execution_time,
                    status = %final_report.summary.implementation_status.as_str(),
                    "Workflow completed"
                );

                WorkflowOutcome::Completed {
                    execution_time,
                    execution_results: run.results,
                    final_report,
                    metrics,
                }
            }
            Err(err) => {
                let phase_error = match err {
                    OrchestratorError::PhaseFailed { source, .. } => source,
                    other => PhaseError::new("orchestrator", other.to_string()),
                };

                progress.report(ProgressUpdate::new(
                    ProgressPhase::Error,
                    1.0,
                    format!("Error: {}", phase_error.message),
                ));

                let execution_time = started.elapsed().as_secs_f64();
                let error_report =
                    ReportCompiler::new(&run.results).error_report(&phase_error, execution_time);

                WorkflowOutcome::Failed {
                    error: phase_error.message,
                    error_report,
                    partial_results: run.results,
                    execution_time,
                }
            }
        }
    }

    async fn run_stages(
        &self,
        request: &WorkflowRequest,
        progress: &dyn ProgressSink,
        run: &mut RunState,
    ) -> Result<()> {
        for stage in Stage::ALL {
            progress.report(ProgressUpdate::new(
                stage,
                stage.enter_progress(),
                stage.start_message(),
            ));

            let context = stage_input(stage, request, &run.results)
                .map_err(|e| OrchestratorError::phase_failed(stage, e))?;
            debug!(stage = %stage, keys = context.len(), "Assembled stage input");

            let prompt = prompt_for(stage);
            let phase_request = PhaseRequest {
                stage,
                task_description: prompt.task_description.to_string(),
                expected_output: prompt.expected_output.to_string(),
                context,
            };

            info!(stage = %stage, "Stage started");
            let stage_started = Instant::now();
            let outcome = self.executors.for_stage(stage).execute(phase_request).await;
            let elapsed = stage_started.elapsed().as_secs_f64();

            let mut result = outcome.map_err(|e| {
                error!(stage = %stage, kind = %e.kind, error = %e.message, "Stage failed");
                OrchestratorError::phase_failed(stage, e)
            })?;

            fallback::normalize(stage, &mut result);
            run.results.insert(stage, result);
            run.stage_times.insert(stage, elapsed);
            info!(stage = %stage, elapsed, "Stage finished");

            progress.report(ProgressUpdate::new(
                stage,
                stage.exit_progress(),
                stage.finish_message(),
            ));
        }

        Ok(())
    }
}

/// Build the context for `stage`: the original request, every prior result
/// under its result key, and the stage's derived fields.
///
/// A derived field that is present but of the wrong shape fails the stage.
pub fn stage_input(
    stage: Stage,
    request: &WorkflowRequest,
    results: &StageResults,
) -> std::result::Result<Map<String, Value>, PhaseError> {
    let mut input = request.clone();
    for (prior, result) in results.range(..stage) {
        input.insert(prior.result_key().to_string(), Value::Object(result.clone()));
    }

    match stage {
        Stage::Research | Stage::Analysis => {}
        Stage::Implementation => {
            let requirements = derived_list(results.get(&Stage::Analysis), &["recommendations"])?;
            input.insert("requirements".to_string(), requirements);
        }
        Stage::Qa => {
            let implementation = results.get(&Stage::Implementation);
            let implementations = derived_list(implementation, &["implementations"])?;
            let architecture = implementation
                .and_then(|r| r.get("plan"))
                .and_then(|plan| plan.get("architecture"))
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            let test_requirements = request
                .get("test_requirements")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));

            input.insert("implementations".to_string(), implementations);
            input.insert("architecture".to_string(), architecture);
            input.insert("test_requirements".to_string(), test_requirements);
        }
    }

    Ok(input)
}

/// A list-valued field of a prior result. Missing → empty list.
fn derived_list(
    result: Option<&PhaseResult>,
    path: &[&str],
) -> std::result::Result<Value, PhaseError> {
    let mut current = result.map(|r| Value::Object(r.clone()));
    for key in path {
        current = current.and_then(|v| v.get(*key).cloned());
    }

    match current {
        None | Some(Value::Null) => Ok(Value::Array(Vec::new())),
        Some(list @ Value::Array(_)) => Ok(list),
        Some(other) => Err(PhaseError::invalid_output(format!(
            "expected `{}` to be a list, got {}",
            path.join("."),
            kind_name(&other)
        ))),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
