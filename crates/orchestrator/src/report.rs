//! Report Compiler: turns accumulated stage results into the final report,
//! metrics, or an error report.

use std::collections::BTreeMap;

use crewflow_core::{
    DetailedResults, ErrorReport, FinalReport, ImplementationDetails, ImplementationStatus,
    PhaseResult, Priority, Recommendation, ReportSummary, Stage, StageResults, WorkflowMetrics,
};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::PhaseError;

const MIN_LINE_COVERAGE: f64 = 80.0;

const STEP_NEEDS_IMPROVEMENT: &str = "Address failed test cases and critical issues";
const STEP_PARTIAL: &str = "Resolve remaining test failures and warnings";
const STEP_COVERAGE: &str = "Improve test coverage to meet minimum requirements";
const STEP_SECURITY: &str = "Address high-priority security issues";

/// Keyword-triggered remediations, checked in order; at most one applies.
const ERROR_REMEDIATIONS: [(&str, &str); 3] = [
    ("timeout", "Consider increasing timeout limits"),
    ("memory", "Review memory allocation and resource usage"),
    ("permission", "Verify service account permissions"),
];

/// Stateless view over one run's accumulated results.
pub struct ReportCompiler<'a> {
    results: &'a StageResults,
}

impl<'a> ReportCompiler<'a> {
    pub fn new(results: &'a StageResults) -> Self {
        Self { results }
    }

    fn stage(&self, stage: Stage) -> Option<&'a PhaseResult> {
        self.results.get(&stage)
    }

    fn qa_report(&self) -> Option<&'a Map<String, Value>> {
        self.stage(Stage::Qa)
            .and_then(|qa| qa.get("report"))
            .and_then(Value::as_object)
    }

    /// Verdict from the qa stage's `test_results`.
    ///
    /// No results → `unknown`; none failed → `successful`; fewer than a third
    /// failed → `partial`; otherwise `needs_improvement`.
    pub fn implementation_status(&self) -> ImplementationStatus {
        let tests = self
            .stage(Stage::Qa)
            .and_then(|qa| qa.get("test_results"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if tests.is_empty() {
            return ImplementationStatus::Unknown;
        }

        let failed = tests
            .iter()
            .filter(|t| t.get("status").and_then(Value::as_str) == Some("failed"))
            .count();

        if failed == 0 {
            ImplementationStatus::Successful
        } else if 3 * failed < tests.len() {
            ImplementationStatus::Partial
        } else {
            ImplementationStatus::NeedsImprovement
        }
    }

    /// Analysis then qa recommendations, each tagged with its phase, stably
    /// sorted high → medium → low → anything else.
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut merged: Vec<Recommendation> = [Stage::Analysis, Stage::Qa]
            .into_iter()
            .flat_map(|stage| self.stage_recommendations(stage))
            .collect();

        merged.sort_by_key(Recommendation::priority_rank);
        merged
    }

    fn stage_recommendations(&self, stage: Stage) -> Vec<Recommendation> {
        let Some(items) = self
            .stage(stage)
            .and_then(|r| r.get("recommendations"))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| {
                let rec = Recommendation::from_stage_output(item, stage);
                if rec.is_none() {
                    warn!(stage = %stage, "Skipping recommendation that is not an object");
                }
                rec
            })
            .collect()
    }

    pub fn next_steps(&self) -> Vec<String> {
        let mut steps = Vec::new();

        match self.implementation_status() {
            ImplementationStatus::NeedsImprovement => steps.push(STEP_NEEDS_IMPROVEMENT),
            ImplementationStatus::Partial => steps.push(STEP_PARTIAL),
            _ => {}
        }

        let line_coverage = self
            .qa_report()
            .and_then(|report| report.get("test_coverage"))
            .and_then(|coverage| coverage.get("line_coverage"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        if line_coverage < MIN_LINE_COVERAGE {
            steps.push(STEP_COVERAGE);
        }

        let security_issue = self
            .stage_recommendations(Stage::Qa)
            .iter()
            .any(|rec| rec.category() == Some("security") && rec.is_priority(Priority::High));
        if security_issue {
            steps.push(STEP_SECURITY);
        }

        steps.into_iter().map(str::to_string).collect()
    }

    pub fn final_report(&self, total_execution_time: f64) -> FinalReport {
        let research_summary = field(self.stage(Stage::Research), "summary");
        let analysis_insights = field(self.stage(Stage::Analysis), "insights");
        let documentation = field(self.stage(Stage::Implementation), "documentation");
        let qa_report = self
            .qa_report()
            .cloned()
            .map(Value::Object)
            .unwrap_or_else(empty_object);

        FinalReport {
            summary: ReportSummary {
                research_findings: list(&research_summary, "key_findings"),
                analysis_insights: list(&analysis_insights, "key_insights"),
                implementation_status: self.implementation_status(),
                quality_metrics: self.quality_metrics(),
                total_execution_time,
            },
            detailed_results: DetailedResults {
                research: research_summary,
                analysis: analysis_insights,
                implementation: ImplementationDetails {
                    architecture: documentation
                        .get("architecture_overview")
                        .cloned()
                        .unwrap_or_else(empty_object),
                    api_documentation: text_or_empty(&documentation, "api_documentation"),
                    guide: text_or_empty(&documentation, "implementation_guide"),
                },
                quality_assurance: qa_report,
            },
            recommendations: self.recommendations(),
            next_steps: self.next_steps(),
        }
    }

    pub fn metrics(&self, stage_times: &BTreeMap<Stage, f64>) -> WorkflowMetrics {
        WorkflowMetrics {
            execution_time: Stage::ALL
                .iter()
                .map(|stage| (*stage, stage_times.get(stage).copied().unwrap_or(0.0)))
                .collect(),
            quality_metrics: self.quality_metrics(),
            completion_status: self.implementation_status(),
        }
    }

    fn quality_metrics(&self) -> Value {
        self.qa_report()
            .and_then(|report| report.get("metrics"))
            .cloned()
            .unwrap_or_else(empty_object)
    }

    /// First stage, in pipeline order, with no stored result.
    pub fn failed_phase(&self) -> String {
        Stage::ALL
            .iter()
            .find(|stage| !self.results.contains_key(stage))
            .map(|stage| stage.as_str().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn error_report(&self, error: &PhaseError, execution_time: f64) -> ErrorReport {
        ErrorReport {
            error_type: error.kind.clone(),
            error_message: error.message.clone(),
            phase: self.failed_phase(),
            completed_steps: self.results.keys().copied().collect(),
            recommendations: error_recommendations(error),
            execution_time,
        }
    }
}

/// Generic root-cause entry plus at most one keyword-specific remediation.
pub fn error_recommendations(error: &PhaseError) -> Vec<String> {
    let mut recommendations = vec![format!(
        "Investigate root cause of {}: {}",
        error.kind, error.message
    )];

    let lower = error.message.to_lowercase();
    if let Some((_, remediation)) = ERROR_REMEDIATIONS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
    {
        recommendations.push(remediation.to_string());
    }

    recommendations
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn field(result: Option<&PhaseResult>, key: &str) -> Value {
    result
        .and_then(|r| r.get(key))
        .filter(|v| v.is_object())
        .cloned()
        .unwrap_or_else(empty_object)
}

fn list(value: &Value, key: &str) -> Vec<Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn text_or_empty(value: &Value, key: &str) -> Value {
    value
        .get(key)
        .cloned()
        .unwrap_or_else(|| Value::String(String::new()))
}
