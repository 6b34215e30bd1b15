//! Fallback adapter for phase outputs that arrive as free-form text.
//!
//! Executors are expected to return structured sequences. When a list-valued
//! field comes back as a newline-separated string instead, it is split into
//! lines and the recommendation entries are given ids, priorities and (for
//! qa) categories inferred from their wording.

use std::sync::OnceLock;

use crewflow_core::{PhaseResult, Priority, Recommendation, Stage};
use regex::Regex;
use serde_json::Value;
use tracing::debug;

static PRIORITY_WORD: OnceLock<Option<Regex>> = OnceLock::new();

fn priority_word() -> Option<&'static Regex> {
    PRIORITY_WORD
        .get_or_init(|| Regex::new(r"(?i)\b(high|medium|low)\b").ok())
        .as_ref()
}

/// Normalize a stage's output in place before it is stored.
pub fn normalize(stage: Stage, result: &mut PhaseResult) {
    match stage {
        Stage::Research => {
            if let Some(Value::Object(summary)) = result.get_mut("summary") {
                split_field(summary, "key_findings");
            }
        }
        Stage::Analysis => {
            if let Some(Value::Object(insights)) = result.get_mut("insights") {
                split_field(insights, "key_insights");
            }
            structure_recommendations(result, "REC", analysis_recommendation);
        }
        Stage::Implementation => {}
        Stage::Qa => structure_recommendations(result, "QA_REC", qa_recommendation),
    }
}

/// Split a string into trimmed, non-empty lines.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn split_field(map: &mut serde_json::Map<String, Value>, key: &str) {
    if let Some(Value::String(text)) = map.get(key) {
        let lines: Vec<Value> = split_lines(text).into_iter().map(Value::String).collect();
        debug!(field = key, lines = lines.len(), "Split free-form text field");
        map.insert(key.to_string(), Value::Array(lines));
    }
}

/// Replace bare-text recommendations with structured entries. Entries that
/// are already objects are left untouched.
fn structure_recommendations(
    result: &mut PhaseResult,
    prefix: &str,
    build: fn(String, String) -> Recommendation,
) {
    let items: Vec<Value> = match result.get("recommendations") {
        Some(Value::String(text)) => split_lines(text).into_iter().map(Value::String).collect(),
        Some(Value::Array(items)) if items.iter().any(Value::is_string) => items.clone(),
        _ => return,
    };

    let structured: Vec<Value> = items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match item {
            Value::String(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    return None;
                }
                serde_json::to_value(build(format!("{}_{}", prefix, idx), text)).ok()
            }
            other => Some(other),
        })
        .collect();

    debug!(
        prefix,
        count = structured.len(),
        "Structured free-form recommendations"
    );
    result.insert("recommendations".to_string(), Value::Array(structured));
}

fn analysis_recommendation(id: String, text: String) -> Recommendation {
    let priority = infer_stated_priority(&text);
    Recommendation::new(id, text, priority)
}

fn qa_recommendation(id: String, text: String) -> Recommendation {
    let category = infer_category(&text);
    let priority = infer_severity(&text);
    Recommendation::new(id, text, priority).with_field("category", category)
}

/// Priority stated in the text itself; `medium` when none is named.
pub fn infer_stated_priority(text: &str) -> Priority {
    priority_word()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .and_then(|m| Priority::parse(&m.as_str().to_lowercase()))
        .unwrap_or(Priority::Medium)
}

/// Category of a qa recommendation, by keyword.
pub fn infer_category(text: &str) -> &'static str {
    let lower = text.to_lowercase();
    let has_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if has_any(&["security", "vulnerability", "risk"]) {
        "security"
    } else if has_any(&["performance", "speed", "optimization"]) {
        "performance"
    } else if has_any(&["test", "coverage", "assertion"]) {
        "testing"
    } else {
        "general"
    }
}

/// Priority of a qa recommendation, by severity wording.
pub fn infer_severity(text: &str) -> Priority {
    let lower = text.to_lowercase();
    let has_any = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if has_any(&["critical", "severe", "urgent"]) {
        Priority::High
    } else if has_any(&["important", "significant"]) {
        Priority::Medium
    } else {
        Priority::Low
    }
}
