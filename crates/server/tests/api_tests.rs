use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use crewflow_core::{PhaseResult, Stage};
use orchestrator::{PhaseError, PhaseExecutor, PhaseExecutors, PhaseRequest};
use serde_json::{json, Value};
use server::config::ServiceConfig;
use server::{create_router, state::AppState};
use wiremock::matchers::{method, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Returns `{}` for every stage except `fail_on`.
struct StubExecutor {
    fail_on: Option<Stage>,
    qa_output: Value,
}

#[async_trait]
impl PhaseExecutor for StubExecutor {
    async fn execute(&self, request: PhaseRequest) -> Result<PhaseResult, PhaseError> {
        if self.fail_on == Some(request.stage) {
            return Err(PhaseError::timeout("research executor timeout"));
        }
        match (&request.stage, &self.qa_output) {
            (Stage::Qa, Value::Object(map)) => Ok(map.clone()),
            _ => Ok(PhaseResult::new()),
        }
    }
}

fn test_config() -> ServiceConfig {
    ServiceConfig {
        status_poll_interval_ms: 20,
        cleanup_grace_secs: 5,
        ..Default::default()
    }
}

fn setup_test_server_with(executor: StubExecutor) -> TestServer {
    let state = AppState::with_executors(
        PhaseExecutors::uniform(Arc::new(executor)),
        &test_config(),
    );
    TestServer::new(create_router(state)).expect("Failed to create test server")
}

fn setup_test_server() -> TestServer {
    setup_test_server_with(StubExecutor {
        fail_on: None,
        qa_output: json!({}),
    })
}

/// Pull `data:` payloads of SSE events named `name` out of a response body.
fn sse_payloads(body: &str, name: &str) -> Vec<Value> {
    body.split("\n\n")
        .filter(|block| block.lines().any(|l| l == format!("event: {}", name)))
        .filter_map(|block| {
            block
                .lines()
                .find_map(|l| l.strip_prefix("data: "))
                .and_then(|data| serde_json::from_str(data).ok())
        })
        .collect()
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = setup_test_server();

        let response = server.get("/health").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert!(body["version"].is_string());
        assert_eq!(body["active_workflows"], 0);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let server = setup_test_server();

        let response = server.get("/api/openapi.json").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["paths"]["/workflows/{id}/execute"].is_object());
    }
}

mod execute {
    use super::*;

    #[tokio::test]
    async fn test_execute_returns_202_accepted() {
        let server = setup_test_server();

        let response = server
            .post("/workflows/wf-1/execute")
            .json(&json!({"topics": ["A"]}))
            .await;

        response.assert_status(axum::http::StatusCode::ACCEPTED);
        let body: Value = response.json();
        assert_eq!(body["workflow_id"], "wf-1");
        assert_eq!(body["status"], "accepted");
    }

    #[tokio::test]
    async fn test_duplicate_id_returns_409() {
        let server = setup_test_server();

        server
            .post("/workflows/wf-dup/execute")
            .json(&json!({}))
            .await
            .assert_status(axum::http::StatusCode::ACCEPTED);

        let response = server
            .post("/workflows/wf-dup/execute")
            .json(&json!({}))
            .await;

        response.assert_status(axum::http::StatusCode::CONFLICT);
        let body: Value = response.json();
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_non_object_payload_returns_400() {
        let server = setup_test_server();

        let response = server
            .post("/workflows/wf-1/execute")
            .json(&json!(["not", "an", "object"]))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["error"], "bad_request");

        server.get("/workflows/wf-1").await.assert_status_not_found();
    }
}

mod status {
    use super::*;

    #[tokio::test]
    async fn test_unknown_workflow_returns_404() {
        let server = setup_test_server();

        let response = server.get("/workflows/never-submitted/status").await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_snapshot_of_live_workflow() {
        let server = setup_test_server();
        server
            .post("/workflows/wf-snap/execute")
            .json(&json!({"topics": ["A"]}))
            .await;

        let response = server.get("/workflows/wf-snap").await;

        response.assert_status_ok();
        let body: Value = response.json();
        assert!(body["status"].is_string());
        let progress = body["progress"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&progress));
    }

    #[tokio::test]
    async fn test_stream_ends_with_complete_event() {
        let server = setup_test_server_with(StubExecutor {
            fail_on: None,
            qa_output: json!({
                "test_results": [
                    {"status": "passed"}, {"status": "passed"},
                    {"status": "passed"}, {"status": "failed"}
                ],
                "report": {"test_coverage": {"line_coverage": 95}}
            }),
        });
        server
            .post("/workflows/wf-ok/execute")
            .json(&json!({"topics": ["A"]}))
            .await;

        let response = server.get("/workflows/wf-ok/status").await;

        response.assert_status_ok();
        let body = response.text();
        let progress = sse_payloads(&body, "progress");
        assert!(!progress.is_empty());
        assert_eq!(progress.last().unwrap()["status"], "completed");

        let complete = sse_payloads(&body, "complete");
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0]["summary"]["implementation_status"], "partial");
        assert_eq!(
            complete[0]["next_steps"],
            json!(["Resolve remaining test failures and warnings"])
        );
        assert!(sse_payloads(&body, "error").is_empty());
    }

    #[tokio::test]
    async fn test_stream_reports_failure_once() {
        let server = setup_test_server_with(StubExecutor {
            fail_on: Some(Stage::Research),
            qa_output: json!({}),
        });
        server
            .post("/workflows/wf-fail/execute")
            .json(&json!({}))
            .await;

        let response = server.get("/workflows/wf-fail/status").await;

        let body = response.text();
        let errors = sse_payloads(&body, "error");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["error"], "research executor timeout");
        assert_eq!(errors[0]["error_report"]["phase"], "research");
        assert_eq!(
            errors[0]["error_report"]["recommendations"][1],
            "Consider increasing timeout limits"
        );
        assert!(sse_payloads(&body, "complete").is_empty());

        let snapshot: Value = server.get("/workflows/wf-fail").await.json();
        assert_eq!(snapshot["status"], "failed");
        assert_eq!(snapshot["current_phase"], "error");
    }
}

mod remote_executor {
    use super::*;

    #[tokio::test]
    async fn test_workflow_runs_against_http_executor() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/phases/(research|analysis|implementation|qa)$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(4)
            .mount(&mock)
            .await;

        let config = ServiceConfig {
            executor_url: mock.uri(),
            executor_timeout_secs: 5,
            ..test_config()
        };
        let state = AppState::from_config(&config).expect("Failed to build state");
        let server = TestServer::new(create_router(state)).expect("Failed to create test server");

        server
            .post("/workflows/wf-remote/execute")
            .json(&json!({"topics": ["A"]}))
            .await
            .assert_status(axum::http::StatusCode::ACCEPTED);

        let body = tokio::time::timeout(Duration::from_secs(10), async {
            server.get("/workflows/wf-remote/status").await.text()
        })
        .await
        .expect("status stream did not terminate");

        let complete = sse_payloads(&body, "complete");
        assert_eq!(complete.len(), 1);
        assert_eq!(complete[0]["summary"]["implementation_status"], "unknown");
    }
}
