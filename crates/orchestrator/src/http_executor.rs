//! Phase Executor backed by a remote HTTP service.

use std::time::Duration;

use async_trait::async_trait;
use crewflow_core::PhaseResult;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::PhaseError;
use crate::phase::{PhaseExecutor, PhaseRequest};

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpExecutorConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl HttpExecutorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }
}

/// POSTs each [`PhaseRequest`] as JSON to `<base_url>/phases/<stage>`.
///
/// 5xx responses and transport failures are retried with doubling backoff;
/// everything else fails the stage immediately.
pub struct HttpPhaseExecutor {
    client: reqwest::Client,
    config: HttpExecutorConfig,
}

impl HttpPhaseExecutor {
    pub fn new(config: HttpExecutorConfig) -> Result<Self, PhaseError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PhaseError::transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, request: &PhaseRequest) -> String {
        format!(
            "{}/phases/{}",
            self.config.base_url.trim_end_matches('/'),
            request.stage
        )
    }

    async fn with_retry<T, F, Fut>(
        &self,
        operation: F,
        operation_name: &str,
    ) -> Result<T, PhaseError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, PhaseError>>,
    {
        let mut retries = 0;
        let mut backoff = self.config.retry_delay;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() => {
                    if retries >= self.config.max_retries {
                        error!(
                            "{} failed after {} retries: {}",
                            operation_name, retries, e.message
                        );
                        return Err(e);
                    }

                    warn!(
                        "{} failed ({}), retrying in {}ms (attempt {}/{})",
                        operation_name,
                        e.kind,
                        backoff.as_millis(),
                        retries + 1,
                        self.config.max_retries
                    );

                    tokio::time::sleep(backoff).await;
                    retries += 1;
                    backoff = (backoff * 2).min(MAX_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        request: &PhaseRequest,
    ) -> Result<PhaseResult, PhaseError> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| classify(request, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PhaseError::http(
                status.as_u16(),
                format!("{} executor returned {}: {}", request.stage, status, body),
            ));
        }

        let body: Value = response.json().await.map_err(|e| {
            PhaseError::invalid_output(format!(
                "{} executor returned invalid JSON: {}",
                request.stage, e
            ))
        })?;

        match body {
            Value::Object(map) => Ok(map),
            other => Err(PhaseError::invalid_output(format!(
                "{} executor returned a non-object result: {}",
                request.stage, other
            ))),
        }
    }
}

fn classify(request: &PhaseRequest, e: reqwest::Error) -> PhaseError {
    if e.is_timeout() {
        PhaseError::timeout(format!("{} executor request timeout: {}", request.stage, e))
    } else {
        PhaseError::transport(format!("{} executor unreachable: {}", request.stage, e))
    }
}

#[async_trait]
impl PhaseExecutor for HttpPhaseExecutor {
    async fn execute(&self, request: PhaseRequest) -> Result<PhaseResult, PhaseError> {
        let url = self.endpoint(&request);
        debug!(stage = %request.stage, url = %url, "Calling phase executor");

        let operation_name = format!("phase {}", request.stage);
        self.with_retry(|| self.send_once(&url, &request), &operation_name)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crewflow_core::Stage;
    use serde_json::{json, Map};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(stage: Stage) -> PhaseRequest {
        let mut context = Map::new();
        context.insert("topics".to_string(), json!(["A"]));
        PhaseRequest {
            stage,
            task_description: "Research".to_string(),
            expected_output: "Findings".to_string(),
            context,
        }
    }

    fn executor(server: &MockServer, max_retries: u32) -> HttpPhaseExecutor {
        HttpPhaseExecutor::new(
            HttpExecutorConfig::new(server.uri())
                .with_retries(max_retries, Duration::from_millis(10))
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_posts_request_and_returns_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/phases/research"))
            .and(body_partial_json(json!({
                "stage": "research",
                "context": {"topics": ["A"]}
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"summary": {"key_findings": []}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let result = executor(&server, 0)
            .execute(request(Stage::Research))
            .await
            .unwrap();
        assert!(result.contains_key("summary"));
    }

    #[tokio::test]
    async fn test_retries_server_errors_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/phases/qa"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = executor(&server, 2)
            .execute(request(Stage::Qa))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "http_503");
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad context"))
            .expect(1)
            .mount(&server)
            .await;

        let err = executor(&server, 3)
            .execute(request(Stage::Analysis))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "http_422");
        assert!(err.message.contains("bad context"));
    }

    #[tokio::test]
    async fn test_non_object_body_is_invalid_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["not", "an", "object"])))
            .mount(&server)
            .await;

        let err = executor(&server, 0)
            .execute(request(Stage::Implementation))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "invalid_output");
    }

    #[tokio::test]
    async fn test_slow_executor_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let err = executor(&server, 0)
            .execute(request(Stage::Research))
            .await
            .unwrap_err();
        assert_eq!(err.kind, "timeout");
        assert!(err.message.contains("timeout"));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let result = executor(&server, 1)
            .execute(request(Stage::Research))
            .await
            .unwrap();
        assert_eq!(result["ok"], true);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let executor =
            HttpPhaseExecutor::new(HttpExecutorConfig::new("http://localhost:9000/")).unwrap();
        assert_eq!(
            executor.endpoint(&request(Stage::Qa)),
            "http://localhost:9000/phases/qa"
        );
    }
}
