use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use crewflow_core::{parse_request, ExecutionState};
use futures::stream::StreamExt;
use orchestrator::{Acknowledgement, StatusEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

pub const SSE_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExecuteResponse {
    pub workflow_id: String,
    pub status: String,
}

impl From<Acknowledgement> for ExecuteResponse {
    fn from(ack: Acknowledgement) -> Self {
        Self {
            workflow_id: ack.workflow_id,
            status: ack.status,
        }
    }
}

fn status_to_sse_event(event: &StatusEvent) -> Result<Event, Infallible> {
    Ok(Event::default()
        .event(event.name())
        .data(event.data().to_string()))
}

#[utoipa::path(
    post,
    path = "/workflows/{id}/execute",
    params(
        ("id" = String, Path, description = "Caller-chosen workflow ID"),
    ),
    request_body(content = Object, description = "Workflow request payload"),
    responses(
        (status = 202, description = "Workflow accepted", body = ExecuteResponse),
        (status = 400, description = "Payload is not a JSON object", body = ErrorResponse),
        (status = 409, description = "Workflow ID already live", body = ErrorResponse),
    ),
    tag = "workflows"
)]
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<ExecuteResponse>), AppError> {
    let request = parse_request(payload)?;
    let ack = state.workflows.start(&id, request)?;
    Ok((StatusCode::ACCEPTED, Json(ack.into())))
}

#[utoipa::path(
    get,
    path = "/workflows/{id}/status",
    params(
        ("id" = String, Path, description = "Workflow ID"),
    ),
    responses(
        (status = 200, description = "SSE stream of progress, complete, error and expired events"),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
    ),
    tag = "workflows"
)]
pub async fn workflow_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let stream = state
        .workflows
        .status(&id)?
        .map(|event| status_to_sse_event(&event));

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    ))
}

#[utoipa::path(
    get,
    path = "/workflows/{id}",
    params(
        ("id" = String, Path, description = "Workflow ID"),
    ),
    responses(
        (status = 200, description = "Current execution state", body = ExecutionState),
        (status = 404, description = "Workflow not found", body = ErrorResponse),
    ),
    tag = "workflows"
)]
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionState>, AppError> {
    let snapshot = state.workflows.snapshot(&id)?;
    Ok(Json(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_response_from_ack() {
        let ack = Acknowledgement {
            workflow_id: "wf-1".to_string(),
            status: "accepted".to_string(),
        };
        let response = ExecuteResponse::from(ack);
        assert_eq!(response.workflow_id, "wf-1");
        assert_eq!(response.status, "accepted");
    }
}
