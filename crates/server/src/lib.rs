pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Crewflow API",
        version = "0.1.0",
        description = "Sequential research, analysis, implementation and QA workflow orchestration"
    ),
    paths(
        routes::health_check,
        routes::execute_workflow,
        routes::workflow_status,
        routes::get_workflow,
        routes::event_stream::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::ExecuteResponse,
        error::ErrorResponse,
        crewflow_core::ExecutionState,
        crewflow_core::ExecutionStatus,
        crewflow_core::ProgressPhase,
        crewflow_core::Stage,
        crewflow_core::ImplementationStatus,
        crewflow_core::ErrorReport,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "workflows", description = "Workflow execution and status streaming"),
        (name = "events", description = "Real-time lifecycle event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api/openapi.json", ApiDoc::openapi()))
        .route("/health", get(routes::health_check))
        .route("/workflows/{id}", get(routes::get_workflow))
        .route("/workflows/{id}/execute", post(routes::execute_workflow))
        .route("/workflows/{id}/status", get(routes::workflow_status))
        .route("/events", get(routes::event_stream::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
