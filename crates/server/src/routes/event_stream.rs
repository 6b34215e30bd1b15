use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use utoipa::IntoParams;

use super::workflows::SSE_KEEP_ALIVE_INTERVAL;
use crate::state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
pub struct EventsQuery {
    /// Comma-separated workflow IDs; all workflows when absent.
    pub workflow_ids: Option<String>,
}

fn parse_workflow_ids(workflow_ids: Option<&str>) -> Option<Vec<String>> {
    workflow_ids.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn envelope_to_sse_event(envelope: &events::EventEnvelope) -> Result<Event, Infallible> {
    let data = serde_json::to_string(&envelope).unwrap_or_else(|_| "{}".to_string());

    Ok(Event::default()
        .id(envelope.id.to_string())
        .event(envelope.event.event_type())
        .data(data))
}

#[utoipa::path(
    get,
    path = "/events",
    params(EventsQuery),
    responses(
        (status = 200, description = "SSE stream of workflow lifecycle events"),
    ),
    tag = "events"
)]
pub async fn events_stream(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let workflow_ids = parse_workflow_ids(query.workflow_ids.as_deref());
    let rx = state.event_bus.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let workflow_ids = workflow_ids.clone();
        async move {
            match result {
                Ok(envelope) => {
                    if let (Some(ids), Some(id)) = (&workflow_ids, envelope.event.workflow_id()) {
                        if !ids.iter().any(|wanted| wanted == id) {
                            return None;
                        }
                    }
                    Some(envelope_to_sse_event(&envelope))
                }
                Err(e) => {
                    tracing::warn!("SSE broadcast error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(SSE_KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workflow_ids_none() {
        assert!(parse_workflow_ids(None).is_none());
    }

    #[test]
    fn test_parse_workflow_ids_trims_and_drops_empty() {
        let ids = parse_workflow_ids(Some(" wf-1, ,wf-2 ")).unwrap();
        assert_eq!(ids, vec!["wf-1", "wf-2"]);
    }
}
