use axum::{
    extract::State,
    response::{sse::Event, Json, Sse},
};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use turno_core::sync::ChangeEvent;

use crate::state::AppState;
use crate::store::StoreEvent;

fn change_event(event: StoreEvent) -> ChangeEvent {
    match event {
        StoreEvent::Report { id, document } => ChangeEvent::ReportChanged {
            id,
            updated_at: document.updated_at(),
        },
        StoreEvent::Pointer { document } => ChangeEvent::PointerChanged {
            current_id: document
                .fields()
                .get("currentId")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            updated_at: document.updated_at(),
        },
    }
}

/// SSE endpoint: streams accepted changes as JSON to connected clients.
pub async fn sse_events(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.store.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let json = serde_json::to_string(&change_event(event)).unwrap_or_default();
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    // Keep-alive every 30 seconds
    let stream = stream.merge(tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(
            std::time::Duration::from_secs(30),
        )),
        |_| Ok(Event::default().comment("keep-alive")),
    ));

    Sse::new(stream)
}

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "running",
        "port": state.port,
        "bind_address": state.bind_address,
        "collection": state.store.collection(),
        "reports": state.store.report_count(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use turno_core::types::Timestamp;

    #[test]
    fn test_store_events_map_to_change_feed() {
        let document = serde_json::from_value(json!({"currentId": "2025-01-10_A", "updatedAt": 4})).unwrap();
        assert_eq!(
            change_event(StoreEvent::Pointer { document }),
            ChangeEvent::PointerChanged {
                current_id: "2025-01-10_A".to_string(),
                updated_at: Timestamp(4),
            }
        );
    }
}
