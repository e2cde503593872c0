/// WebSocket document listeners.
///
/// Protocol:
///   Client connects to /listen/reports/{id} or /listen/pointer.
///   Server sends Snapshot { id, document } with the current state, when the
///   document exists, then one Snapshot per accepted change.
///   The client only ever sends Close (and Pong).
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use turno_core::sync::document::{validate_document_id, Document};
use turno_core::sync::{ServerMessage, POINTER_DOCUMENT_ID};

use crate::api::ErrorResponse;
use crate::state::AppState;
use crate::store::{DocumentStore, StoreEvent};

/// What one listener follows.
#[derive(Debug, Clone)]
enum Watched {
    Report(String),
    Pointer,
}

impl Watched {
    fn id(&self) -> &str {
        match self {
            Watched::Report(id) => id,
            Watched::Pointer => POINTER_DOCUMENT_ID,
        }
    }

    fn current(&self, store: &DocumentStore) -> Option<Document> {
        match self {
            Watched::Report(id) => store.get_report(id).ok().flatten(),
            Watched::Pointer => store.get_pointer(),
        }
    }

    fn matching(&self, event: StoreEvent) -> Option<Document> {
        match (self, event) {
            (Watched::Report(wanted), StoreEvent::Report { id, document }) if *wanted == id => {
                Some(document)
            }
            (Watched::Pointer, StoreEvent::Pointer { document }) => Some(document),
            _ => None,
        }
    }
}

// ── Router + Handler ────────────────────────────────────────────────────────

pub fn listen_router() -> Router<AppState> {
    Router::new()
        .route("/listen/reports/{report_id}", get(report_listener))
        .route("/listen/pointer", get(pointer_listener))
}

async fn report_listener(
    ws: WebSocketUpgrade,
    Path(report_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if let Err(e) = validate_document_id(&report_id) {
        log::warn!(target: "turno.listen", "Rejected listener: {}", e);
        let body = Json(ErrorResponse {
            error: e.to_string(),
        });
        return (StatusCode::BAD_REQUEST, body).into_response();
    }
    ws.on_upgrade(move |socket| run_listener(socket, Watched::Report(report_id), state))
}

async fn pointer_listener(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| run_listener(socket, Watched::Pointer, state))
}

async fn send_snapshot(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    watched: &Watched,
    document: Document,
) -> bool {
    let msg = ServerMessage::Snapshot {
        id: watched.id().to_string(),
        document,
    };
    let text = match serde_json::to_string(&msg) {
        Ok(text) => text,
        Err(e) => {
            log::error!(target: "turno.listen", "Failed to encode snapshot: {}", e);
            return true;
        }
    };
    ws_tx.send(Message::Text(text.into())).await.is_ok()
}

async fn run_listener(socket: WebSocket, watched: Watched, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Subscribe before reading the snapshot so no change falls in between.
    let mut events = state.store.subscribe();
    log::info!(target: "turno.listen", "Listener attached to {}", watched.id());

    if let Some(document) = watched.current(&state.store) {
        if !send_snapshot(&mut ws_tx, &watched, document).await {
            return;
        }
    }

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Some(document) = watched.matching(event) {
                        if !send_snapshot(&mut ws_tx, &watched, document).await {
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!(
                        target: "turno.listen",
                        "Listener on {} lagged by {} events, resending snapshot",
                        watched.id(),
                        skipped
                    );
                    if let Some(document) = watched.current(&state.store) {
                        if !send_snapshot(&mut ws_tx, &watched, document).await {
                            break;
                        }
                    }
                }
                Err(RecvError::Closed) => {
                    let msg = ServerMessage::ServerError {
                        message: "Server shutting down".to_string(),
                    };
                    if let Ok(text) = serde_json::to_string(&msg) {
                        let _ = ws_tx.send(Message::Text(text.into())).await;
                    }
                    break;
                }
            },
            msg = ws_rx.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            },
        }
    }

    log::info!(target: "turno.listen", "Listener detached from {}", watched.id());
}
