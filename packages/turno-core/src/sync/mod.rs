/// Local/remote synchronization, plus the wire types shared between the
/// document server (backend) and its clients.
///
/// Listener protocol (WebSocket, JSON text frames):
///   Server sends Snapshot { id, document } with the current state on
///   connect, when the document exists, then one Snapshot per accepted
///   change. ServerError ends the stream.
pub mod clock;
pub mod debounce;
pub mod document;
pub mod echo;
pub mod engine;
pub mod memory;
pub mod pointer;
pub mod remote;
pub mod session;

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;
use document::Document;

/// Id used in listener messages for the singleton pointer document.
pub const POINTER_DOCUMENT_ID: &str = "pointer";

/// Messages sent from the document server to a listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Snapshot { id: String, document: Document },
    ServerError { message: String },
}

/// Change feed entry (SSE `/events`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChangeEvent {
    #[serde(rename_all = "camelCase")]
    ReportChanged { id: String, updated_at: Timestamp },
    #[serde(rename_all = "camelCase")]
    PointerChanged { current_id: String, updated_at: Timestamp },
}

/// Reply to a document write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertResponse {
    pub applied: bool,
    /// `updatedAt` of the stored document after the write.
    pub updated_at: Timestamp,
}

/// Reply to `GET /reports/latest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatestReport {
    pub id: String,
    pub document: Document,
}

/// Entry of the report listing, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub updated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::ServerError {
            message: "gone".to_string(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"type": "ServerError", "message": "gone"}));

        let parsed: ServerMessage = serde_json::from_value(json!({
            "type": "Snapshot",
            "id": "2025-01-10_A",
            "document": {"updatedAt": 7}
        }))
        .unwrap();
        match parsed {
            ServerMessage::Snapshot { id, document } => {
                assert_eq!(id, "2025-01-10_A");
                assert_eq!(document.updated_at(), Timestamp(7));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_change_event_shape() {
        let event = ChangeEvent::PointerChanged {
            current_id: "2025-01-10_A".to_string(),
            updated_at: Timestamp(3),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"kind": "pointerChanged", "currentId": "2025-01-10_A", "updatedAt": 3})
        );
    }
}
