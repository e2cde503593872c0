/// `RemoteStore` over the document server's REST and WebSocket routes.
///
/// Listeners are one WS connection each; a dropped connection ends the
/// subscription and is not re-established here.
use futures_util::{SinkExt, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;
use turno_core::sync::document::{validate_document_id, Document};
use turno_core::sync::remote::{RemoteError, RemoteFuture, RemoteStore, Subscription};
use turno_core::sync::{LatestReport, ServerMessage, UpsertResponse};
use turno_core::types::{PointerRecord, ShiftRecord};

const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn transport(e: impl std::fmt::Display) -> RemoteError {
    RemoteError::Transport(e.to_string())
}

pub struct HttpRemote {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn ws_url(&self, path: &str) -> String {
        format!(
            "{}{}",
            self.base_url
                .replacen("http://", "ws://", 1)
                .replacen("https://", "wss://", 1),
            path
        )
    }

    fn report_path(id: &str) -> Result<String, RemoteError> {
        validate_document_id(id)?;
        Ok(format!("/reports/{}", utf8_percent_encode(id, PATH_SEGMENT)))
    }

    /// GET a JSON body; 404 reads as `None`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, RemoteError> {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, message });
        }
        let body = resp
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(Some(body))
    }

    async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, RemoteError> {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(RemoteError::Status { status, message });
        }
        resp.json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// Open a listener and forward decoded snapshots into a subscription.
    async fn listen<T: Send + 'static>(
        &self,
        path: &str,
        decode: fn(&Document) -> Result<T, serde_json::Error>,
    ) -> Result<Subscription<T>, RemoteError> {
        use tokio_tungstenite::tungstenite::Message;

        let url = self.ws_url(path);
        let (ws_stream, _) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(transport)?;
        log::debug!(target: "turno.remote", "Listening on {}", url);

        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(async move {
            let (mut ws_tx, mut ws_rx) = ws_stream.split();
            while let Some(msg) = ws_rx.next().await {
                let text = match msg {
                    Ok(Message::Text(t)) => t.to_string(),
                    Ok(Message::Ping(data)) => {
                        let _ = ws_tx.send(Message::Pong(data)).await;
                        continue;
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        log::warn!(target: "turno.remote", "Listener on {} failed: {}", url, e);
                        break;
                    }
                };

                let parsed: ServerMessage = match serde_json::from_str(&text) {
                    Ok(m) => m,
                    Err(e) => {
                        log::warn!(target: "turno.remote", "Unreadable message on {}: {}", url, e);
                        continue;
                    }
                };
                match parsed {
                    ServerMessage::Snapshot { id, document } => match decode(&document) {
                        Ok(item) => {
                            if tx.send(item).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::warn!(target: "turno.remote", "Undecodable snapshot of {}: {}", id, e);
                        }
                    },
                    ServerMessage::ServerError { message } => {
                        log::error!(target: "turno.remote", "Server error on {}: {}", url, message);
                        break;
                    }
                }
            }
            let _ = ws_tx.close().await;
            log::debug!(target: "turno.remote", "Listener on {} closed", url);
        });

        Ok(Subscription::with_task(rx, task))
    }
}

fn decode_pointer(document: &Document) -> Result<PointerRecord, serde_json::Error> {
    document.decode()
}

impl RemoteStore for HttpRemote {
    fn fetch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Option<ShiftRecord>> {
        Box::pin(async move {
            let path = Self::report_path(id)?;
            match self.get_json::<Document>(&path).await? {
                Some(document) => Ok(Some(document.to_shift_record()?)),
                None => Ok(None),
            }
        })
    }

    fn upsert_report<'a>(&'a self, id: &'a str, record: &'a ShiftRecord) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            let path = Self::report_path(id)?;
            let document = Document::from_record(record)?;
            let response: UpsertResponse = self.put_json(&path, &document).await?;
            Ok(response.applied)
        })
    }

    fn latest_report(&self) -> RemoteFuture<'_, Option<(String, ShiftRecord)>> {
        Box::pin(async move {
            match self.get_json::<LatestReport>("/reports/latest").await? {
                Some(latest) => Ok(Some((latest.id, latest.document.to_shift_record()?))),
                None => Ok(None),
            }
        })
    }

    fn fetch_pointer(&self) -> RemoteFuture<'_, Option<PointerRecord>> {
        Box::pin(async move {
            match self.get_json::<Document>("/pointer").await? {
                Some(document) => Ok(Some(document.decode()?)),
                None => Ok(None),
            }
        })
    }

    fn publish_pointer<'a>(&'a self, pointer: &'a PointerRecord) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            let response: UpsertResponse = self.put_json("/pointer", pointer).await?;
            Ok(response.applied)
        })
    }

    fn watch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Subscription<ShiftRecord>> {
        Box::pin(async move {
            validate_document_id(id)?;
            let path = format!("/listen/reports/{}", utf8_percent_encode(id, PATH_SEGMENT));
            self.listen(&path, Document::to_shift_record).await
        })
    }

    fn watch_pointer(&self) -> RemoteFuture<'_, Subscription<PointerRecord>> {
        Box::pin(async move { self.listen("/listen/pointer", decode_pointer).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::spawn_server;
    use crate::state::AppState;
    use crate::store::DocumentStore;
    use std::sync::Arc;
    use std::time::Duration;
    use turno_core::config::SyncSettings;
    use turno_core::storage::local::LocalStore;
    use turno_core::sync::engine::NoopBridge;
    use turno_core::sync::session::ShiftSession;
    use turno_core::types::{ClientId, HeaderData, RunData, Timestamp};

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_server(dir: &std::path::Path) -> HttpRemote {
        let store = Arc::new(DocumentStore::open(dir, "informes_produccion").unwrap());
        let state = AppState {
            store,
            port: 0,
            bind_address: "127.0.0.1".to_string(),
        };
        let addr = spawn_server(state).await.unwrap();
        HttpRemote::new(&format!("http://{}", addr))
    }

    fn record(ts: u64, origin: &str) -> ShiftRecord {
        ShiftRecord {
            header: HeaderData::new("Shift A", "T1", "2025-01-10"),
            runs: vec![RunData::new("3", "08:00", "10:00", "Vanilla")],
            updated_at: Timestamp(ts),
            origin_client: ClientId(origin.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_rest_and_listener_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let remote = start_server(dir.path()).await;
        let id = "2025-01-10_Shift_A";

        assert!(remote.fetch_report(id).await.unwrap().is_none());
        assert!(remote.latest_report().await.unwrap().is_none());

        let mut sub = remote.watch_report(id).await.unwrap();
        let first = record(10, "a");
        assert!(remote.upsert_report(id, &first).await.unwrap());
        let seen = tokio::time::timeout(WAIT, sub.next()).await.unwrap().unwrap();
        assert_eq!(seen, first);

        assert!(!remote.upsert_report(id, &record(9, "b")).await.unwrap());
        assert_eq!(remote.fetch_report(id).await.unwrap().unwrap(), first);
        assert_eq!(remote.latest_report().await.unwrap().unwrap().0, id);

        let pointer = PointerRecord {
            current_id: id.to_string(),
            updated_at: Timestamp(11),
            origin_client: ClientId("a".to_string()),
        };
        assert!(remote.publish_pointer(&pointer).await.unwrap());
        assert_eq!(remote.fetch_pointer().await.unwrap().unwrap(), pointer);

        let mut pointer_sub = remote.watch_pointer().await.unwrap();
        let current = tokio::time::timeout(WAIT, pointer_sub.next()).await.unwrap().unwrap();
        assert_eq!(current.current_id, id);
    }

    #[tokio::test]
    async fn test_server_rejects_bad_ids() {
        let dir = tempfile::tempdir().unwrap();
        let remote = start_server(dir.path()).await;

        assert!(matches!(
            remote.fetch_report("../etc").await,
            Err(RemoteError::InvalidId(_))
        ));
        let resp = reqwest::get(format!("{}/reports/.hidden", remote.base_url()))
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

        let status: serde_json::Value = reqwest::get(format!("{}/status", remote.base_url()))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["status"], "running");
    }

    #[tokio::test]
    async fn test_sessions_converge_through_server() {
        let dir = tempfile::tempdir().unwrap();
        let base = start_server(dir.path()).await.base_url().to_string();
        let settings = SyncSettings {
            debounce_ms: 50,
            periodic_push_secs: 0,
            remote_url: base.clone(),
        };
        let session = |name: &str| {
            ShiftSession::new(
                ClientId(name.to_string()),
                LocalStore::in_memory(),
                Arc::new(HttpRemote::new(&base)),
                Arc::new(NoopBridge),
                settings.clone(),
            )
        };

        let a = session("a");
        a.set_header("Shift A", "T1", "2025-01-10").await.unwrap();
        a.start().await;

        let b = session("b");
        b.start().await;
        assert_eq!(b.active_key().unwrap().id(), "2025-01-10_Shift_A");

        let trigger = a
            .editor()
            .add_run(&RunData::new("3", "08:00", "10:00", "Vanilla"))
            .unwrap();
        a.dispatch(trigger).await;

        let converged = tokio::time::timeout(WAIT, async {
            while b.store().runs().is_empty() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;
        assert!(converged.is_ok());
        assert_eq!(b.store().runs(), a.store().runs());
    }
}
