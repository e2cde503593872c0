/// Headless client: follows the shift the group is working on and keeps a
/// file-backed replica of it, configured from client.json.
use std::sync::Arc;

use turno_core::config::{self, ClientConfig};
use turno_core::storage::local::LocalStore;
use turno_core::storage::StorageError;
use turno_core::sync::engine::RenderBridge;
use turno_core::sync::session::ShiftSession;
use turno_core::types::{ClientId, ShiftRecord};

use crate::remote_client::HttpRemote;

/// Logs each applied record instead of drawing it.
pub struct LogView;

impl RenderBridge for LogView {
    fn cancel_edit_session(&self) -> bool {
        false
    }

    fn redraw(&self, record: &ShiftRecord) {
        log::info!(
            target: "turno.client",
            "{} {} now has {} runs, {} notes, {} table rows",
            record.header.date,
            record.header.shift,
            record.runs.len(),
            record.notes.len(),
            record.table.len()
        );
    }
}

/// Build a session over the configured local store and document server.
pub fn open_session(
    config: &ClientConfig,
    view: Arc<dyn RenderBridge>,
) -> Result<Arc<ShiftSession>, StorageError> {
    let store = LocalStore::open_file(&config.storage_path())?;
    let remote = Arc::new(HttpRemote::new(&config.sync.remote_url));
    Ok(ShiftSession::new(
        ClientId::generate(),
        store,
        remote,
        view,
        config.sync.clone(),
    ))
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = crate::logging::init() {
        eprintln!("failed to initialize client logger: {}", e);
    }

    let config = config::load_config(&config::default_config_path());
    let session = open_session(&config, Arc::new(LogView))?;
    log::info!(
        target: "turno.client",
        "Client {} syncing with {}",
        session.client_id(),
        config.sync.remote_url
    );

    match session.start().await {
        Some(source) => log::info!(target: "turno.client", "Following a shift ({:?})", source),
        None => log::info!(target: "turno.client", "Waiting for a shift to be selected"),
    }

    tokio::signal::ctrl_c().await?;
    log::info!(target: "turno.client", "Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::spawn_server;
    use crate::state::AppState;
    use crate::store::DocumentStore;
    use std::time::Duration;
    use turno_core::config::SyncSettings;
    use turno_core::sync::pointer::KeySource;
    use turno_core::types::RunData;

    #[tokio::test]
    async fn test_client_replicates_into_its_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(DocumentStore::open(&dir.path().join("server"), "informes_produccion").unwrap());
        let addr = spawn_server(AppState {
            store,
            port: 0,
            bind_address: "127.0.0.1".to_string(),
        })
        .await
        .unwrap();

        let config = ClientConfig {
            sync: SyncSettings {
                debounce_ms: 50,
                periodic_push_secs: 0,
                remote_url: format!("http://{}", addr),
            },
            storage_path: Some(dir.path().join("writer.json")),
        };
        let writer = open_session(&config, Arc::new(LogView)).unwrap();
        writer.set_header("A", "T1", "2025-01-10").await.unwrap();
        let trigger = writer
            .editor()
            .add_run(&RunData::new("3", "08:00", "10:00", "Vanilla"))
            .unwrap();
        writer.dispatch(trigger).await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let replica_path = dir.path().join("replica.json");
        let replica_config = ClientConfig {
            storage_path: Some(replica_path.clone()),
            ..config
        };
        let replica = open_session(&replica_config, Arc::new(LogView)).unwrap();
        assert_eq!(replica.start().await, Some(KeySource::Pointer));
        assert_eq!(replica.store().runs().len(), 1);
        drop(replica);

        let reopened = LocalStore::open_file(&replica_path).unwrap();
        assert_eq!(reopened.header().shift, "A");
        assert_eq!(reopened.runs(), writer.store().runs());
    }
}
