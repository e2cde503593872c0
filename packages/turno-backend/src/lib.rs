/// Turno Backend: config loading, document store init, HTTP server, and
/// the headless client that syncs against it.
pub mod api;
pub mod client;
pub mod config;
mod logging;
pub mod remote_client;
pub mod server;
pub mod state;
pub mod store;
pub mod sync_ws;

use crate::state::AppState;
use crate::store::DocumentStore;
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = logging::init() {
        eprintln!("failed to initialize backend logger: {}", e);
    }

    let config_path = config::default_config_path();
    let config = config::load_config(&config_path);
    let data_dir = config.data_dir();

    let store = Arc::new(DocumentStore::open(&data_dir, &config.collection)?);
    log::info!(
        target: "turno.backend",
        "Loaded {} reports from {} (collection {})",
        store.report_count(),
        data_dir.display(),
        store.collection()
    );

    let state = AppState {
        store,
        port: config.port,
        bind_address: config.bind_address.clone(),
    };
    let addr = server::spawn_server(state).await?;
    log::info!(target: "turno.backend", "Document server ready on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    log::info!(target: "turno.backend", "Shutting down");
    Ok(())
}
