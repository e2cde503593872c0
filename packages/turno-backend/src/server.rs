use crate::api::api_router;
use crate::state::AppState;
use crate::sync_ws::listen_router;
/// HTTP server: spawns axum on a background tokio task.
use axum::Router;
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

/// Bind and start serving. Port 0 picks a free port; the bound address is
/// returned.
pub async fn spawn_server(state: AppState) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let port = state.port;
    let bind_addr = state.bind_address.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app: Router = api_router()
        .merge(listen_router())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_addr, port)).await?;
    let local_addr = listener.local_addr()?;

    log::info!("HTTP server listening on http://{}", local_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("HTTP server exited with error: {}", e);
        }
    });

    Ok(local_addr)
}
