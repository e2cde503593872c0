/// Shared application state passed to axum handlers.
use std::sync::Arc;

use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<DocumentStore>,
    pub port: u16,
    pub bind_address: String,
}
