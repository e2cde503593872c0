/// Remote document store abstraction.
///
/// One collection of shift records keyed by composite key id, plus the
/// singleton pointer record. Writes are upsert-merges that the store accepts
/// only when the incoming `updatedAt` is newer than what it holds; the bool
/// they return says whether the write was applied.
use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::document::InvalidDocumentId;
use crate::types::{PointerRecord, ShiftRecord};

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Remote returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode remote document: {0}")]
    Decode(String),

    #[error(transparent)]
    InvalidId(#[from] InvalidDocumentId),

    #[error("Remote store unavailable")]
    Unavailable,
}

impl From<serde_json::Error> for RemoteError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RemoteError>> + Send + 'a>>;

/// Stream of change notifications for one document. The first item is the
/// document's current state when it exists. Dropping the subscription stops
/// the listener.
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    task: Option<JoinHandle<()>>,
}

impl<T> Subscription<T> {
    pub fn new(rx: mpsc::UnboundedReceiver<T>) -> Self {
        Self { rx, task: None }
    }

    /// Subscription fed by a background task that is aborted on drop.
    pub fn with_task(rx: mpsc::UnboundedReceiver<T>, task: JoinHandle<()>) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    /// Next notification, or `None` once the listener has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

pub trait RemoteStore: Send + Sync {
    fn fetch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Option<ShiftRecord>>;

    fn upsert_report<'a>(&'a self, id: &'a str, record: &'a ShiftRecord) -> RemoteFuture<'a, bool>;

    /// The record with the greatest `updatedAt`, with its id.
    fn latest_report(&self) -> RemoteFuture<'_, Option<(String, ShiftRecord)>>;

    fn fetch_pointer(&self) -> RemoteFuture<'_, Option<PointerRecord>>;

    fn publish_pointer<'a>(&'a self, pointer: &'a PointerRecord) -> RemoteFuture<'a, bool>;

    fn watch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Subscription<ShiftRecord>>;

    fn watch_pointer(&self) -> RemoteFuture<'_, Subscription<PointerRecord>>;
}
