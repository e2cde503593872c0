/// In-process remote store.
///
/// Behaves like the hosted database the sync engine talks to: LWW
/// upsert-merges, listeners that receive the current document on subscribe
/// and every accepted change after it. Several clients can share one
/// instance through an `Arc`. Also exposes knobs for exercising failure
/// paths: going offline and holding writes in flight.
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};

use super::document::{self, validate_document_id, Document};
use super::remote::{RemoteError, RemoteFuture, RemoteStore, Subscription};
use crate::types::{PointerRecord, ShiftRecord};

#[derive(Default)]
struct Inner {
    reports: HashMap<String, Document>,
    pointer: Option<Document>,
    report_watchers: HashMap<String, Vec<mpsc::UnboundedSender<ShiftRecord>>>,
    pointer_watchers: Vec<mpsc::UnboundedSender<PointerRecord>>,
    offline: bool,
    writes: usize,
}

pub struct MemoryRemote {
    inner: Mutex<Inner>,
    /// `true` while writes are held.
    gate: watch::Sender<bool>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner::default()),
            gate,
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every call with [`RemoteError::Unavailable`] while set.
    pub fn set_offline(&self, offline: bool) {
        self.inner().offline = offline;
    }

    /// Park writes until [`release_writes`](Self::release_writes).
    pub fn hold_writes(&self) {
        self.gate.send_replace(true);
    }

    pub fn release_writes(&self) {
        self.gate.send_replace(false);
    }

    /// Accepted writes so far (reports and pointer).
    pub fn write_count(&self) -> usize {
        self.inner().writes
    }

    /// Live listeners on one report.
    pub fn watcher_count(&self, id: &str) -> usize {
        self.inner()
            .report_watchers
            .get(id)
            .map_or(0, |txs| txs.iter().filter(|tx| !tx.is_closed()).count())
    }

    pub fn report(&self, id: &str) -> Option<ShiftRecord> {
        self.inner()
            .reports
            .get(id)
            .and_then(|doc| doc.to_shift_record().ok())
    }

    pub fn pointer(&self) -> Option<PointerRecord> {
        self.inner().pointer.as_ref().and_then(|doc| doc.decode().ok())
    }

    async fn wait_for_gate(&self) {
        let mut rx = self.gate.subscribe();
        let _ = rx.wait_for(|held| !held).await;
    }

    fn online(&self) -> Result<MutexGuard<'_, Inner>, RemoteError> {
        let inner = self.inner();
        if inner.offline {
            return Err(RemoteError::Unavailable);
        }
        Ok(inner)
    }

    /// Upsert a raw document and notify listeners when it was applied.
    pub fn upsert_document(&self, id: &str, incoming: Document) -> Result<bool, RemoteError> {
        validate_document_id(id)?;
        let mut inner = self.online()?;

        let mut slot = inner.reports.remove(id);
        let applied = document::upsert(&mut slot, incoming);
        let merged = slot.map(|doc| {
            let record = doc.to_shift_record();
            inner.reports.insert(id.to_string(), doc);
            record
        });
        if !applied {
            return Ok(false);
        }
        inner.writes += 1;

        match merged {
            Some(Ok(record)) => {
                if let Some(watchers) = inner.report_watchers.get_mut(id) {
                    watchers.retain(|tx| tx.send(record.clone()).is_ok());
                }
            }
            Some(Err(e)) => {
                log::warn!("[turno.sync.memory] Stored {} but it does not decode: {}", id, e);
            }
            None => {}
        }
        Ok(true)
    }

    fn upsert_pointer(&self, incoming: Document) -> Result<bool, RemoteError> {
        let mut inner = self.online()?;
        let mut slot = inner.pointer.take();
        let applied = document::upsert(&mut slot, incoming);
        inner.pointer = slot;
        if !applied {
            return Ok(false);
        }
        inner.writes += 1;

        if let Some(pointer) = inner
            .pointer
            .as_ref()
            .and_then(|doc| doc.decode::<PointerRecord>().ok())
        {
            inner
                .pointer_watchers
                .retain(|tx| tx.send(pointer.clone()).is_ok());
        }
        Ok(true)
    }
}

impl RemoteStore for MemoryRemote {
    fn fetch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Option<ShiftRecord>> {
        Box::pin(async move {
            validate_document_id(id)?;
            let inner = self.online()?;
            match inner.reports.get(id) {
                Some(doc) => Ok(Some(doc.to_shift_record()?)),
                None => Ok(None),
            }
        })
    }

    fn upsert_report<'a>(&'a self, id: &'a str, record: &'a ShiftRecord) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            self.wait_for_gate().await;
            let document = Document::from_record(record)?;
            self.upsert_document(id, document)
        })
    }

    fn latest_report(&self) -> RemoteFuture<'_, Option<(String, ShiftRecord)>> {
        Box::pin(async move {
            let inner = self.online()?;
            let latest = inner
                .reports
                .iter()
                .max_by_key(|(_, doc)| doc.updated_at())
                .map(|(id, doc)| doc.to_shift_record().map(|record| (id.clone(), record)));
            Ok(latest.transpose()?)
        })
    }

    fn fetch_pointer(&self) -> RemoteFuture<'_, Option<PointerRecord>> {
        Box::pin(async move {
            let inner = self.online()?;
            match inner.pointer.as_ref() {
                Some(doc) => Ok(Some(doc.decode()?)),
                None => Ok(None),
            }
        })
    }

    fn publish_pointer<'a>(&'a self, pointer: &'a PointerRecord) -> RemoteFuture<'a, bool> {
        Box::pin(async move {
            self.wait_for_gate().await;
            let document = Document::from_record(pointer)?;
            self.upsert_pointer(document)
        })
    }

    fn watch_report<'a>(&'a self, id: &'a str) -> RemoteFuture<'a, Subscription<ShiftRecord>> {
        Box::pin(async move {
            validate_document_id(id)?;
            let mut inner = self.online()?;
            let (tx, rx) = mpsc::unbounded_channel();
            if let Some(record) = inner.reports.get(id).and_then(|doc| doc.to_shift_record().ok()) {
                let _ = tx.send(record);
            }
            inner
                .report_watchers
                .entry(id.to_string())
                .or_default()
                .push(tx);
            Ok(Subscription::new(rx))
        })
    }

    fn watch_pointer(&self) -> RemoteFuture<'_, Subscription<PointerRecord>> {
        Box::pin(async move {
            let mut inner = self.online()?;
            let (tx, rx) = mpsc::unbounded_channel();
            if let Some(pointer) = inner.pointer.as_ref().and_then(|doc| doc.decode().ok()) {
                let _ = tx.send(pointer);
            }
            inner.pointer_watchers.push(tx);
            Ok(Subscription::new(rx))
        })
    }
}
