/// Document store backing the server.
///
/// Layout on disk:
///   <data_dir>/<collection>/<id>.json   one file per shift report
///   <data_dir>/pointer.json             the singleton pointer
///
/// Every accepted write is persisted atomically before it becomes visible,
/// then announced on the broadcast channel.
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;
use turno_core::storage::file::atomic_write;
use turno_core::sync::document::{self, validate_document_id, Document, InvalidDocumentId};
use turno_core::sync::{ReportSummary, UpsertResponse};

const POINTER_FILE: &str = "pointer.json";
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidDocumentId),

    #[error("Pointer must name a document in currentId")]
    InvalidPointer,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub enum StoreEvent {
    Report { id: String, document: Document },
    Pointer { document: Document },
}

pub struct DocumentStore {
    root: PathBuf,
    collection: String,
    reports: RwLock<HashMap<String, Document>>,
    pointer: RwLock<Option<Document>>,
    events: broadcast::Sender<StoreEvent>,
}

fn read_document(path: &Path) -> Option<Document> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!(target: "turno.store", "Failed to read {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(document) => Some(document),
        Err(e) => {
            log::warn!(target: "turno.store", "Skipping malformed {}: {}", path.display(), e);
            None
        }
    }
}

fn pointer_id(document: &Document) -> Option<&str> {
    document.fields().get("currentId").and_then(|v| v.as_str())
}

impl DocumentStore {
    /// Open (or create) the store under `root` and load every document.
    pub fn open(root: &Path, collection: &str) -> Result<Self, StoreError> {
        validate_document_id(collection)?;
        let collection_dir = root.join(collection);
        fs::create_dir_all(&collection_dir)?;

        let mut reports = HashMap::new();
        for entry in fs::read_dir(&collection_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_document_id(id).is_err() {
                log::warn!(target: "turno.store", "Ignoring file with unusable name {}", path.display());
                continue;
            }
            if let Some(document) = read_document(&path) {
                reports.insert(id.to_string(), document);
            }
        }

        let pointer_path = root.join(POINTER_FILE);
        let pointer = if pointer_path.exists() {
            read_document(&pointer_path)
        } else {
            None
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            root: root.to_path_buf(),
            collection: collection.to_string(),
            reports: RwLock::new(reports),
            pointer: RwLock::new(pointer),
            events,
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn report_path(&self, id: &str) -> PathBuf {
        self.root.join(&self.collection).join(format!("{}.json", id))
    }

    pub fn report_count(&self) -> usize {
        self.reports.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn get_report(&self, id: &str) -> Result<Option<Document>, StoreError> {
        validate_document_id(id)?;
        let reports = self.reports.read().unwrap_or_else(PoisonError::into_inner);
        Ok(reports.get(id).cloned())
    }

    /// All report ids with their `updatedAt`, newest first.
    pub fn list_reports(&self) -> Vec<ReportSummary> {
        let reports = self.reports.read().unwrap_or_else(PoisonError::into_inner);
        let mut summaries: Vec<ReportSummary> = reports
            .iter()
            .map(|(id, doc)| ReportSummary {
                id: id.clone(),
                updated_at: doc.updated_at(),
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    pub fn latest_report(&self) -> Option<(String, Document)> {
        let latest = self.list_reports().into_iter().next()?;
        let reports = self.reports.read().unwrap_or_else(PoisonError::into_inner);
        reports
            .get(&latest.id)
            .map(|doc| (latest.id.clone(), doc.clone()))
    }

    /// Last-writer-wins upsert-merge of one report.
    pub fn upsert_report(&self, id: &str, incoming: Document) -> Result<UpsertResponse, StoreError> {
        validate_document_id(id)?;
        let mut reports = self.reports.write().unwrap_or_else(PoisonError::into_inner);

        let mut slot = reports.get(id).cloned();
        let applied = document::upsert(&mut slot, incoming);
        let Some(stored) = slot else {
            return Ok(UpsertResponse {
                applied: false,
                updated_at: Default::default(),
            });
        };
        let updated_at = stored.updated_at();
        if !applied {
            return Ok(UpsertResponse { applied, updated_at });
        }

        atomic_write(&self.report_path(id), &serde_json::to_string_pretty(&stored)?)?;
        reports.insert(id.to_string(), stored.clone());
        let _ = self.events.send(StoreEvent::Report {
            id: id.to_string(),
            document: stored,
        });
        log::debug!(target: "turno.store", "Stored report {} at {}", id, updated_at);
        Ok(UpsertResponse { applied, updated_at })
    }

    pub fn get_pointer(&self) -> Option<Document> {
        self.pointer.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Same rule as reports. The pointer must carry a valid `currentId`.
    pub fn publish_pointer(&self, incoming: Document) -> Result<UpsertResponse, StoreError> {
        let target = pointer_id(&incoming).ok_or(StoreError::InvalidPointer)?;
        validate_document_id(target)?;

        let mut pointer = self.pointer.write().unwrap_or_else(PoisonError::into_inner);
        let mut slot = pointer.clone();
        let applied = document::upsert(&mut slot, incoming);
        let Some(stored) = slot else {
            return Ok(UpsertResponse {
                applied: false,
                updated_at: Default::default(),
            });
        };
        let updated_at = stored.updated_at();
        if !applied {
            return Ok(UpsertResponse { applied, updated_at });
        }

        atomic_write(&self.root.join(POINTER_FILE), &serde_json::to_string_pretty(&stored)?)?;
        *pointer = Some(stored.clone());
        log::info!(
            target: "turno.store",
            "Pointer now {}",
            pointer_id(&stored).unwrap_or_default()
        );
        let _ = self.events.send(StoreEvent::Pointer { document: stored });
        Ok(UpsertResponse { applied, updated_at })
    }
}
