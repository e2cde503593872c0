/// Local Store Adapter.
///
/// Typed get/set/remove for the four report records (header, table, runs,
/// notes) plus the page settings (mode, row filter, timeline window), over any
/// [`KeyValueStore`]. Reads are defensive: a missing or malformed record reads
/// as the empty structure and never raises.
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::file::FileStore;
use super::memory::MemoryStore;
use super::{KeyValueStore, StorageError};
use crate::types::*;

pub const HEADER_KEY: &str = "encabezado_v1";
pub const TABLE_KEY: &str = "tabla_produccion_v1";
pub const LEGACY_TABLE_KEY: &str = "tablaDatos";
pub const RUNS_KEY: &str = "corridas";
pub const LEGACY_RUNS_KEY: &str = "cronograma_v1";
pub const NOTES_KEY: &str = "novedades_v1";
pub const MODE_KEY: &str = "modo_app_v1";
pub const ROW_FILTER_KEY: &str = "filtro_filas_v1";
pub const WINDOW_KEY: &str = "rango_v1";

/// (current key, legacy key) pairs reconciled at startup.
const LEGACY_PAIRS: [(&str, &str); 2] = [(TABLE_KEY, LEGACY_TABLE_KEY), (RUNS_KEY, LEGACY_RUNS_KEY)];

/// The four report records as held locally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSnapshot {
    pub header: HeaderData,
    pub table: Vec<RowData>,
    pub runs: Vec<RunData>,
    pub notes: Vec<NoteData>,
}

impl LocalSnapshot {
    /// Assemble the remote record, stamped with the writer's metadata.
    pub fn into_record(self, updated_at: Timestamp, origin_client: ClientId) -> ShiftRecord {
        ShiftRecord {
            header: self.header,
            table: self.table,
            runs: self.runs,
            notes: self.notes,
            updated_at,
            origin_client,
        }
    }

    pub fn from_record(record: &ShiftRecord) -> Self {
        Self {
            header: record.header.clone(),
            table: record.table.clone(),
            runs: record.runs.clone(),
            notes: record.notes.clone(),
        }
    }
}

/// What startup migration did for one legacy key pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Both existed; the current record had at least as many entries.
    KeptCurrent { key: &'static str },
    /// The legacy record won (or was the only one) and now lives under the
    /// current key.
    PromotedLegacy { key: &'static str },
    /// One side was unreadable, so both were discarded.
    DroppedBoth { key: &'static str },
    /// Only an unusable legacy record existed.
    DroppedLegacy { key: &'static str },
}

#[derive(Clone)]
pub struct LocalStore {
    kv: Arc<dyn KeyValueStore>,
}

impl LocalStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Adapter over a [`FileStore`] at `path`.
    pub fn open_file(path: &Path) -> Result<Self, StorageError> {
        Ok(Self::new(Arc::new(FileStore::open(path)?)))
    }

    fn raw(&self, key: &str) -> Option<String> {
        match self.kv.get(key) {
            Ok(value) => value,
            Err(e) => {
                log::warn!("[turno.storage.read] Failed to read {}: {}", key, e);
                None
            }
        }
    }

    fn read_json<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let Some(raw) = self.raw(key) else {
            return T::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("[turno.storage.read] Malformed {} ({}), using empty value", key, e);
            T::default()
        })
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.kv.set(key, &json)
    }

    pub fn header(&self) -> HeaderData {
        self.read_json(HEADER_KEY)
    }

    pub fn set_header(&self, header: &HeaderData) -> Result<(), StorageError> {
        self.write_json(HEADER_KEY, header)
    }

    pub fn remove_header(&self) -> Result<(), StorageError> {
        self.kv.remove(HEADER_KEY)
    }

    pub fn table(&self) -> Vec<RowData> {
        self.read_json(TABLE_KEY)
    }

    pub fn set_table(&self, rows: &[RowData]) -> Result<(), StorageError> {
        self.write_json(TABLE_KEY, rows)
    }

    pub fn remove_table(&self) -> Result<(), StorageError> {
        self.kv.remove(TABLE_KEY)?;
        self.kv.remove(LEGACY_TABLE_KEY)
    }

    pub fn runs(&self) -> Vec<RunData> {
        self.read_json(RUNS_KEY)
    }

    pub fn set_runs(&self, runs: &[RunData]) -> Result<(), StorageError> {
        self.write_json(RUNS_KEY, runs)
    }

    pub fn remove_runs(&self) -> Result<(), StorageError> {
        self.kv.remove(RUNS_KEY)?;
        self.kv.remove(LEGACY_RUNS_KEY)
    }

    /// Notes in stored order. Notes without an id get one, and the ids are
    /// written back so later reads agree.
    pub fn notes(&self) -> Vec<NoteData> {
        let mut notes: Vec<NoteData> = self.read_json(NOTES_KEY);
        let mut assigned = false;
        for note in notes.iter_mut().filter(|n| n.id.is_empty()) {
            note.id = uuid::Uuid::new_v4().to_string();
            assigned = true;
        }
        if assigned {
            if let Err(e) = self.set_notes(&notes) {
                log::warn!("[turno.storage.notes] Failed to persist note ids: {}", e);
            }
        }
        notes
    }

    pub fn set_notes(&self, notes: &[NoteData]) -> Result<(), StorageError> {
        self.write_json(NOTES_KEY, notes)
    }

    pub fn remove_notes(&self) -> Result<(), StorageError> {
        self.kv.remove(NOTES_KEY)
    }

    pub fn mode(&self) -> UiMode {
        self.raw(MODE_KEY)
            .and_then(|raw| UiMode::from_str(&raw))
            .unwrap_or_default()
    }

    pub fn set_mode(&self, mode: UiMode) -> Result<(), StorageError> {
        self.kv.set(MODE_KEY, mode.as_str())
    }

    pub fn row_filter(&self) -> bool {
        self.raw(ROW_FILTER_KEY).is_some_and(|raw| raw.trim() == "true")
    }

    pub fn set_row_filter(&self, enabled: bool) -> Result<(), StorageError> {
        self.kv.set(ROW_FILTER_KEY, if enabled { "true" } else { "false" })
    }

    pub fn window(&self) -> ShiftWindow {
        self.raw(WINDOW_KEY)
            .and_then(|raw| ShiftWindow::from_str(&raw))
            .unwrap_or_default()
    }

    pub fn set_window(&self, window: ShiftWindow) -> Result<(), StorageError> {
        self.kv.set(WINDOW_KEY, window.as_str())
    }

    /// Read the four report records.
    pub fn snapshot(&self) -> LocalSnapshot {
        LocalSnapshot {
            header: self.header(),
            table: self.table(),
            runs: self.runs(),
            notes: self.notes(),
        }
    }

    /// Overwrite all four report records.
    pub fn replace_all(&self, snapshot: &LocalSnapshot) -> Result<(), StorageError> {
        self.set_header(&snapshot.header)?;
        self.set_table(&snapshot.table)?;
        self.set_runs(&snapshot.runs)?;
        self.set_notes(&snapshot.notes)
    }

    /// Reconcile records older builds wrote under different keys. When both
    /// exist, the one with more entries wins (ties keep the current key).
    pub fn migrate_legacy(&self) -> Result<Vec<MigrationOutcome>, StorageError> {
        let mut outcomes = Vec::new();

        for (key, legacy_key) in LEGACY_PAIRS {
            let Some(legacy_raw) = self.kv.get(legacy_key)? else {
                continue;
            };
            let legacy = serde_json::from_str::<Vec<serde_json::Value>>(&legacy_raw).ok();

            let outcome = match (self.kv.get(key)?, legacy) {
                (Some(current_raw), Some(legacy)) => {
                    match serde_json::from_str::<Vec<serde_json::Value>>(&current_raw) {
                        Ok(current) if current.len() >= legacy.len() => {
                            MigrationOutcome::KeptCurrent { key }
                        }
                        Ok(_) => {
                            self.kv.set(key, &legacy_raw)?;
                            MigrationOutcome::PromotedLegacy { key }
                        }
                        Err(_) => {
                            self.kv.remove(key)?;
                            MigrationOutcome::DroppedBoth { key }
                        }
                    }
                }
                (Some(_), None) => {
                    self.kv.remove(key)?;
                    MigrationOutcome::DroppedBoth { key }
                }
                (None, Some(_)) => {
                    self.kv.set(key, &legacy_raw)?;
                    MigrationOutcome::PromotedLegacy { key }
                }
                (None, None) => MigrationOutcome::DroppedLegacy { key },
            };
            self.kv.remove(legacy_key)?;

            log::info!("[turno.storage.migrate] {} -> {:?}", legacy_key, outcome);
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
