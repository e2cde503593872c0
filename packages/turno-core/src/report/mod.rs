pub mod notes;
pub mod runs;
pub mod table;
pub mod validation;

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::key::CompositeKey;
use crate::storage::local::LocalStore;
use crate::storage::StorageError;
use crate::types::*;
use validation::ValidationError;

/// How a user action should reach the remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Page setting only; not part of the shift record.
    LocalOnly,
    /// Typing-like edit; push after the quiet period.
    Debounced,
    /// Submit/clear/delete/export; push now.
    Immediate,
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result of a header edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderChange {
    pub key: Option<CompositeKey>,
    pub key_changed: bool,
}

enum StagedNoteEdit {
    Update(NoteData),
    Delete(String),
}

#[derive(Default)]
struct EditState {
    /// Staged bulk note edits, applied together on commit.
    notes: Option<Vec<StagedNoteEdit>>,
    /// Table contents when the table edit started, for cancel.
    table: Option<Vec<RowData>>,
}

/// User-facing report operations. Every operation validates before touching
/// storage and reports which sync trigger it needs.
pub struct ReportEditor {
    store: LocalStore,
    edits: Mutex<EditState>,
}

impl ReportEditor {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            edits: Mutex::new(EditState::default()),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    fn edits(&self) -> MutexGuard<'_, EditState> {
        self.edits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_editable(&self) -> Result<(), ValidationError> {
        if self.store.mode() == UiMode::Read {
            return Err(ValidationError::ReadOnly);
        }
        Ok(())
    }

    // ── Header ─────────────────────────────────────────────────────────

    pub fn set_header(&self, shift: &str, tank: &str, date: &str) -> Result<HeaderChange, ReportError> {
        self.ensure_editable()?;
        let previous = self.store.header().composite_key();
        let header = HeaderData::new(shift, tank, date);
        self.store.set_header(&header)?;
        let key = header.composite_key();
        Ok(HeaderChange {
            key_changed: key != previous,
            key,
        })
    }

    // ── Runs ───────────────────────────────────────────────────────────

    pub fn add_run(&self, run: &RunData) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        let run = validation::validate_run(self.store.window(), run)?;
        let mut stored = self.store.runs();
        if runs::upsert_run(&mut stored, run) {
            log::debug!("[turno.report.runs] Replaced duplicate run");
        }
        self.store.set_runs(&stored)?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn delete_run(&self, run: &RunData) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        let mut stored = self.store.runs();
        let target = RunData::new(run.line.as_str(), &run.start, &run.end, &run.flavor);
        if !runs::remove_run(&mut stored, &target) {
            return Err(ValidationError::RunNotFound.into());
        }
        self.store.set_runs(&stored)?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn clear_runs(&self) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        self.store.remove_runs()?;
        Ok(SyncTrigger::Immediate)
    }

    // ── Notes ──────────────────────────────────────────────────────────

    pub fn add_note(&self, line: &str, hour: &str, text: &str) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        let note = validation::validate_note(self.store.window(), &NoteData::new(line, hour, text))?;
        let mut stored = self.store.notes();
        notes::insert_note(&mut stored, note);
        self.store.set_notes(&stored)?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn delete_note(&self, id: &str) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        let mut stored = self.store.notes();
        if !notes::remove_note(&mut stored, id) {
            return Err(ValidationError::NoteNotFound(id.to_string()).into());
        }
        self.store.set_notes(&stored)?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn clear_notes(&self) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        self.store.remove_notes()?;
        Ok(SyncTrigger::Immediate)
    }

    /// Start a bulk note edit. Only one may be open at a time.
    pub fn begin_note_edit(&self) -> Result<(), ReportError> {
        self.ensure_editable()?;
        let mut edits = self.edits();
        if edits.notes.is_some() {
            return Err(ValidationError::EditSessionActive.into());
        }
        edits.notes = Some(Vec::new());
        Ok(())
    }

    pub fn note_edit_active(&self) -> bool {
        self.edits().notes.is_some()
    }

    /// Stage an edit of the note with `id`; validated now, applied on commit.
    pub fn stage_note_edit(&self, id: &str, line: &str, hour: &str, text: &str) -> Result<(), ReportError> {
        self.ensure_editable()?;
        let candidate = NoteData {
            id: id.to_string(),
            ..NoteData::new(line, hour, text)
        };
        let note = validation::validate_note(self.store.window(), &candidate)?;
        if !self.store.notes().iter().any(|n| n.id == id) {
            return Err(ValidationError::NoteNotFound(id.to_string()).into());
        }
        self.edits()
            .notes
            .as_mut()
            .ok_or(ValidationError::NoEditSession)?
            .push(StagedNoteEdit::Update(note));
        Ok(())
    }

    pub fn stage_note_delete(&self, id: &str) -> Result<(), ReportError> {
        self.ensure_editable()?;
        if !self.store.notes().iter().any(|n| n.id == id) {
            return Err(ValidationError::NoteNotFound(id.to_string()).into());
        }
        self.edits()
            .notes
            .as_mut()
            .ok_or(ValidationError::NoEditSession)?
            .push(StagedNoteEdit::Delete(id.to_string()));
        Ok(())
    }

    /// Apply every staged note edit at once and close the session.
    pub fn commit_note_edit(&self) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        let staged = self.edits().notes.take().ok_or(ValidationError::NoEditSession)?;

        let mut stored = self.store.notes();
        for edit in staged {
            match edit {
                StagedNoteEdit::Update(note) => {
                    let id = note.id.clone();
                    if !notes::replace_note(&mut stored, note) {
                        log::warn!("[turno.report.notes] Staged note {} vanished before commit", id);
                    }
                }
                StagedNoteEdit::Delete(id) => {
                    notes::remove_note(&mut stored, &id);
                }
            }
        }
        notes::sort_notes(&mut stored);
        self.store.set_notes(&stored)?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn cancel_note_edit(&self) {
        self.edits().notes = None;
    }

    // ── Production table ───────────────────────────────────────────────

    /// Unlock the table for editing.
    pub fn begin_table_edit(&self) -> Result<(), ReportError> {
        self.ensure_editable()?;
        let mut edits = self.edits();
        if edits.table.is_some() {
            return Err(ValidationError::EditSessionActive.into());
        }
        edits.table = Some(self.store.table());
        Ok(())
    }

    pub fn table_edit_active(&self) -> bool {
        self.edits().table.is_some()
    }

    /// Write one cell. The table must be unlocked.
    pub fn set_cell(&self, line: &str, index: usize, text: &str) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        if !self.table_edit_active() {
            return Err(ValidationError::TableLocked.into());
        }
        validation::validate_cell_index(index)?;
        let line = LineId::new(line);
        if line.is_empty() {
            return Err(ValidationError::MissingField("line").into());
        }
        let mut rows = self.store.table();
        table::set_cell(&mut rows, &line, index, text);
        self.store.set_table(&rows)?;
        Ok(SyncTrigger::Debounced)
    }

    /// Save and lock the table.
    pub fn save_table(&self) -> Result<SyncTrigger, ReportError> {
        self.edits().table.take().ok_or(ValidationError::NoEditSession)?;
        Ok(SyncTrigger::Immediate)
    }

    /// Restore the table as it was when editing began, and lock it.
    pub fn cancel_table_edit(&self) -> Result<SyncTrigger, ReportError> {
        let original = self.edits().table.take().ok_or(ValidationError::NoEditSession)?;
        self.store.set_table(&original)?;
        Ok(SyncTrigger::Debounced)
    }

    pub fn clear_table(&self) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        self.store.remove_table()?;
        Ok(SyncTrigger::Immediate)
    }

    pub fn set_row_filter(&self, hide_blank: bool) -> Result<SyncTrigger, ReportError> {
        self.store.set_row_filter(hide_blank)?;
        Ok(SyncTrigger::LocalOnly)
    }

    pub fn visible_rows(&self) -> Vec<RowData> {
        table::visible_rows(&self.store.table(), self.store.row_filter())
    }

    // ── Page settings and bulk actions ─────────────────────────────────

    pub fn set_window(&self, window: ShiftWindow) -> Result<SyncTrigger, ReportError> {
        self.store.set_window(window)?;
        Ok(SyncTrigger::LocalOnly)
    }

    pub fn set_mode(&self, mode: UiMode) -> Result<SyncTrigger, ReportError> {
        self.store.set_mode(mode)?;
        Ok(SyncTrigger::LocalOnly)
    }

    pub fn mode(&self) -> UiMode {
        self.store.mode()
    }

    /// Remove runs, notes, table and header together.
    pub fn clear_all(&self) -> Result<SyncTrigger, ReportError> {
        self.ensure_editable()?;
        self.cancel_edit_sessions();
        self.store.remove_runs()?;
        self.store.remove_notes()?;
        self.store.remove_table()?;
        self.store.remove_header()?;
        Ok(SyncTrigger::Immediate)
    }

    /// Snapshot export pushes the current state first.
    pub fn request_export(&self) -> SyncTrigger {
        SyncTrigger::Immediate
    }

    /// Exit any open bulk edit without restoring or applying anything.
    /// Returns true if a session was open.
    pub fn cancel_edit_sessions(&self) -> bool {
        let mut edits = self.edits();
        let had_session = edits.notes.is_some() || edits.table.is_some();
        edits.notes = None;
        edits.table = None;
        had_session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> ReportEditor {
        ReportEditor::new(LocalStore::in_memory())
    }

    #[test]
    fn test_add_same_run_twice_stores_one() {
        let editor = editor();
        let run = RunData::new("3", "08:00", "10:00", "Vanilla");
        assert_eq!(editor.add_run(&run).unwrap(), SyncTrigger::Immediate);
        editor.add_run(&run).unwrap();
        assert_eq!(editor.store().runs(), vec![run]);
    }

    #[test]
    fn test_invalid_run_leaves_storage_untouched() {
        let editor = editor();
        let err = editor
            .add_run(&RunData::new("3", "05:00", "10:00", "Vanilla"))
            .unwrap_err();
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::OutsideWindow { .. })
        ));
        assert!(editor.store().runs().is_empty());
    }

    #[test]
    fn test_night_window_run_accepted() {
        let editor = editor();
        editor.set_window(ShiftWindow::Night).unwrap();
        editor
            .add_run(&RunData::new("1", "20:00", "05:00", "Chocolate"))
            .unwrap();
        assert_eq!(editor.store().runs().len(), 1);
    }

    #[test]
    fn test_notes_stored_in_hour_order() {
        let editor = editor();
        editor.add_note("1", "14:00", "Paro por limpieza").unwrap();
        editor.add_note("1", "09:00", "Arranque").unwrap();
        let hours: Vec<String> = editor.store().notes().into_iter().map(|n| n.hour).collect();
        assert_eq!(hours, vec!["09:00", "14:00"]);
    }

    #[test]
    fn test_bulk_note_edit_targets_by_id() {
        let editor = editor();
        editor.add_note("1", "09:00", "same").unwrap();
        editor.add_note("1", "09:00", "same").unwrap();
        let notes = editor.store().notes();

        editor.begin_note_edit().unwrap();
        editor
            .stage_note_edit(&notes[1].id, "1", "10:00", "moved")
            .unwrap();
        editor.stage_note_delete(&notes[0].id).unwrap();
        editor.commit_note_edit().unwrap();

        let after = editor.store().notes();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, notes[1].id);
        assert_eq!(after[0].hour, "10:00");
        assert!(!editor.note_edit_active());
    }

    #[test]
    fn test_staging_requires_session() {
        let editor = editor();
        editor.add_note("1", "09:00", "x").unwrap();
        let id = editor.store().notes()[0].id.clone();
        assert!(matches!(
            editor.stage_note_edit(&id, "1", "09:00", "y"),
            Err(ReportError::Validation(ValidationError::NoEditSession))
        ));
        editor.begin_note_edit().unwrap();
        assert!(matches!(
            editor.begin_note_edit(),
            Err(ReportError::Validation(ValidationError::EditSessionActive))
        ));
    }

    #[test]
    fn test_table_is_locked_until_edit_begins() {
        let editor = editor();
        assert!(matches!(
            editor.set_cell("1", 0, "100"),
            Err(ReportError::Validation(ValidationError::TableLocked))
        ));

        editor.begin_table_edit().unwrap();
        assert_eq!(editor.set_cell("1", 0, "100").unwrap(), SyncTrigger::Debounced);
        assert_eq!(editor.save_table().unwrap(), SyncTrigger::Immediate);
        assert_eq!(editor.store().table()[0].cells[0], "100");
        assert!(!editor.table_edit_active());
    }

    #[test]
    fn test_cancel_table_edit_restores() {
        let editor = editor();
        editor.begin_table_edit().unwrap();
        editor.set_cell("1", 0, "100").unwrap();
        editor.save_table().unwrap();

        editor.begin_table_edit().unwrap();
        editor.set_cell("1", 0, "999").unwrap();
        editor.cancel_table_edit().unwrap();
        assert_eq!(editor.store().table()[0].cells[0], "100");
    }

    #[test]
    fn test_read_mode_blocks_edits() {
        let editor = editor();
        editor.set_mode(UiMode::Read).unwrap();
        assert!(matches!(
            editor.add_note("1", "09:00", "x"),
            Err(ReportError::Validation(ValidationError::ReadOnly))
        ));
        editor.set_mode(UiMode::Edit).unwrap();
        assert!(editor.add_note("1", "09:00", "x").is_ok());
    }

    #[test]
    fn test_read_mode_blocks_staging() {
        let editor = editor();
        editor.add_note("1", "09:00", "x").unwrap();
        let id = editor.store().notes()[0].id.clone();
        editor.begin_note_edit().unwrap();
        editor.set_mode(UiMode::Read).unwrap();

        assert!(matches!(
            editor.stage_note_edit(&id, "1", "10:00", "y"),
            Err(ReportError::Validation(ValidationError::ReadOnly))
        ));
        assert!(matches!(
            editor.stage_note_delete(&id),
            Err(ReportError::Validation(ValidationError::ReadOnly))
        ));
    }

    #[test]
    fn test_header_change_reports_new_key() {
        let editor = editor();
        let change = editor.set_header("Shift A", "T1", "2025-01-10").unwrap();
        assert!(change.key_changed);
        assert_eq!(change.key.unwrap().id(), "2025-01-10_Shift_A");
        assert_eq!(editor.store().header().weekday, "Viernes");

        let same = editor.set_header("Shift A", "T2", "2025-01-10").unwrap();
        assert!(!same.key_changed);
    }

    #[test]
    fn test_clear_all_empties_report() {
        let editor = editor();
        editor.set_header("A", "T", "2025-01-10").unwrap();
        editor.add_run(&RunData::new("1", "07:00", "08:00", "Mint")).unwrap();
        editor.add_note("1", "07:00", "x").unwrap();
        editor.begin_note_edit().unwrap();

        editor.clear_all().unwrap();
        assert_eq!(editor.store().snapshot(), Default::default());
        assert!(!editor.note_edit_active());
    }

    #[test]
    fn test_cancel_edit_sessions_does_not_restore() {
        let editor = editor();
        editor.begin_table_edit().unwrap();
        editor.set_cell("1", 2, "7").unwrap();
        assert!(editor.cancel_edit_sessions());
        assert!(!editor.cancel_edit_sessions());
        assert_eq!(editor.store().table()[0].cells[2], "7");
    }
}
