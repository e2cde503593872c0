/// Input validation for runs, notes and table cells.
///
/// Failures carry the message shown to the user; nothing is mutated before
/// validation passes.
use chrono::{NaiveTime, Timelike};

use crate::types::{NoteData, RunData, ShiftWindow, MAX_TABLE_CELLS, WINDOW_MINUTES};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all fields (missing {0})")]
    MissingField(&'static str),

    #[error("Invalid time of day: {0}")]
    InvalidTime(String),

    #[error("{time} is outside the {window} shift window")]
    OutsideWindow { time: String, window: ShiftWindow },

    #[error("Run must end after it starts ({start} - {end})")]
    EndNotAfterStart { start: String, end: String },

    #[error("Note time must be on the hour: {0}")]
    NotOnTheHour(String),

    #[error("Cell index {0} out of range (0-5)")]
    CellOutOfRange(usize),

    #[error("The report is in read mode")]
    ReadOnly,

    #[error("The production table is locked")]
    TableLocked,

    #[error("An edit session is already in progress")]
    EditSessionActive,

    #[error("No edit session in progress")]
    NoEditSession,

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Run not found")]
    RunNotFound,
}

fn require(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

/// Parse `HH:MM` into minutes since midnight.
pub fn parse_time(value: &str) -> Result<u32, ValidationError> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ValidationError::InvalidTime(value.to_string()))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Validate a run against the window. The start must fall inside
/// `[window start, window end)`, the end inside `(window start, window end]`,
/// and the end must come after the start once midnight is unwrapped.
/// Returns the run with trimmed fields.
pub fn validate_run(window: ShiftWindow, run: &RunData) -> Result<RunData, ValidationError> {
    require(run.line.as_str(), "line")?;
    require(&run.flavor, "flavor")?;
    require(&run.start, "start")?;
    require(&run.end, "end")?;

    let start = window.offset(parse_time(&run.start)?);
    let end = window.offset(parse_time(&run.end)?);

    if !(0..WINDOW_MINUTES).contains(&start) {
        return Err(ValidationError::OutsideWindow {
            time: run.start.trim().to_string(),
            window,
        });
    }
    if end <= 0 || end > WINDOW_MINUTES {
        return Err(ValidationError::OutsideWindow {
            time: run.end.trim().to_string(),
            window,
        });
    }
    if end <= start {
        return Err(ValidationError::EndNotAfterStart {
            start: run.start.trim().to_string(),
            end: run.end.trim().to_string(),
        });
    }

    Ok(RunData::new(run.line.as_str(), &run.start, &run.end, &run.flavor))
}

/// Validate a note hour: on the hour and inside the window. Returns the
/// normalized `HH:00` form.
pub fn validate_note_hour(window: ShiftWindow, hour: &str) -> Result<String, ValidationError> {
    require(hour, "hour")?;
    let minutes = parse_time(hour)?;
    if minutes % 60 != 0 {
        return Err(ValidationError::NotOnTheHour(hour.trim().to_string()));
    }
    if !(0..WINDOW_MINUTES).contains(&window.offset(minutes)) {
        return Err(ValidationError::OutsideWindow {
            time: hour.trim().to_string(),
            window,
        });
    }
    Ok(format!("{:02}:00", minutes / 60))
}

/// Validate a whole note; returns it with trimmed text and normalized hour.
pub fn validate_note(window: ShiftWindow, note: &NoteData) -> Result<NoteData, ValidationError> {
    require(note.line.as_str(), "line")?;
    require(&note.text, "text")?;
    let hour = validate_note_hour(window, &note.hour)?;
    Ok(NoteData {
        id: note.id.clone(),
        line: note.line.clone(),
        hour,
        text: note.text.trim().to_string(),
    })
}

pub fn validate_cell_index(index: usize) -> Result<(), ValidationError> {
    if index >= MAX_TABLE_CELLS {
        return Err(ValidationError::CellOutOfRange(index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_window_rejects_early_start() {
        let run = RunData::new("3", "05:00", "08:00", "Vanilla");
        assert!(matches!(
            validate_run(ShiftWindow::Day, &run),
            Err(ValidationError::OutsideWindow { .. })
        ));
    }

    #[test]
    fn test_night_window_accepts_run_across_midnight() {
        let run = RunData::new("1", "20:00", "05:00", "Chocolate");
        assert_eq!(validate_run(ShiftWindow::Night, &run).unwrap(), run);
    }

    #[test]
    fn test_window_edges() {
        let day = ShiftWindow::Day;
        assert!(validate_run(day, &RunData::new("1", "06:00", "18:00", "A")).is_ok());
        assert!(validate_run(day, &RunData::new("1", "18:00", "18:30", "A")).is_err());
        assert!(validate_run(day, &RunData::new("1", "17:00", "18:30", "A")).is_err());

        let night = ShiftWindow::Night;
        assert!(validate_run(night, &RunData::new("1", "18:00", "06:00", "A")).is_ok());
        assert!(validate_run(night, &RunData::new("1", "12:00", "14:00", "A")).is_err());
        assert!(validate_run(night, &RunData::new("1", "23:00", "07:00", "A")).is_err());
    }

    #[test]
    fn test_run_must_end_after_start() {
        let run = RunData::new("2", "10:00", "09:00", "Mint");
        assert_eq!(
            validate_run(ShiftWindow::Day, &run),
            Err(ValidationError::EndNotAfterStart {
                start: "10:00".to_string(),
                end: "09:00".to_string()
            })
        );
    }

    #[test]
    fn test_run_missing_fields() {
        let run = RunData::new("2", "10:00", "11:00", "  ");
        assert_eq!(
            validate_run(ShiftWindow::Day, &run),
            Err(ValidationError::MissingField("flavor"))
        );
        let run = RunData::new("", "10:00", "11:00", "Mint");
        assert_eq!(
            validate_run(ShiftWindow::Day, &run),
            Err(ValidationError::MissingField("line"))
        );
    }

    #[test]
    fn test_note_hour_rules() {
        assert_eq!(validate_note_hour(ShiftWindow::Day, "9:00").unwrap(), "09:00");
        assert_eq!(
            validate_note_hour(ShiftWindow::Day, "09:30"),
            Err(ValidationError::NotOnTheHour("09:30".to_string()))
        );
        assert!(validate_note_hour(ShiftWindow::Day, "18:00").is_err());
        assert!(validate_note_hour(ShiftWindow::Night, "02:00").is_ok());
        assert!(validate_note_hour(ShiftWindow::Night, "06:00").is_err());
        assert!(matches!(
            validate_note_hour(ShiftWindow::Day, "25:00"),
            Err(ValidationError::InvalidTime(_))
        ));
    }

    #[test]
    fn test_cell_index_bounds() {
        assert!(validate_cell_index(5).is_ok());
        assert_eq!(validate_cell_index(6), Err(ValidationError::CellOutOfRange(6)));
    }
}
