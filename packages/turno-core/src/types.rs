use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::key::CompositeKey;

/// Number of editable cells per production table row.
pub const MAX_TABLE_CELLS: usize = 6;

/// Spanish day names, indexed from Sunday, as shown in the report header.
const WEEKDAY_LABELS: [&str; 7] = [
    "Domingo",
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
];

/// Line identifier as typed on the page ("1", "2", "L3", ...).
///
/// Numeric ids order numerically so line 10 sorts after line 9.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub String);

impl LineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Ord for LineId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<u64>(), other.0.parse::<u64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            _ => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for LineId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Milliseconds since the Unix epoch. Only ever compared through
/// [`crate::sync::clock::newer`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque per-session writer tag used for self-echo suppression.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl ClientId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Report header. Field names on disk follow the page's form ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderData {
    #[serde(rename = "turno", default)]
    pub shift: String,
    #[serde(rename = "tn", default)]
    pub tank: String,
    #[serde(rename = "fecha", default)]
    pub date: String,
    /// Derived from `date`; never authoritative.
    #[serde(rename = "dia", default)]
    pub weekday: String,
}

impl HeaderData {
    pub fn new(shift: &str, tank: &str, date: &str) -> Self {
        let date = date.trim().to_string();
        Self {
            shift: shift.trim().to_string(),
            tank: tank.trim().to_string(),
            weekday: weekday_label(&date),
            date,
        }
    }

    /// Recompute the weekday from the date, discarding whatever was stored.
    pub fn with_derived_weekday(mut self) -> Self {
        self.weekday = weekday_label(&self.date);
        self
    }

    pub fn composite_key(&self) -> Option<CompositeKey> {
        CompositeKey::from_header(self)
    }
}

/// Weekday label for an ISO `YYYY-MM-DD` date; empty when the date is missing
/// or malformed.
pub fn weekday_label(date: &str) -> String {
    match NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") {
        Ok(day) => {
            let index = match day.weekday() {
                Weekday::Sun => 0,
                other => other.number_from_monday() as usize,
            };
            WEEKDAY_LABELS[index].to_string()
        }
        Err(_) => String::new(),
    }
}

/// A scheduled production interval on one line. Identity is the full tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunData {
    #[serde(rename = "linea")]
    pub line: LineId,
    #[serde(rename = "inicio")]
    pub start: String,
    #[serde(rename = "fin")]
    pub end: String,
    #[serde(rename = "sabor")]
    pub flavor: String,
}

impl RunData {
    pub fn new(line: &str, start: &str, end: &str, flavor: &str) -> Self {
        Self {
            line: LineId::new(line),
            start: start.trim().to_string(),
            end: end.trim().to_string(),
            flavor: flavor.trim().to_string(),
        }
    }
}

/// Timestamped incident note ("novedad") attached to a line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteData {
    /// Stable identity for bulk edits. Notes saved by older builds carry
    /// none and get one assigned when first read.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "linea")]
    pub line: LineId,
    #[serde(rename = "hora")]
    pub hour: String,
    #[serde(rename = "texto")]
    pub text: String,
}

impl NoteData {
    pub fn new(line: &str, hour: &str, text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            line: LineId::new(line),
            hour: hour.trim().to_string(),
            text: text.trim().to_string(),
        }
    }
}

/// One production table row, keyed by line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowData {
    #[serde(rename = "linea")]
    pub line: LineId,
    #[serde(rename = "celdas", default)]
    pub cells: Vec<String>,
}

impl RowData {
    pub fn new(line: &str) -> Self {
        Self {
            line: LineId::new(line),
            cells: vec![String::new(); MAX_TABLE_CELLS],
        }
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.trim().is_empty())
    }
}

/// The unit of remote storage: the four local records plus sync metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShiftRecord {
    #[serde(default, alias = "encabezado")]
    pub header: HeaderData,
    #[serde(default, alias = "tabla")]
    pub table: Vec<RowData>,
    #[serde(default, alias = "corridas")]
    pub runs: Vec<RunData>,
    #[serde(default, alias = "novedades")]
    pub notes: Vec<NoteData>,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub origin_client: ClientId,
}

/// Singleton remote record naming the composite key clients should follow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerRecord {
    pub current_id: String,
    #[serde(default)]
    pub updated_at: Timestamp,
    #[serde(default)]
    pub origin_client: ClientId,
}

/// The 12-hour window the timeline and time validation use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShiftWindow {
    #[default]
    #[serde(rename = "06-18")]
    Day,
    #[serde(rename = "18-06")]
    Night,
}

pub const WINDOW_MINUTES: i64 = 12 * 60;
const MINUTES_PER_DAY: i64 = 24 * 60;

impl ShiftWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftWindow::Day => "06-18",
            ShiftWindow::Night => "18-06",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "06-18" => Some(ShiftWindow::Day),
            "18-06" => Some(ShiftWindow::Night),
            _ => None,
        }
    }

    pub fn start_hour(&self) -> u32 {
        match self {
            ShiftWindow::Day => 6,
            ShiftWindow::Night => 18,
        }
    }

    /// Minutes from the window start for a time of day. Times before the
    /// window start wrap forward a full day for the night window, and go
    /// negative for the day window.
    pub fn offset(&self, minute_of_day: u32) -> i64 {
        let start = i64::from(self.start_hour()) * 60;
        let m = i64::from(minute_of_day);
        match self {
            ShiftWindow::Day => m - start,
            ShiftWindow::Night if m >= start => m - start,
            ShiftWindow::Night => m + (MINUTES_PER_DAY - start),
        }
    }
}

impl fmt::Display for ShiftWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page mode: editing ("carga") or read-only ("lectura").
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiMode {
    #[default]
    #[serde(rename = "carga")]
    Edit,
    #[serde(rename = "lectura")]
    Read,
}

impl UiMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            UiMode::Edit => "carga",
            UiMode::Read => "lectura",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "carga" => Some(UiMode::Edit),
            "lectura" => Some(UiMode::Read),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekday_label_from_iso_date() {
        assert_eq!(weekday_label("2025-01-10"), "Viernes");
        assert_eq!(weekday_label("2025-01-12"), "Domingo");
        assert_eq!(weekday_label(""), "");
        assert_eq!(weekday_label("10/01/2025"), "");
    }

    #[test]
    fn test_header_weekday_is_recomputed() {
        let header = HeaderData {
            shift: "Shift A".to_string(),
            tank: "T4".to_string(),
            date: "2025-01-13".to_string(),
            weekday: "Domingo".to_string(),
        };
        assert_eq!(header.with_derived_weekday().weekday, "Lunes");
    }

    #[test]
    fn test_line_ids_order_numerically() {
        let mut lines = vec![LineId::new("10"), LineId::new("2"), LineId::new("1")];
        lines.sort();
        let ordered: Vec<&str> = lines.iter().map(|l| l.as_str()).collect();
        assert_eq!(ordered, vec!["1", "2", "10"]);
    }

    #[test]
    fn test_record_accepts_legacy_field_names() {
        let json = r#"{
            "encabezado": {"turno": "Turno B", "fecha": "2025-02-01"},
            "corridas": [{"linea": "3", "inicio": "08:00", "fin": "10:00", "sabor": "Vainilla"}],
            "novedades": [],
            "tabla": []
        }"#;
        let record: ShiftRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.header.shift, "Turno B");
        assert_eq!(record.runs.len(), 1);
        assert_eq!(record.updated_at, Timestamp(0));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = ShiftRecord {
            updated_at: Timestamp(42),
            origin_client: ClientId("abc".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["updatedAt"], 42);
        assert_eq!(value["originClient"], "abc");
        assert!(value.get("header").is_some());
    }

    #[test]
    fn test_night_window_offsets_wrap_midnight() {
        let night = ShiftWindow::Night;
        assert_eq!(night.offset(18 * 60), 0);
        assert_eq!(night.offset(20 * 60), 120);
        assert_eq!(night.offset(5 * 60), 660);
        assert_eq!(ShiftWindow::Day.offset(5 * 60), -60);
    }

    #[test]
    fn test_window_and_mode_strings() {
        assert_eq!(ShiftWindow::from_str("18-06"), Some(ShiftWindow::Night));
        assert_eq!(ShiftWindow::from_str("bogus"), None);
        assert_eq!(UiMode::from_str("lectura"), Some(UiMode::Read));
        assert_eq!(UiMode::Edit.as_str(), "carga");
    }
}
