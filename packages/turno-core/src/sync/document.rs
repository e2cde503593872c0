/// Schemaless remote document: a JSON object with the sync metadata fields
/// at the top level. Stores keep documents in this form so upsert-merges
/// leave unknown fields alone.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::clock::newer;
use crate::types::{ShiftRecord, Timestamp};

pub const UPDATED_AT_FIELD: &str = "updatedAt";
pub const ORIGIN_FIELD: &str = "originClient";
/// Older writers stamped documents with an RFC 3339 string instead.
const LEGACY_TIMESTAMP_FIELD: &str = "timestamp";

/// Current field name and the name older writers used for it.
const LEGACY_FIELDS: [(&str, &str); 5] = [
    ("header", "encabezado"),
    ("table", "tabla"),
    ("runs", "corridas"),
    ("notes", "novedades"),
    (UPDATED_AT_FIELD, LEGACY_TIMESTAMP_FIELD),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid document id: {0:?}")]
pub struct InvalidDocumentId(pub String);

/// Document ids double as file names on the self-hosted store.
pub fn validate_document_id(id: &str) -> Result<(), InvalidDocumentId> {
    let invalid = id.is_empty()
        || id.starts_with('.')
        || id.contains('/')
        || id.contains('\\')
        || id.contains("..")
        || id.chars().any(char::is_control);
    if invalid {
        return Err(InvalidDocumentId(id.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, serde_json::Error> {
        match serde_json::to_value(record)? {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(serde::ser::Error::custom(format!(
                "expected a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn updated_at(&self) -> Timestamp {
        if let Some(ms) = self.0.get(UPDATED_AT_FIELD).and_then(Value::as_u64) {
            return Timestamp(ms);
        }
        self.0
            .get(LEGACY_TIMESTAMP_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| Timestamp(dt.timestamp_millis().max(0) as u64))
            .unwrap_or_default()
    }

    pub fn origin(&self) -> Option<&str> {
        self.0.get(ORIGIN_FIELD).and_then(Value::as_str)
    }

    /// Top-level upsert-merge: incoming fields replace ours, fields absent
    /// from `incoming` are kept. A legacy field goes away once its current
    /// name is written.
    pub fn merge(&mut self, incoming: Document) {
        for (field, value) in incoming.0 {
            self.0.insert(field, value);
        }
        self.drop_superseded();
    }

    fn drop_superseded(&mut self) {
        for (current, legacy) in LEGACY_FIELDS {
            if self.0.contains_key(current) {
                self.0.remove(legacy);
            }
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.0.clone()))
    }

    /// Decode as a shift record, carrying a legacy timestamp over. Where a
    /// document holds both a field and its legacy name, the current one wins.
    pub fn to_shift_record(&self) -> Result<ShiftRecord, serde_json::Error> {
        let mut current = self.clone();
        current.drop_superseded();
        let mut record: ShiftRecord = current.decode()?;
        if record.updated_at == Timestamp::default() {
            record.updated_at = self.updated_at();
        }
        Ok(record)
    }
}

/// Last-writer-wins upsert into a document slot. Returns whether the
/// incoming document was applied.
pub fn upsert(slot: &mut Option<Document>, incoming: Document) -> bool {
    match slot {
        Some(existing) => {
            if !newer(incoming.updated_at(), existing.updated_at()) {
                return false;
            }
            existing.merge(incoming);
            true
        }
        None => {
            *slot = Some(incoming);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_ids() {
        assert!(validate_document_id("2025-01-10_Shift_A").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("../etc").is_err());
        assert!(validate_document_id("a/b").is_err());
        assert!(validate_document_id(".hidden").is_err());
    }

    #[test]
    fn test_upsert_keeps_untouched_fields() {
        let mut slot = Some(doc(json!({"header": {"turno": "A"}, "notes": [], "updatedAt": 1})));
        let applied = upsert(&mut slot, doc(json!({"runs": [], "updatedAt": 2})));
        assert!(applied);

        let merged = slot.unwrap();
        assert_eq!(merged.updated_at(), Timestamp(2));
        assert!(merged.fields().contains_key("header"));
        assert!(merged.fields().contains_key("runs"));
    }

    #[test]
    fn test_upsert_rejects_older_or_equal() {
        let mut slot = Some(doc(json!({"updatedAt": 5, "originClient": "a"})));
        assert!(!upsert(&mut slot, doc(json!({"updatedAt": 5, "originClient": "b"}))));
        assert!(!upsert(&mut slot, doc(json!({"updatedAt": 4, "originClient": "b"}))));
        assert_eq!(slot.unwrap().origin(), Some("a"));
    }

    #[test]
    fn test_new_write_over_legacy_document() {
        let mut slot = Some(doc(json!({
            "encabezado": {"turno": "A", "fecha": "2025-01-10"},
            "tabla": [],
            "corridas": [{"linea": "3", "inicio": "08:00", "fin": "10:00", "sabor": "Vanilla"}],
            "novedades": [],
            "timestamp": "2025-01-10T12:00:00Z"
        })));
        assert_eq!(slot.as_ref().unwrap().to_shift_record().unwrap().header.shift, "A");

        let record = ShiftRecord {
            header: crate::types::HeaderData::new("B", "T1", "2025-01-10"),
            updated_at: Timestamp(1_736_510_400_001),
            ..Default::default()
        };
        assert!(upsert(&mut slot, Document::from_record(&record).unwrap()));

        let stored = slot.unwrap();
        for legacy in ["encabezado", "tabla", "corridas", "novedades", "timestamp"] {
            assert!(!stored.fields().contains_key(legacy), "{} kept", legacy);
        }
        let decoded = stored.to_shift_record().unwrap();
        assert_eq!(decoded.header.shift, "B");
        assert_eq!(decoded.updated_at, Timestamp(1_736_510_400_001));
    }

    #[test]
    fn test_document_with_both_names_decodes() {
        let mixed = doc(json!({
            "encabezado": {"turno": "old"},
            "header": {"turno": "new"},
            "updatedAt": 3
        }));
        assert_eq!(mixed.to_shift_record().unwrap().header.shift, "new");
    }

    #[test]
    fn test_legacy_timestamp() {
        let legacy = doc(json!({"encabezado": {"fecha": "2025-01-10"}, "timestamp": "2025-01-10T12:00:00Z"}));
        let record = legacy.to_shift_record().unwrap();
        assert_eq!(record.updated_at, Timestamp(1_736_510_400_000));
        assert_eq!(record.header.date, "2025-01-10");
    }
}
