/// Composite key: the `(date, shift)` pair that names one shift report and
/// doubles as its remote document id (`<date>_<shift with spaces as _>`).
use std::fmt;
use std::str::FromStr;

use crate::types::HeaderData;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Composite key needs both a date and a shift")]
    Incomplete,

    #[error("Malformed document id: {0}")]
    Malformed(String),
}

/// Two keys are equal exactly when their document ids are.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    date: String,
    /// Shift label with underscores read as spaces and whitespace collapsed.
    shift: String,
}

/// Collapse whitespace runs to a single separator.
fn collapse(s: &str, sep: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(sep)
}

impl CompositeKey {
    pub fn new(date: &str, shift: &str) -> Result<Self, KeyError> {
        let date = collapse(date, "_");
        let shift = collapse(&shift.replace('_', " "), " ");
        if date.is_empty() || shift.is_empty() {
            return Err(KeyError::Incomplete);
        }
        Ok(Self { date, shift })
    }

    /// Key for a header, or `None` while date or shift is still empty.
    pub fn from_header(header: &HeaderData) -> Option<Self> {
        Self::new(&header.date, &header.shift).ok()
    }

    /// Parse a document id back into its parts. The date is everything before
    /// the first underscore; underscores in the remainder become spaces.
    pub fn parse(id: &str) -> Result<Self, KeyError> {
        let (date, shift) = id
            .trim()
            .split_once('_')
            .ok_or_else(|| KeyError::Malformed(id.to_string()))?;
        Self::new(date, shift).map_err(|_| KeyError::Malformed(id.to_string()))
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn shift(&self) -> &str {
        &self.shift
    }

    /// Deterministic remote document id.
    pub fn id(&self) -> String {
        format!("{}_{}", self.date, self.shift.replace(' ', "_"))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

impl FromStr for CompositeKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
