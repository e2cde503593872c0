/// Origin filter for incoming remote notifications.
///
/// A notification written by this client is a self-echo and is dropped.
/// A notification not newer than the last timestamp seen is stale and is
/// dropped. Everything else is applied, after which the caller marks its
/// timestamp as seen.
use super::clock::newer;
use crate::types::{ClientId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Apply,
    SelfEcho,
    Stale,
}

#[derive(Debug, Clone)]
pub struct OriginFilter {
    local: ClientId,
    last_seen: Timestamp,
}

impl OriginFilter {
    pub fn new(local: ClientId) -> Self {
        Self {
            local,
            last_seen: Timestamp::default(),
        }
    }

    pub fn local(&self) -> &ClientId {
        &self.local
    }

    pub fn last_seen(&self) -> Timestamp {
        self.last_seen
    }

    pub fn judge(&self, origin: &ClientId, updated_at: Timestamp) -> Verdict {
        if *origin == self.local {
            Verdict::SelfEcho
        } else if !newer(updated_at, self.last_seen) {
            Verdict::Stale
        } else {
            Verdict::Apply
        }
    }

    /// Record a timestamp as seen. Never moves backwards.
    pub fn mark_seen(&mut self, updated_at: Timestamp) {
        if newer(updated_at, self.last_seen) {
            self.last_seen = updated_at;
        }
    }

    /// Forget what was seen; used when the followed document changes.
    pub fn reset(&mut self) {
        self.last_seen = Timestamp::default();
    }
}
