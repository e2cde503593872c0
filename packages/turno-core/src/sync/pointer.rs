/// Pointer Broadcaster.
///
/// The pointer is a singleton remote record naming the composite key the
/// group is working on. A client with a complete local header publishes its
/// key; a client without one adopts the pointer, or failing that the most
/// recently updated report.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::clock::SyncClock;
use super::echo::{OriginFilter, Verdict};
use super::remote::RemoteStore;
use crate::key::CompositeKey;
use crate::types::{ClientId, HeaderData, PointerRecord};

/// Where the initial key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    LocalHeader,
    Pointer,
    LatestRecord,
}

pub struct PointerBroadcaster {
    client: ClientId,
    remote: Arc<dyn RemoteStore>,
    clock: Arc<SyncClock>,
    filter: Mutex<OriginFilter>,
}

impl PointerBroadcaster {
    pub fn new(client: ClientId, remote: Arc<dyn RemoteStore>, clock: Arc<SyncClock>) -> Self {
        Self {
            filter: Mutex::new(OriginFilter::new(client.clone())),
            client,
            remote,
            clock,
        }
    }

    fn filter(&self) -> MutexGuard<'_, OriginFilter> {
        self.filter.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick the key to follow at startup. Remote failures are logged and
    /// fall through to the next source.
    pub async fn resolve_initial(&self, header: &HeaderData) -> Option<(CompositeKey, KeySource)> {
        if let Some(key) = CompositeKey::from_header(header) {
            self.publish(&key).await;
            return Some((key, KeySource::LocalHeader));
        }

        match self.remote.fetch_pointer().await {
            Ok(Some(pointer)) => {
                self.clock.observe(pointer.updated_at);
                self.filter().mark_seen(pointer.updated_at);
                match CompositeKey::parse(&pointer.current_id) {
                    Ok(key) => return Some((key, KeySource::Pointer)),
                    Err(e) => log::warn!("[turno.sync.pointer] Ignoring pointer: {}", e),
                }
            }
            Ok(None) => log::debug!("[turno.sync.pointer] No pointer published yet"),
            Err(e) => log::warn!("[turno.sync.pointer] Failed to read pointer: {}", e),
        }

        match self.remote.latest_report().await {
            Ok(Some((id, _))) => match CompositeKey::parse(&id) {
                Ok(key) => Some((key, KeySource::LatestRecord)),
                Err(e) => {
                    log::warn!("[turno.sync.pointer] Latest report has an unusable id: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("[turno.sync.pointer] Failed to read latest report: {}", e);
                None
            }
        }
    }

    /// Point everyone at `key`. Returns whether the store took the write.
    pub async fn publish(&self, key: &CompositeKey) -> bool {
        let pointer = PointerRecord {
            current_id: key.id(),
            updated_at: self.clock.next(),
            origin_client: self.client.clone(),
        };
        match self.remote.publish_pointer(&pointer).await {
            Ok(applied) => {
                if applied {
                    self.filter().mark_seen(pointer.updated_at);
                    log::info!("[turno.sync.pointer] Published {}", pointer.current_id);
                }
                applied
            }
            Err(e) => {
                log::warn!("[turno.sync.pointer] Failed to publish {}: {}", pointer.current_id, e);
                false
            }
        }
    }

    /// Decide whether a pointer notification should move this client.
    /// Returns the key to switch to, or `None` for own echoes, stale
    /// pointers, unparsable ids and the key already followed.
    pub fn accept(&self, pointer: &PointerRecord, following: Option<&CompositeKey>) -> Option<CompositeKey> {
        self.clock.observe(pointer.updated_at);
        {
            let mut filter = self.filter();
            match filter.judge(&pointer.origin_client, pointer.updated_at) {
                Verdict::Apply => filter.mark_seen(pointer.updated_at),
                Verdict::SelfEcho | Verdict::Stale => return None,
            }
        }

        let key = match CompositeKey::parse(&pointer.current_id) {
            Ok(key) => key,
            Err(e) => {
                log::warn!("[turno.sync.pointer] Ignoring pointer: {}", e);
                return None;
            }
        };
        if following == Some(&key) {
            return None;
        }
        Some(key)
    }
}
