/// Document Sync Engine.
///
/// Keeps the remote shift record for the active composite key in step with
/// the local store. One engine per client. State transitions:
///
///   Idle -> Pushing   local change (debounced) or an immediate sync request
///   Pushing -> Idle   local records assembled, stamped, upserted
///   Idle -> Applying  remote record from another client, newer than last seen
///   Applying -> Idle  local records overwritten, render bridge redrawn
///
/// Triggers that arrive outside Idle are kept as pending (a push flag and
/// the newest remote record) and replayed on the way back to Idle.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use super::clock::{newer, SyncClock};
use super::debounce::Debouncer;
use super::echo::{OriginFilter, Verdict};
use super::remote::RemoteStore;
use crate::key::CompositeKey;
use crate::storage::local::{LocalSnapshot, LocalStore};
use crate::types::{ClientId, ShiftRecord, Timestamp};

/// Presentation hooks invoked when remote state is applied.
pub trait RenderBridge: Send + Sync {
    /// Leave any bulk edit session without applying it. Returns true if one
    /// was open.
    fn cancel_edit_session(&self) -> bool;

    /// Redraw from freshly applied state.
    fn redraw(&self, record: &ShiftRecord);
}

pub struct NoopBridge;

impl RenderBridge for NoopBridge {
    fn cancel_edit_session(&self) -> bool {
        false
    }

    fn redraw(&self, _record: &ShiftRecord) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Pushing,
    Applying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Written with this timestamp.
    Pushed(Timestamp),
    /// The store already held a newer record; nothing was written.
    Superseded(Timestamp),
    /// Another operation was in flight; the push will be replayed.
    Deferred,
    NoActiveKey,
    /// Remote failure, logged and dropped.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Applied(Timestamp),
    SelfEcho,
    Stale,
    /// Arrived mid-operation; kept and replayed on return to Idle.
    Deferred,
    /// For a document other than the one being followed.
    OtherKey,
    /// Local store rejected the write.
    Failed,
}

struct EngineState {
    phase: SyncPhase,
    key: Option<CompositeKey>,
    /// Bumped on every key switch so a push started under one key does not
    /// mark anything seen under the next.
    epoch: u64,
    filter: OriginFilter,
    pending_push: bool,
    pending_remote: Option<(String, ShiftRecord)>,
}

pub struct SyncEngine {
    client: ClientId,
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
    bridge: Arc<dyn RenderBridge>,
    clock: Arc<SyncClock>,
    debounce: Debouncer,
    suppressed: AtomicUsize,
    state: Mutex<EngineState>,
}

/// While alive, local-change triggers are ignored. Used around programmatic
/// writes to the local store.
pub struct SuppressGuard<'a> {
    engine: &'a SyncEngine,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.engine.suppressed.fetch_sub(1, Ordering::AcqRel);
    }
}

impl SyncEngine {
    pub fn new(
        client: ClientId,
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        bridge: Arc<dyn RenderBridge>,
        clock: Arc<SyncClock>,
        debounce: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(EngineState {
                phase: SyncPhase::Idle,
                key: None,
                epoch: 0,
                filter: OriginFilter::new(client.clone()),
                pending_push: false,
                pending_remote: None,
            }),
            client,
            store,
            remote,
            bridge,
            clock,
            debounce: Debouncer::new(debounce),
            suppressed: AtomicUsize::new(0),
        })
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.remote
    }

    pub fn clock(&self) -> &Arc<SyncClock> {
        &self.clock
    }

    pub fn phase(&self) -> SyncPhase {
        self.state().phase
    }

    pub fn active_key(&self) -> Option<CompositeKey> {
        self.state().key.clone()
    }

    /// Newest `updatedAt` seen for the active key.
    pub fn last_seen(&self) -> Timestamp {
        self.state().filter.last_seen()
    }

    pub fn push_pending(&self) -> bool {
        self.state().pending_push
    }

    /// Switch the followed document. Returns true if the key changed; the
    /// last-seen timestamp and any pending remote record are dropped then.
    pub fn set_active_key(&self, key: Option<CompositeKey>) -> bool {
        let mut state = self.state();
        if state.key == key {
            return false;
        }
        log::info!(
            "[turno.sync.key] Following {}",
            key.as_ref().map_or_else(|| "nothing".to_string(), CompositeKey::id)
        );
        state.key = key;
        state.epoch += 1;
        state.filter.reset();
        state.pending_remote = None;
        true
    }

    pub fn suppress_local(&self) -> SuppressGuard<'_> {
        self.suppressed.fetch_add(1, Ordering::AcqRel);
        SuppressGuard { engine: self }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Acquire) > 0
    }

    /// A local edit happened: restart the quiet period. Mid-operation the
    /// push is recorded as pending instead. Returns false when ignored.
    pub fn local_change(self: &Arc<Self>) -> bool {
        if self.is_suppressed() {
            return false;
        }
        {
            let mut state = self.state();
            if state.phase != SyncPhase::Idle {
                state.pending_push = true;
                return true;
            }
        }
        let engine: Weak<Self> = Arc::downgrade(self);
        self.debounce.schedule(async move {
            if let Some(engine) = engine.upgrade() {
                engine.push().await;
            }
        });
        true
    }

    /// Push right away, dropping any pending debounce.
    pub async fn sync_now(self: &Arc<Self>) -> PushOutcome {
        self.debounce.cancel();
        self.push().await
    }

    pub fn debounce_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    /// Assemble the local records into a shift record and upsert it under
    /// the active key. Loops while edits arrived during the write.
    pub async fn push(self: &Arc<Self>) -> PushOutcome {
        {
            let mut state = self.state();
            if state.phase != SyncPhase::Idle {
                state.pending_push = true;
                return PushOutcome::Deferred;
            }
            if state.key.is_none() {
                log::debug!("[turno.sync.push] No active key yet, skipping push");
                return PushOutcome::NoActiveKey;
            }
            state.phase = SyncPhase::Pushing;
            state.pending_push = false;
        }

        let outcome = loop {
            let (key, epoch) = {
                let state = self.state();
                (state.key.clone(), state.epoch)
            };
            let Some(key) = key else {
                break PushOutcome::NoActiveKey;
            };

            let id = key.id();
            let record = self.store.snapshot().into_record(self.clock.next(), self.client.clone());
            let stamp = record.updated_at;

            let outcome = match self.remote.upsert_report(&id, &record).await {
                Ok(true) => {
                    let mut state = self.state();
                    if state.epoch == epoch {
                        state.filter.mark_seen(stamp);
                    }
                    log::debug!("[turno.sync.push] Pushed {} at {}", id, stamp);
                    PushOutcome::Pushed(stamp)
                }
                Ok(false) => {
                    log::info!("[turno.sync.push] {} already holds a newer record", id);
                    PushOutcome::Superseded(stamp)
                }
                Err(e) => {
                    log::warn!("[turno.sync.push] Failed to push {}: {}", id, e);
                    PushOutcome::Failed
                }
            };

            let mut state = self.state();
            if !state.pending_push {
                break outcome;
            }
            state.pending_push = false;
        };

        let pending_remote = {
            let mut state = self.state();
            state.phase = SyncPhase::Idle;
            state.pending_remote.take()
        };
        if let Some((id, record)) = pending_remote {
            self.handle_remote(&id, record);
        }
        outcome
    }

    /// A remote record arrived for `id`, from a fetch or a listener.
    pub fn handle_remote(self: &Arc<Self>, id: &str, record: ShiftRecord) -> RemoteOutcome {
        let stamp = record.updated_at;
        let epoch = {
            let mut state = self.state();
            if state.key.as_ref().map(CompositeKey::id).as_deref() != Some(id) {
                return RemoteOutcome::OtherKey;
            }
            self.clock.observe(stamp);

            match state.filter.judge(&record.origin_client, stamp) {
                Verdict::SelfEcho => return RemoteOutcome::SelfEcho,
                Verdict::Stale => return RemoteOutcome::Stale,
                Verdict::Apply => {}
            }

            if state.phase != SyncPhase::Idle {
                let replace = state
                    .pending_remote
                    .as_ref()
                    .map_or(true, |(_, pending)| newer(stamp, pending.updated_at));
                if replace {
                    state.pending_remote = Some((id.to_string(), record));
                }
                return RemoteOutcome::Deferred;
            }
            state.phase = SyncPhase::Applying;
            state.epoch
        };

        let applied = self.apply(&record);

        let replay_push = {
            let mut state = self.state();
            state.phase = SyncPhase::Idle;
            if applied && state.epoch == epoch {
                state.filter.mark_seen(stamp);
            }
            std::mem::take(&mut state.pending_push)
        };
        if replay_push {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.push().await;
            });
        }

        if applied {
            RemoteOutcome::Applied(stamp)
        } else {
            RemoteOutcome::Failed
        }
    }

    /// Overwrite the four local records from `record`.
    fn apply(&self, record: &ShiftRecord) -> bool {
        let _quiet = self.suppress_local();

        if self.bridge.cancel_edit_session() {
            log::info!("[turno.sync.apply] Closed an open edit session before applying remote state");
        }

        let mut snapshot = LocalSnapshot::from_record(record);
        snapshot.header = snapshot.header.with_derived_weekday();
        match self.store.replace_all(&snapshot) {
            Ok(()) => {
                log::debug!(
                    "[turno.sync.apply] Applied record from {} at {}",
                    record.origin_client,
                    record.updated_at
                );
                self.bridge.redraw(record);
                true
            }
            Err(e) => {
                log::error!("[turno.sync.apply] Failed to write remote state locally: {}", e);
                false
            }
        }
    }
}
