/// Client session: wires the report editor, the sync engine and the pointer
/// broadcaster to one remote store, and owns the background listeners.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::task::JoinHandle;

use super::clock::SyncClock;
use super::engine::{PushOutcome, RenderBridge, SyncEngine, SyncPhase};
use super::pointer::{KeySource, PointerBroadcaster};
use super::remote::RemoteStore;
use crate::config::SyncSettings;
use crate::export::{paginate_a4, Pagination};
use crate::key::CompositeKey;
use crate::report::{HeaderChange, ReportEditor, ReportError, SyncTrigger};
use crate::storage::local::LocalStore;
use crate::types::{ClientId, HeaderData, PointerRecord, ShiftRecord};

/// Render bridge that closes the editor's bulk edit sessions before remote
/// state lands, then hands the redraw to the presentation layer.
pub struct EditorBridge {
    editor: Arc<ReportEditor>,
    view: Arc<dyn RenderBridge>,
}

impl EditorBridge {
    pub fn new(editor: Arc<ReportEditor>, view: Arc<dyn RenderBridge>) -> Self {
        Self { editor, view }
    }
}

impl RenderBridge for EditorBridge {
    fn cancel_edit_session(&self) -> bool {
        let editor_open = self.editor.cancel_edit_sessions();
        let view_open = self.view.cancel_edit_session();
        editor_open || view_open
    }

    fn redraw(&self, record: &ShiftRecord) {
        self.view.redraw(record);
    }
}

#[derive(Default)]
struct SessionTasks {
    document: Option<JoinHandle<()>>,
    pointer: Option<JoinHandle<()>>,
    periodic: Option<JoinHandle<()>>,
}

impl SessionTasks {
    fn abort_all(&mut self) {
        for task in [self.document.take(), self.pointer.take(), self.periodic.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

pub struct ShiftSession {
    editor: Arc<ReportEditor>,
    engine: Arc<SyncEngine>,
    pointer: PointerBroadcaster,
    settings: SyncSettings,
    tasks: Mutex<SessionTasks>,
}

impl ShiftSession {
    pub fn new(
        client: ClientId,
        store: LocalStore,
        remote: Arc<dyn RemoteStore>,
        view: Arc<dyn RenderBridge>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let editor = Arc::new(ReportEditor::new(store.clone()));
        let bridge = Arc::new(EditorBridge::new(editor.clone(), view));
        let clock = Arc::new(SyncClock::new());
        let engine = SyncEngine::new(
            client.clone(),
            store,
            remote.clone(),
            bridge,
            clock.clone(),
            settings.debounce(),
        );
        let pointer = PointerBroadcaster::new(client, remote, clock);

        Arc::new(Self {
            editor,
            engine,
            pointer,
            settings,
            tasks: Mutex::new(SessionTasks::default()),
        })
    }

    fn tasks(&self) -> MutexGuard<'_, SessionTasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn editor(&self) -> &ReportEditor {
        &self.editor
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn store(&self) -> &LocalStore {
        self.engine.store()
    }

    pub fn client_id(&self) -> &ClientId {
        self.engine.client_id()
    }

    pub fn active_key(&self) -> Option<CompositeKey> {
        self.engine.active_key()
    }

    /// Migrate legacy local records, pick the key to follow, and start the
    /// pointer listener and periodic push. Returns where the key came from.
    pub async fn start(self: &Arc<Self>) -> Option<KeySource> {
        match self.store().migrate_legacy() {
            Ok(outcomes) => {
                for outcome in outcomes {
                    log::info!("[turno.session.start] Legacy storage: {:?}", outcome);
                }
            }
            Err(e) => log::warn!("[turno.session.start] Legacy migration failed: {}", e),
        }

        let header = self.store().header();
        let source = match self.pointer.resolve_initial(&header).await {
            Some((key, source)) => {
                if source != KeySource::LocalHeader {
                    self.backfill_header(&key);
                }
                self.follow(key).await;
                Some(source)
            }
            None => {
                log::info!("[turno.session.start] No shift selected and nothing to follow yet");
                None
            }
        };

        self.spawn_pointer_listener().await;
        self.spawn_periodic_push();
        source
    }

    /// Make `key` the active document: fetch it once, then listen to it.
    pub async fn follow(self: &Arc<Self>, key: CompositeKey) {
        let changed = self.engine.set_active_key(Some(key.clone()));
        let id = key.id();

        match self.engine.remote().fetch_report(&id).await {
            Ok(Some(record)) => {
                let outcome = self.engine.handle_remote(&id, record);
                log::debug!("[turno.session.follow] Initial fetch of {}: {:?}", id, outcome);
            }
            Ok(None) => log::debug!("[turno.session.follow] {} has no remote record yet", id),
            Err(e) => log::warn!("[turno.session.follow] Failed to fetch {}: {}", id, e),
        }

        let listening = self.tasks().document.as_ref().is_some_and(|t| !t.is_finished());
        if changed || !listening {
            self.listen_to(id).await;
        }
    }

    /// Replace the document listener with one on `id`.
    async fn listen_to(&self, id: String) {
        let mut subscription = match self.engine.remote().watch_report(&id).await {
            Ok(subscription) => subscription,
            Err(e) => {
                log::warn!("[turno.session.listen] Failed to listen to {}: {}", id, e);
                self.stop_listening();
                return;
            }
        };

        let engine = Arc::downgrade(&self.engine);
        let task = tokio::spawn(async move {
            while let Some(record) = subscription.next().await {
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                engine.handle_remote(&id, record);
            }
            log::debug!("[turno.session.listen] Listener for {} ended", id);
        });

        if let Some(previous) = self.tasks().document.replace(task) {
            previous.abort();
        }
    }

    fn stop_listening(&self) {
        if let Some(previous) = self.tasks().document.take() {
            previous.abort();
        }
    }

    async fn spawn_pointer_listener(self: &Arc<Self>) {
        let mut subscription = match self.engine.remote().watch_pointer().await {
            Ok(subscription) => subscription,
            Err(e) => {
                log::warn!("[turno.session.pointer] Failed to listen to the pointer: {}", e);
                return;
            }
        };

        let session: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            while let Some(pointer) = subscription.next().await {
                let Some(session) = session.upgrade() else {
                    break;
                };
                session.on_pointer(pointer).await;
            }
        });

        if let Some(previous) = self.tasks().pointer.replace(task) {
            previous.abort();
        }
    }

    fn spawn_periodic_push(&self) {
        let Some(period) = self.settings.periodic_push() else {
            return;
        };
        let engine = Arc::downgrade(&self.engine);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if engine.phase() == SyncPhase::Idle {
                    engine.push().await;
                }
            }
        });

        if let Some(previous) = self.tasks().periodic.replace(task) {
            previous.abort();
        }
    }

    /// Another client moved the pointer. Returns true if this client switched.
    pub async fn on_pointer(self: &Arc<Self>, pointer: PointerRecord) -> bool {
        let following = self.engine.active_key();
        let Some(key) = self.pointer.accept(&pointer, following.as_ref()) else {
            return false;
        };
        log::info!("[turno.session.pointer] Pointer moved to {}, switching", key);
        self.backfill_header(&key);
        self.follow(key).await;
        true
    }

    /// Write the key's date and shift into the local header, keeping the
    /// tank, without raising a local change.
    fn backfill_header(&self, key: &CompositeKey) {
        let _quiet = self.engine.suppress_local();
        let current = self.store().header();
        let header = HeaderData::new(key.shift(), &current.tank, key.date());
        if let Err(e) = self.store().set_header(&header) {
            log::warn!("[turno.session.header] Failed to back-fill header: {}", e);
        }
    }

    /// User edited the header. A new complete key is pushed, then published
    /// as the pointer, then listened to. Followers never see a pointer to a
    /// record that does not exist yet.
    pub async fn set_header(
        self: &Arc<Self>,
        shift: &str,
        tank: &str,
        date: &str,
    ) -> Result<HeaderChange, ReportError> {
        let change = self.editor.set_header(shift, tank, date)?;
        if !change.key_changed {
            self.engine.local_change();
            return Ok(change);
        }

        match &change.key {
            Some(key) => {
                self.engine.set_active_key(Some(key.clone()));
                self.engine.sync_now().await;
                self.pointer.publish(key).await;
                self.listen_to(key.id()).await;
            }
            None => {
                self.engine.set_active_key(None);
                self.stop_listening();
            }
        }
        Ok(change)
    }

    /// Route an editor result to the sync engine.
    pub async fn dispatch(self: &Arc<Self>, trigger: SyncTrigger) -> Option<PushOutcome> {
        match trigger {
            SyncTrigger::LocalOnly => None,
            SyncTrigger::Debounced => {
                self.engine.local_change();
                None
            }
            SyncTrigger::Immediate => Some(self.engine.sync_now().await),
        }
    }

    /// Push the current state, then lay a snapshot of the page out on A4.
    pub async fn export_snapshot(self: &Arc<Self>, image_w: u32, image_h: u32) -> Pagination {
        let trigger = self.editor.request_export();
        self.dispatch(trigger).await;
        paginate_a4(image_w, image_h)
    }
}

impl Drop for ShiftSession {
    fn drop(&mut self) {
        self.tasks().abort_all();
    }
}
