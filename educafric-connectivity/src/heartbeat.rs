//! RESILIENCE HEARTBEAT - détection hors-ligne, file d'attente et resynchro
//!
//! RÔLE :
//! Tourne à côté du scheduler avec son propre heartbeat, bien plus rapide.
//! Le code métier qui doit fonctionner hors-ligne passe directement par cette
//! couche : il y met ses écritures en file et écoute les events online/offline.
//!
//! FONCTIONNEMENT :
//! - `Online -> Offline` après `failure_threshold` (3) échecs consécutifs, émis une seule fois
//! - `Offline -> Online` sur un heartbeat réussi, un signal "online" de la plateforme
//!   ou une requête applicative réussie vue par le client monitoré
//! - Cadence 15s (30s low-end), doublée à chaque échec jusqu'à 60s ; 120s une fois
//!   hors-ligne sur appareil low-end ou batterie faible
//! - Au retour : récupère les notifications manquées (ce qui avance `last_sync`),
//!   puis pousse les actions en un seul lot ; la file n'est vidée que sur un 2xx
//! - La file, les notifications et `last_sync` sont écrits dans le store toutes
//!   les 30s et restaurés à la construction

use crate::clock::SharedClock;
use crate::config::HeartbeatSettings;
use crate::device::DeviceProfile;
use crate::error::TransportError;
use crate::queue::{OfflineQueue, OfflineQueueEntry};
use crate::runtime::SharedRuntime;
use crate::storage::SharedStore;
use crate::transport::{HttpRequest, HttpResponse, NetworkObserver, SharedTransport};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const OFFLINE_STORAGE_KEY: &str = "educafric_offline_data";
pub const LAST_SYNC_HEADER: &str = "Last-Sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Online,
    Offline,
}

/// Events for collaborators
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ConnectionEvent {
    /// `offline_time` is when the outage started (epoch ms)
    Offline {
        #[serde(rename = "offlineTime")]
        offline_time: i64,
    },
    /// `offline_time` is how long the outage lasted (ms)
    Online {
        #[serde(rename = "offlineTime")]
        offline_time: i64,
        #[serde(rename = "pendingActions")]
        pending_actions: usize,
    },
    MissedNotifications { count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineStats {
    pub actions_count: usize,
    pub offline_time_ms: i64,
}

/// Persisted shape under [`OFFLINE_STORAGE_KEY`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineSnapshot {
    #[serde(default)]
    pub notifications: Vec<serde_json::Value>,
    #[serde(default)]
    pub user_actions: Vec<OfflineQueueEntry>,
    #[serde(default)]
    pub last_sync: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OfflineSyncPayload<'a> {
    actions: &'a [OfflineQueueEntry],
    offline_time: i64,
}

#[derive(Clone)]
pub struct ResilienceHeartbeat {
    inner: Arc<HeartbeatInner>,
}

struct HeartbeatInner {
    weak_self: Weak<HeartbeatInner>,
    settings: HeartbeatSettings,
    low_end: bool,
    base_interval: Duration,
    request_timeout: Duration,
    transport: SharedTransport,
    runtime: SharedRuntime,
    store: SharedStore,
    clock: SharedClock,
    /// Dropped on destroy so subscribers see `Closed`
    events: Mutex<Option<broadcast::Sender<ConnectionEvent>>>,
    state: Mutex<HeartbeatState>,
}

struct HeartbeatState {
    mode: ConnectionMode,
    consecutive_failures: u32,
    offline_since_ms: Option<i64>,
    queue: OfflineQueue,
    notifications: Vec<serde_json::Value>,
    last_sync_ms: i64,
    current_interval: Duration,
    syncing: bool,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
    destroyed: bool,
}

impl ResilienceHeartbeat {
    pub fn new(
        profile: &DeviceProfile,
        settings: HeartbeatSettings,
        transport: SharedTransport,
        runtime: SharedRuntime,
        store: SharedStore,
        clock: SharedClock,
    ) -> Self {
        let base_interval = profile.heartbeat_interval();
        let (events, _) = broadcast::channel(64);
        let mut state = HeartbeatState {
            mode: ConnectionMode::Online,
            consecutive_failures: 0,
            offline_since_ms: None,
            queue: OfflineQueue::with_capacity(profile.offline_queue_capacity()),
            notifications: Vec::new(),
            last_sync_ms: clock.now_ms(),
            current_interval: base_interval,
            syncing: false,
            tasks: Vec::new(),
            started: false,
            destroyed: false,
        };
        restore_snapshot(store.as_ref(), &mut state, settings.max_stored_notifications);

        let inner = Arc::new_cyclic(|weak_self| HeartbeatInner {
            weak_self: weak_self.clone(),
            low_end: profile.is_low_end(),
            base_interval,
            request_timeout: profile.optimization.connection_timeout,
            settings,
            transport,
            runtime,
            store,
            clock,
            events: Mutex::new(Some(events)),
            state: Mutex::new(state),
        });

        info!(
            "resilience heartbeat ready (every {:?}, queue capacity {})",
            base_interval,
            profile.offline_queue_capacity()
        );
        Self { inner }
    }

    /// Spawns the heartbeat loop, the periodic persistence and the platform
    /// link watcher. Must be called inside a tokio runtime. No-op once started.
    pub fn start(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.started || state.destroyed {
                return;
            }
            state.started = true;
        }

        let tasks = vec![
            spawn_heartbeat_loop(&self.inner),
            spawn_persist_loop(&self.inner),
            spawn_link_watcher(&self.inner),
        ];
        self.inner.state.lock().tasks.extend(tasks);
    }

    /// After `destroy` the receiver is already closed
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        match self.inner.events.lock().as_ref() {
            Some(events) => events.subscribe(),
            None => broadcast::channel(1).1,
        }
    }

    /// Observer to register on the application's [`crate::transport::MonitoredClient`]
    pub fn observer(&self) -> Weak<dyn NetworkObserver> {
        Arc::downgrade(&self.inner) as Weak<dyn NetworkObserver>
    }

    /// One heartbeat; returns whether it succeeded
    pub async fn beat(&self) -> bool {
        self.inner.beat().await
    }

    /// Buffers an action for the next recovery sync; returns its id
    pub fn queue_offline_action(&self, payload: serde_json::Value) -> String {
        let entry = OfflineQueueEntry::new(payload, self.inner.clock.now_ms());
        let id = entry.id.clone();
        let mut state = self.inner.state.lock();
        if let Some(evicted) = state.queue.push(entry) {
            debug!("offline queue full, evicted {}", evicted.id);
        }
        debug!("queued offline action {} ({} pending)", id, state.queue.len());
        id
    }

    pub fn is_offline_mode(&self) -> bool {
        self.inner.state.lock().mode == ConnectionMode::Offline
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.inner.state.lock().mode
    }

    pub fn offline_stats(&self) -> OfflineStats {
        let now = self.inner.clock.now_ms();
        let state = self.inner.state.lock();
        OfflineStats {
            actions_count: state.queue.len(),
            offline_time_ms: state.offline_since_ms.map(|since| (now - since).max(0)).unwrap_or(0),
        }
    }

    pub fn pending_actions(&self) -> Vec<OfflineQueueEntry> {
        self.inner.state.lock().queue.snapshot()
    }

    pub fn missed_notifications(&self) -> Vec<serde_json::Value> {
        self.inner.state.lock().notifications.clone()
    }

    pub fn last_sync_ms(&self) -> i64 {
        self.inner.state.lock().last_sync_ms
    }

    pub fn current_interval(&self) -> Duration {
        self.inner.state.lock().current_interval
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.state.lock().consecutive_failures
    }

    /// Resets the backoff and heartbeats right away
    pub async fn force_reconnect(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            state.consecutive_failures = 0;
            state.current_interval = self.inner.base_interval;
        }
        info!("forced reconnect");
        self.inner.beat().await
    }

    /// Platform reports the link is up
    pub async fn handle_online_event(&self) {
        self.inner.go_online("platform online event").await;
    }

    /// Platform reports the link is down; still needs the failure threshold
    pub async fn handle_offline_event(&self) {
        self.inner.beat().await;
    }

    /// Writes the snapshot to the store; failures are logged and ignored
    pub fn persist(&self) {
        self.inner.persist();
    }

    pub fn destroy(&self) {
        let tasks = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            std::mem::take(&mut state.tasks)
        };
        for task in tasks {
            task.abort();
        }
        self.inner.events.lock().take();
        self.inner.persist();
        info!("resilience heartbeat destroyed");
    }
}

impl HeartbeatInner {
    fn emit(&self, event: ConnectionEvent) {
        if let Some(events) = self.events.lock().as_ref() {
            let _ = events.send(event);
        }
    }

    async fn beat(&self) -> bool {
        if self.state.lock().destroyed {
            return false;
        }

        let request = HttpRequest::head(self.settings.heartbeat_path.clone());
        let outcome = tokio::time::timeout(self.request_timeout, self.transport.execute(request)).await;
        let ok = matches!(&outcome, Ok(Ok(response)) if response.is_success());

        if ok {
            self.record_success().await;
        } else {
            let reason = match outcome {
                Err(_) => "Timeout".to_string(),
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(response)) => format!("HTTP {}", response.status),
            };
            self.record_failure(&reason);
        }
        ok
    }

    async fn record_success(&self) {
        let was_offline = {
            let mut state = self.state.lock();
            state.consecutive_failures = 0;
            state.current_interval = self.base_interval;
            state.mode == ConnectionMode::Offline
        };
        if was_offline {
            self.go_online("heartbeat succeeded").await;
        }
    }

    fn record_failure(&self, reason: &str) {
        let now = self.clock.now_ms();
        let went_offline = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            state.current_interval = self.backoff_interval(state.consecutive_failures);

            let threshold_reached = state.consecutive_failures >= self.settings.failure_threshold;
            let went_offline = threshold_reached && state.mode == ConnectionMode::Online;
            if went_offline {
                state.mode = ConnectionMode::Offline;
                state.offline_since_ms = Some(now);
            }
            if state.mode == ConnectionMode::Offline && self.low_power() {
                state.current_interval = self.settings.low_power_interval();
            }
            debug!(
                "heartbeat failed: {} ({} consecutive, next in {:?})",
                reason, state.consecutive_failures, state.current_interval
            );
            went_offline
        };

        if went_offline {
            warn!("connection lost, entering offline mode");
            self.emit(ConnectionEvent::Offline { offline_time: now });
        }
    }

    /// `min(base * 2^failures, max)`
    fn backoff_interval(&self, failures: u32) -> Duration {
        let factor = 1u32 << failures.min(16);
        self.base_interval
            .saturating_mul(factor)
            .min(self.settings.max_interval())
            .max(self.base_interval)
    }

    fn low_power(&self) -> bool {
        self.low_end
            || self
                .runtime
                .battery_level()
                .map(|level| level < self.settings.low_battery_threshold)
                .unwrap_or(false)
    }

    async fn go_online(&self, trigger: &str) {
        let now = self.clock.now_ms();
        let (offline_time, pending_actions) = {
            let mut state = self.state.lock();
            if state.destroyed || state.mode == ConnectionMode::Online {
                return;
            }
            state.mode = ConnectionMode::Online;
            state.consecutive_failures = 0;
            state.current_interval = self.base_interval;
            let since = state.offline_since_ms.take().unwrap_or(now);
            ((now - since).max(0), state.queue.len())
        };

        info!(
            "connection restored ({}), offline for {}ms with {} pending actions",
            trigger, offline_time, pending_actions
        );
        self.emit(ConnectionEvent::Online { offline_time, pending_actions });
        self.sync_after_recovery(offline_time).await;
    }

    async fn sync_after_recovery(&self, offline_time: i64) {
        let (last_sync, actions) = {
            let mut state = self.state.lock();
            if state.syncing {
                debug!("recovery sync already running");
                return;
            }
            state.syncing = true;
            (state.last_sync_ms, state.queue.snapshot())
        };

        self.fetch_missed_notifications(last_sync).await;
        if !actions.is_empty() {
            self.flush_queue(&actions, offline_time).await;
        }

        self.state.lock().syncing = false;
        self.persist();
    }

    /// A 2xx moves `last_sync_ms` to the fetch start so the next recovery
    /// only asks for what arrived after it
    async fn fetch_missed_notifications(&self, last_sync: i64) {
        let started = self.clock.now_ms();
        let request = HttpRequest::get(self.settings.missed_notifications_path.clone())
            .header(LAST_SYNC_HEADER, last_sync.to_string());

        let response = match self.send(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!("missed notifications fetch failed: HTTP {}", response.status);
                return;
            }
            Err(e) => {
                warn!("missed notifications fetch failed: {}", e);
                return;
            }
        };

        let fetched = parse_notifications(&response);
        let count = fetched.len();
        {
            let mut state = self.state.lock();
            state.last_sync_ms = state.last_sync_ms.max(started);
            state.notifications.extend(fetched);
            let max = self.settings.max_stored_notifications;
            if state.notifications.len() > max {
                let overflow = state.notifications.len() - max;
                state.notifications.drain(..overflow);
            }
        }
        if count > 0 {
            info!("received {} missed notifications", count);
            self.emit(ConnectionEvent::MissedNotifications { count });
        }
    }

    async fn flush_queue(&self, actions: &[OfflineQueueEntry], offline_time: i64) -> bool {
        let payload = OfflineSyncPayload { actions, offline_time };
        let request = match HttpRequest::post_json(self.settings.sync_path.clone(), &payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("offline actions not serializable: {}", e);
                return false;
            }
        };

        match self.send(request).await {
            Ok(response) if response.is_success() => {
                let ids: Vec<String> = actions.iter().map(|a| a.id.clone()).collect();
                let now = self.clock.now_ms();
                let mut state = self.state.lock();
                state.queue.acknowledge(&ids);
                state.last_sync_ms = now;
                info!("synced {} offline actions", ids.len());
                true
            }
            Ok(response) => {
                warn!("offline sync rejected: HTTP {}, keeping queue", response.status);
                false
            }
            Err(e) => {
                warn!("offline sync failed: {}, keeping queue", e);
                false
            }
        }
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tokio::time::timeout(self.request_timeout, self.transport.execute(request))
            .await
            .unwrap_or(Err(TransportError::Timeout))
    }

    fn persist(&self) {
        let snapshot = {
            let state = self.state.lock();
            OfflineSnapshot {
                notifications: state.notifications.clone(),
                user_actions: state.queue.snapshot(),
                last_sync: state.last_sync_ms,
            }
        };

        let result = serde_json::to_string(&snapshot)
            .map_err(crate::error::StorageError::from)
            .and_then(|json| self.store.store(OFFLINE_STORAGE_KEY, &json));
        match result {
            Ok(()) => debug!("offline snapshot saved ({} actions)", snapshot.user_actions.len()),
            Err(e) => warn!("failed to save offline snapshot: {}", e),
        }
    }
}

impl NetworkObserver for HeartbeatInner {
    fn on_response(&self, response: &HttpResponse) {
        if !response.is_success() || self.state.lock().mode == ConnectionMode::Online {
            return;
        }
        let Some(inner) = self.weak_self.upgrade() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    inner.go_online("application request succeeded").await;
                });
            }
            Err(_) => debug!("no runtime to run recovery from observed request"),
        }
    }

    fn on_network_error(&self, error: &TransportError) {
        self.record_failure(&format!("application request: {error}"));
    }
}

fn restore_snapshot(store: &dyn crate::storage::KeyValueStore, state: &mut HeartbeatState, max_notifications: usize) {
    let raw = match store.load(OFFLINE_STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return,
        Err(e) => {
            warn!("failed to read offline snapshot: {}", e);
            return;
        }
    };

    match serde_json::from_str::<OfflineSnapshot>(&raw) {
        Ok(snapshot) => {
            state.queue.extend(snapshot.user_actions);
            let skip = snapshot.notifications.len().saturating_sub(max_notifications);
            state.notifications = snapshot.notifications.into_iter().skip(skip).collect();
            if snapshot.last_sync > 0 {
                state.last_sync_ms = snapshot.last_sync;
            }
            info!("restored offline snapshot ({} pending actions)", state.queue.len());
        }
        Err(e) => warn!("ignoring corrupt offline snapshot: {}", e),
    }
}

/// Accepts either a bare array or `{ "notifications": [...] }`
fn parse_notifications(response: &HttpResponse) -> Vec<serde_json::Value> {
    match response.json() {
        Some(serde_json::Value::Array(items)) => items,
        Some(serde_json::Value::Object(mut map)) => match map.remove("notifications") {
            Some(serde_json::Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn spawn_heartbeat_loop(inner: &Arc<HeartbeatInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    tokio::spawn(async move {
        loop {
            let interval = match weak.upgrade() {
                Some(inner) => inner.state.lock().current_interval,
                None => break,
            };
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else { break };
            inner.beat().await;
        }
    })
}

fn spawn_persist_loop(inner: &Arc<HeartbeatInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let period = inner.settings.persist_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(inner) = weak.upgrade() else { break };
            inner.persist();
        }
    })
}

fn spawn_link_watcher(inner: &Arc<HeartbeatInner>) -> JoinHandle<()> {
    let weak = Arc::downgrade(inner);
    let mut rx = inner.runtime.network_status();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let online = *rx.borrow_and_update();
            let Some(inner) = weak.upgrade() else { break };
            if online {
                inner.go_online("platform online event").await;
            } else {
                debug!("platform offline event, checking now");
                inner.beat().await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::device::{classify, OptimizationProfile, ProfilePreset};
    use crate::runtime::{NativeRuntime, PlatformSnapshot};
    use crate::storage::{KeyValueStore, MemoryStore};
    use crate::transport::HttpTransport;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::json;

    struct Unreachable;

    impl HttpTransport for Unreachable {
        fn execute(&self, _request: HttpRequest) -> BoxFuture<'_, Result<HttpResponse, TransportError>> {
            async { Err(TransportError::Network("unreachable".into())) }.boxed()
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<String>, crate::error::StorageError> {
            Err(crate::error::StorageError::Unavailable("quota".into()))
        }
        fn store(&self, _key: &str, _value: &str) -> Result<(), crate::error::StorageError> {
            Err(crate::error::StorageError::Unavailable("quota".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), crate::error::StorageError> {
            Ok(())
        }
    }

    fn heartbeat_with(profile: &DeviceProfile, store: SharedStore) -> ResilienceHeartbeat {
        ResilienceHeartbeat::new(
            profile,
            HeartbeatSettings::default(),
            Arc::new(Unreachable),
            Arc::new(NativeRuntime::new()),
            store,
            Arc::new(SystemClock),
        )
    }

    fn low_end_profile() -> DeviceProfile {
        let (capabilities, _) = classify(&PlatformSnapshot {
            device_memory_gb: Some(1.0),
            ..Default::default()
        });
        DeviceProfile {
            capabilities,
            optimization: OptimizationProfile::preset(ProfilePreset::LowEnd),
        }
    }

    #[test]
    fn test_snapshot_restored_at_construction() {
        let store = Arc::new(MemoryStore::new());
        let snapshot = OfflineSnapshot {
            notifications: vec![json!({"id": 1})],
            user_actions: vec![OfflineQueueEntry::new(json!({"type": "grade"}), 10)],
            last_sync: 1_700_000_000_000,
        };
        store
            .store(OFFLINE_STORAGE_KEY, &serde_json::to_string(&snapshot).unwrap())
            .unwrap();

        let heartbeat = heartbeat_with(&DeviceProfile::default(), store);
        assert_eq!(heartbeat.offline_stats().actions_count, 1);
        assert_eq!(heartbeat.missed_notifications(), vec![json!({"id": 1})]);
        assert_eq!(heartbeat.last_sync_ms(), 1_700_000_000_000);
    }

    #[test]
    fn test_persist_writes_expected_shape() {
        let store = Arc::new(MemoryStore::new());
        let heartbeat = heartbeat_with(&DeviceProfile::default(), store.clone());
        heartbeat.queue_offline_action(json!({"type": "attendance"}));
        heartbeat.persist();

        let raw = store.load(OFFLINE_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["userActions"][0]["payload"]["type"], "attendance");
        assert!(value["notifications"].is_array());
        assert!(value["lastSync"].is_i64());
    }

    #[test]
    fn test_storage_failures_are_not_fatal() {
        let heartbeat = heartbeat_with(&DeviceProfile::default(), Arc::new(BrokenStore));
        heartbeat.queue_offline_action(json!(1));
        heartbeat.persist();
        heartbeat.destroy();
        assert_eq!(heartbeat.offline_stats().actions_count, 1);
    }

    #[tokio::test]
    async fn test_backoff_caps_then_low_power_when_offline() {
        let heartbeat = heartbeat_with(&low_end_profile(), Arc::new(MemoryStore::new()));
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(30));

        heartbeat.beat().await;
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(60));
        heartbeat.beat().await;
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(60));
        heartbeat.beat().await;
        assert!(heartbeat.is_offline_mode());
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_standard_backoff_doubles() {
        let heartbeat = heartbeat_with(&DeviceProfile::default(), Arc::new(MemoryStore::new()));
        heartbeat.beat().await;
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(30));
        heartbeat.beat().await;
        assert_eq!(heartbeat.current_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_event_wire_shape() {
        let online = serde_json::to_value(ConnectionEvent::Online {
            offline_time: 5_000,
            pending_actions: 2,
        })
        .unwrap();
        assert_eq!(online, json!({"type": "online", "offlineTime": 5_000, "pendingActions": 2}));
    }

    #[test]
    fn test_parse_notifications_shapes() {
        let bare = HttpResponse {
            status: 200,
            body: "[{\"id\":1},{\"id\":2}]".into(),
        };
        assert_eq!(parse_notifications(&bare).len(), 2);

        let wrapped = HttpResponse {
            status: 200,
            body: "{\"notifications\":[{\"id\":3}]}".into(),
        };
        assert_eq!(parse_notifications(&wrapped), vec![json!({"id": 3})]);

        let garbage = HttpResponse {
            status: 200,
            body: "nope".into(),
        };
        assert!(parse_notifications(&garbage).is_empty());
    }
}
