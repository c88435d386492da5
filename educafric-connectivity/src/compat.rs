//! Legacy compatibility adapter
//!
//! Older call sites each used to run their own poller (connection monitor,
//! network quality monitor, service worker ping, realtime ping). They now get
//! a [`LegacyPollingConfig`] injected with every poller disabled, and read the
//! scheduler's signal through this adapter in the payload shape they expect.
//!
//! Two registries exist because the two legacy consumer families expect
//! different payloads. Both are fed from ONE scheduler subscription, so no
//! extra network activity comes from supporting both.

use crate::device::DeviceClass;
use crate::health::HealthCheckResult;
use crate::listeners::{ListenerId, ListenerRegistry};
use crate::runtime::SharedRuntime;
use crate::scheduler::HealthProbeScheduler;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionQuality {
    Excellent,
    Good,
    Poor,
    Offline,
}

impl ConnectionQuality {
    pub fn from_result(result: &HealthCheckResult) -> Self {
        if !result.is_healthy {
            Self::Offline
        } else if result.response_time_ms < 200 {
            Self::Excellent
        } else if result.response_time_ms < 500 {
            Self::Good
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Critical,
}

impl NetworkQuality {
    pub fn from_result(result: &HealthCheckResult) -> Self {
        if !result.is_healthy {
            Self::Critical
        } else if result.response_time_ms < 200 {
            Self::Excellent
        } else if result.response_time_ms < 400 {
            Self::Good
        } else if result.response_time_ms < 800 {
            Self::Fair
        } else {
            Self::Poor
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Excellent => "All features available",
            Self::Good => "Normal operation",
            Self::Fair => "Reducing update frequency",
            Self::Poor => "Limiting to essential features, large uploads deferred",
            Self::Critical => "Offline mode, changes will sync when the connection returns",
        }
    }
}

/// Payload for connection listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub is_online: bool,
    pub is_connected: bool,
    pub last_ping_time_ms: Option<i64>,
    pub retry_count: u32,
    pub quality: ConnectionQuality,
    pub device_mode: DeviceClass,
}

/// Payload for network-quality listeners
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkQualityReport {
    pub quality: NetworkQuality,
    pub response_time_ms: u64,
    pub recommendation: String,
    pub timestamp_ms: i64,
}

impl NetworkQualityReport {
    pub fn from_result(result: &HealthCheckResult) -> Self {
        let quality = NetworkQuality::from_result(result);
        Self {
            quality,
            response_time_ms: result.response_time_ms,
            recommendation: quality.recommendation().to_string(),
            timestamp_ms: result.timestamp_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyPoller {
    ConnectionMonitor,
    NetworkQualityMonitor,
    ServiceWorkerPing,
    RealtimePing,
}

/// Injected into legacy consumers; a disabled poller returns early from its own setup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPollingConfig {
    pub connection_monitor: bool,
    pub network_quality_monitor: bool,
    pub service_worker_ping: bool,
    pub realtime_ping: bool,
}

impl LegacyPollingConfig {
    /// Every legacy poller off; the scheduler is the only source
    pub fn unified() -> Self {
        Self {
            connection_monitor: false,
            network_quality_monitor: false,
            service_worker_ping: false,
            realtime_ping: false,
        }
    }

    pub fn polling_enabled(&self, poller: LegacyPoller) -> bool {
        match poller {
            LegacyPoller::ConnectionMonitor => self.connection_monitor,
            LegacyPoller::NetworkQualityMonitor => self.network_quality_monitor,
            LegacyPoller::ServiceWorkerPing => self.service_worker_ping,
            LegacyPoller::RealtimePing => self.realtime_ping,
        }
    }
}

impl Default for LegacyPollingConfig {
    fn default() -> Self {
        Self {
            connection_monitor: true,
            network_quality_monitor: true,
            service_worker_ping: true,
            realtime_ping: true,
        }
    }
}

#[derive(Clone)]
pub struct CompatibilityAdapter {
    inner: Arc<AdapterInner>,
}

struct AdapterInner {
    scheduler: HealthProbeScheduler,
    online: watch::Receiver<bool>,
    legacy: LegacyPollingConfig,
    connection_listeners: ListenerRegistry<ConnectionState>,
    quality_listeners: ListenerRegistry<NetworkQualityReport>,
    state: Mutex<AdapterState>,
}

struct AdapterState {
    connection: ConnectionState,
    last_quality: Option<NetworkQualityReport>,
    subscription: Option<ListenerId>,
    destroyed: bool,
}

impl CompatibilityAdapter {
    pub fn new(scheduler: HealthProbeScheduler, runtime: &SharedRuntime, device_mode: DeviceClass) -> Self {
        let online = runtime.network_status();
        let connection = ConnectionState {
            is_online: *online.borrow(),
            is_connected: true,
            last_ping_time_ms: None,
            retry_count: 0,
            quality: ConnectionQuality::Good,
            device_mode,
        };

        let inner = Arc::new(AdapterInner {
            scheduler: scheduler.clone(),
            online,
            legacy: LegacyPollingConfig::unified(),
            connection_listeners: ListenerRegistry::new(),
            quality_listeners: ListenerRegistry::new(),
            state: Mutex::new(AdapterState {
                connection,
                last_quality: None,
                subscription: None,
                destroyed: false,
            }),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = scheduler.add_listener(move |result| {
            if let Some(inner) = weak.upgrade() {
                inner.apply(result);
            }
        });
        inner.state.lock().subscription = Some(subscription);

        if let Some(latest) = scheduler.latest_result() {
            inner.apply(&latest);
        }

        info!("compatibility adapter ready, legacy pollers disabled");
        Self { inner }
    }

    pub fn legacy_config(&self) -> LegacyPollingConfig {
        self.inner.legacy
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.state.lock().connection.clone()
    }

    pub fn latest_quality(&self) -> Option<NetworkQualityReport> {
        self.inner.state.lock().last_quality.clone()
    }

    /// Registers a listener and immediately hands it the current state
    pub fn add_connection_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ConnectionState) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let registered = listener.clone();
        let id = self.inner.connection_listeners.add(move |state| registered(state));
        listener(&self.connection_state());
        id
    }

    pub fn remove_connection_listener(&self, id: ListenerId) -> bool {
        self.inner.connection_listeners.remove(id)
    }

    pub fn add_network_quality_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&NetworkQualityReport) + Send + Sync + 'static,
    {
        self.inner.quality_listeners.add(listener)
    }

    pub fn remove_network_quality_listener(&self, id: ListenerId) -> bool {
        self.inner.quality_listeners.remove(id)
    }

    /// Immediate probe through the scheduler (single-flight still applies)
    pub async fn check_connection(&self) -> bool {
        self.inner.scheduler.check_health_immediate().await.is_healthy
    }

    pub fn destroy(&self) {
        let subscription = {
            let mut state = self.inner.state.lock();
            if state.destroyed {
                return;
            }
            state.destroyed = true;
            state.subscription.take()
        };
        if let Some(id) = subscription {
            self.inner.scheduler.remove_listener(id);
        }
        self.inner.connection_listeners.clear();
        self.inner.quality_listeners.clear();
        debug!("compatibility adapter destroyed");
    }
}

impl AdapterInner {
    fn apply(&self, result: &HealthCheckResult) {
        let report = NetworkQualityReport::from_result(result);
        let connection = {
            let mut state = self.state.lock();
            if state.destroyed {
                return;
            }
            let c = &mut state.connection;
            c.is_online = *self.online.borrow();
            c.is_connected = result.is_healthy;
            c.last_ping_time_ms = Some(result.timestamp_ms);
            c.quality = ConnectionQuality::from_result(result);
            c.retry_count = if result.is_healthy { 0 } else { c.retry_count + 1 };
            let snapshot = c.clone();
            state.last_quality = Some(report.clone());
            snapshot
        };

        self.connection_listeners.notify(&connection);
        self.quality_listeners.notify(&report);
    }
}
