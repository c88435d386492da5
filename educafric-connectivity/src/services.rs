//! Composition root: profile once, then build every service from the same
//! profile and collaborators. Hosts hold one [`ConnectivityServices`] for the
//! session and call [`ConnectivityServices::shutdown`] on exit.

use crate::clock::SharedClock;
use crate::compat::CompatibilityAdapter;
use crate::config::{HeartbeatSettings, SchedulerSettings};
use crate::device::{DeviceProfile, DeviceProfiler};
use crate::heartbeat::ResilienceHeartbeat;
use crate::peer::SharedPeerChannel;
use crate::runtime::SharedRuntime;
use crate::scheduler::HealthProbeScheduler;
use crate::storage::SharedStore;
use crate::transport::{MonitoredClient, SharedTransport};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Collaborators injected by the host
pub struct ServiceDeps {
    pub scheduler: SchedulerSettings,
    pub heartbeat: HeartbeatSettings,
    pub transport: SharedTransport,
    pub runtime: SharedRuntime,
    pub store: SharedStore,
    pub peers: SharedPeerChannel,
    pub clock: SharedClock,
}

#[derive(Debug, Default)]
struct Lifecycle {
    started: bool,
    shut_down: bool,
}

#[derive(Clone)]
pub struct ConnectivityServices {
    pub profile: DeviceProfile,
    pub scheduler: HealthProbeScheduler,
    pub heartbeat: ResilienceHeartbeat,
    pub adapter: CompatibilityAdapter,
    /// Client for application requests; the heartbeat observes its outcomes
    pub client: Arc<MonitoredClient>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl ConnectivityServices {
    pub fn bootstrap(deps: ServiceDeps) -> Self {
        let profile = DeviceProfiler::profile(deps.runtime.as_ref());

        let scheduler = HealthProbeScheduler::new(
            &profile,
            deps.scheduler,
            deps.transport.clone(),
            deps.runtime.clone(),
            deps.peers,
            deps.clock.clone(),
        );
        let heartbeat = ResilienceHeartbeat::new(
            &profile,
            deps.heartbeat,
            deps.transport.clone(),
            deps.runtime.clone(),
            deps.store,
            deps.clock,
        );
        let adapter = CompatibilityAdapter::new(scheduler.clone(), &deps.runtime, profile.device_class());

        let client = Arc::new(MonitoredClient::new(deps.transport));
        client.add_observer(heartbeat.observer());

        Self {
            profile,
            scheduler,
            heartbeat,
            adapter,
            client,
            lifecycle: Arc::new(Mutex::new(Lifecycle::default())),
        }
    }

    /// Spawns the scheduler and heartbeat tasks. Must be called inside a tokio runtime.
    pub fn start(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.started || lifecycle.shut_down {
                return;
            }
            lifecycle.started = true;
        }
        self.scheduler.start();
        self.heartbeat.start();
        info!("connectivity services started ({:?})", self.profile.device_class());
    }

    /// Tears everything down once; later calls are no-ops
    pub fn shutdown(&self) {
        {
            let mut lifecycle = self.lifecycle.lock();
            if lifecycle.shut_down {
                return;
            }
            lifecycle.shut_down = true;
        }
        self.adapter.destroy();
        self.scheduler.destroy();
        self.heartbeat.destroy();
        info!("connectivity services stopped");
    }

    pub fn is_shut_down(&self) -> bool {
        self.lifecycle.lock().shut_down
    }
}
