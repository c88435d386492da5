/*!
Test harness for the connectivity services

Owns one set of doubles (transport, runtime, clock, store, peer bus) and
builds real services on top of them, so scenarios only script the doubles
and assert on what the services did.
*/

use crate::manual_clock::ManualClock;
use crate::mock_runtime::MockRuntime;
use crate::mock_transport::MockTransport;
use anyhow::Result;
use educafric_connectivity::{
    CompatibilityAdapter, ConnectivityServices, DeviceProfile, DeviceProfiler, HealthProbeScheduler,
    HeartbeatSettings, LocalPeerBus, MemoryStore, ResilienceHeartbeat, SchedulerSettings,
    ServiceDeps, SharedPeerChannel,
};
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub transport: Arc<MockTransport>,
    pub runtime: Arc<MockRuntime>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub bus: LocalPeerBus,
    pub scheduler_settings: SchedulerSettings,
    pub heartbeat_settings: HeartbeatSettings,
}

impl TestHarness {
    /// Standard device, visible, online, every endpoint answering 200
    pub fn new() -> Self {
        Self::with_runtime(MockRuntime::new())
    }

    pub fn with_runtime(runtime: MockRuntime) -> Self {
        env_logger::try_init().ok();

        Self {
            transport: Arc::new(MockTransport::new()),
            runtime: Arc::new(runtime),
            clock: Arc::new(ManualClock::new()),
            store: Arc::new(MemoryStore::new()),
            bus: LocalPeerBus::default(),
            scheduler_settings: SchedulerSettings::default(),
            heartbeat_settings: HeartbeatSettings::default(),
        }
    }

    pub fn low_end() -> Self {
        Self::with_runtime(MockRuntime::low_end())
    }

    /// Another participant sharing this harness's peer bus, transport and
    /// clock: the "second tab"
    pub fn peer(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            runtime: Arc::new(MockRuntime::new()),
            clock: self.clock.clone(),
            store: Arc::new(MemoryStore::new()),
            bus: self.bus.participant(),
            scheduler_settings: self.scheduler_settings.clone(),
            heartbeat_settings: self.heartbeat_settings.clone(),
        }
    }

    pub fn profile(&self) -> DeviceProfile {
        DeviceProfiler::profile(self.runtime.as_ref())
    }

    fn peers(&self) -> SharedPeerChannel {
        Arc::new(self.bus.participant())
    }

    pub fn scheduler(&self) -> HealthProbeScheduler {
        HealthProbeScheduler::new(
            &self.profile(),
            self.scheduler_settings.clone(),
            self.transport.clone(),
            self.runtime.clone(),
            self.peers(),
            self.clock.clone(),
        )
    }

    pub fn heartbeat(&self) -> ResilienceHeartbeat {
        ResilienceHeartbeat::new(
            &self.profile(),
            self.heartbeat_settings.clone(),
            self.transport.clone(),
            self.runtime.clone(),
            self.store.clone(),
            self.clock.clone(),
        )
    }

    pub fn adapter(&self, scheduler: &HealthProbeScheduler) -> CompatibilityAdapter {
        let runtime: educafric_connectivity::SharedRuntime = self.runtime.clone();
        CompatibilityAdapter::new(scheduler.clone(), &runtime, self.profile().device_class())
    }

    pub fn services(&self) -> ConnectivityServices {
        ConnectivityServices::bootstrap(ServiceDeps {
            scheduler: self.scheduler_settings.clone(),
            heartbeat: self.heartbeat_settings.clone(),
            transport: self.transport.clone(),
            runtime: self.runtime.clone(),
            store: self.store.clone(),
            peers: self.peers(),
            clock: self.clock.clone(),
        })
    }

    /// Polls `condition` every 10ms (virtual time under a paused runtime)
    pub async fn wait_until<F>(&self, timeout_ms: u64, condition: F) -> Result<()>
    where
        F: Fn() -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        while tokio::time::Instant::now() < deadline {
            if condition() {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        if condition() {
            return Ok(());
        }
        log::warn!("condition not met within {}ms", timeout_ms);
        anyhow::bail!("condition not met within {}ms", timeout_ms)
    }

    /// Lets spawned tasks run without moving virtual time much
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
