/*!
Scriptable runtime provider

Visibility and link status are watch channels like the native provider, so
the scheduler and heartbeat watchers react to `set_visible` / `set_online`
exactly as they would in production.
*/

use educafric_connectivity::runtime::{ConnectionHint, PlatformSnapshot};
use educafric_connectivity::RuntimeEnvironmentProvider;
use parking_lot::Mutex;
use tokio::sync::watch;

pub struct MockRuntime {
    visibility: watch::Sender<bool>,
    online: watch::Sender<bool>,
    battery: Mutex<Option<f32>>,
    snapshot: Mutex<PlatformSnapshot>,
}

impl MockRuntime {
    /// Visible, online, mains powered, 4 GB / 4 cores, no connection hint
    pub fn new() -> Self {
        Self::with_snapshot(PlatformSnapshot {
            device_memory_gb: Some(4.0),
            hardware_concurrency: Some(4),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) educafric-devkit".into()),
            connection: None,
        })
    }

    pub fn with_snapshot(snapshot: PlatformSnapshot) -> Self {
        let (visibility, _) = watch::channel(true);
        let (online, _) = watch::channel(true);
        Self {
            visibility,
            online,
            battery: Mutex::new(None),
            snapshot: Mutex::new(snapshot),
        }
    }

    /// 1 GB, 2 cores: classified low-end
    pub fn low_end() -> Self {
        Self::with_snapshot(PlatformSnapshot {
            device_memory_gb: Some(1.0),
            hardware_concurrency: Some(2),
            user_agent: Some("Mozilla/5.0 (Linux; Android 7.0; itel A16) educafric-devkit".into()),
            connection: None,
        })
    }

    /// 8 GB, 8 cores on 4g: classified advanced
    pub fn high_end() -> Self {
        Self::with_snapshot(PlatformSnapshot {
            device_memory_gb: Some(8.0),
            hardware_concurrency: Some(8),
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) educafric-devkit".into()),
            connection: Some(ConnectionHint {
                effective_type: Some("4g".into()),
                ..Default::default()
            }),
        })
    }

    pub fn set_visible(&self, visible: bool) {
        self.visibility.send_replace(visible);
    }

    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    pub fn set_battery(&self, level: Option<f32>) {
        *self.battery.lock() = level;
    }

    pub fn set_connection(&self, hint: Option<ConnectionHint>) {
        self.snapshot.lock().connection = hint;
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeEnvironmentProvider for MockRuntime {
    fn is_visible(&self) -> bool {
        *self.visibility.borrow()
    }

    fn on_visibility_change(&self) -> watch::Receiver<bool> {
        self.visibility.subscribe()
    }

    fn battery_level(&self) -> Option<f32> {
        *self.battery.lock()
    }

    fn connection_hint(&self) -> Option<ConnectionHint> {
        self.snapshot.lock().connection.clone()
    }

    fn network_status(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    fn platform_snapshot(&self) -> PlatformSnapshot {
        self.snapshot.lock().clone()
    }
}
