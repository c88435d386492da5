//! Runtime environment capabilities
//!
//! The adaptive logic never talks to a platform directly. Everything it needs
//! to know about the host (is the app visible, is the network link up, how
//! much battery is left, what does the platform say about the connection, how
//! big is the device) goes through [`RuntimeEnvironmentProvider`].
//!
//! - [`NativeRuntime`] : sysinfo-backed provider for native hosts; visibility
//!   and link status are pushed in by the host (window focus, OS notifications)
//! - `MockRuntime` in the devkit : fully scriptable provider for tests

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use sysinfo::System;
use tokio::sync::watch;
use tracing::debug;

/// Connection information as reported by the platform (Network Information API analogue)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionHint {
    /// "slow-2g", "2g", "3g", "4g"
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<u32>,
    #[serde(default)]
    pub save_data: bool,
}

/// Raw platform readings consumed once by the device profiler
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformSnapshot {
    pub device_memory_gb: Option<f64>,
    pub hardware_concurrency: Option<u32>,
    pub user_agent: Option<String>,
    pub connection: Option<ConnectionHint>,
}

pub trait RuntimeEnvironmentProvider: Send + Sync {
    /// Whether the application surface is currently visible to the user
    fn is_visible(&self) -> bool;

    /// Visibility updates; the current value is always readable via `borrow()`
    fn on_visibility_change(&self) -> watch::Receiver<bool>;

    /// Battery level in `0.0..=1.0`, `None` when unknown or mains powered
    fn battery_level(&self) -> Option<f32>;

    fn connection_hint(&self) -> Option<ConnectionHint>;

    /// Platform link status (`navigator.onLine` analogue)
    fn network_status(&self) -> watch::Receiver<bool>;

    fn platform_snapshot(&self) -> PlatformSnapshot;
}

pub type SharedRuntime = Arc<dyn RuntimeEnvironmentProvider>;

/// Provider for native hosts
pub struct NativeRuntime {
    visibility: watch::Sender<bool>,
    online: watch::Sender<bool>,
    connection: Option<ConnectionHint>,
    user_agent: Option<String>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        let (visibility, _) = watch::channel(true);
        let (online, _) = watch::channel(true);
        Self {
            visibility,
            online,
            connection: None,
            user_agent: None,
        }
    }

    pub fn with_connection_hint(mut self, hint: ConnectionHint) -> Self {
        self.connection = Some(hint);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Host pushes window/app visibility here
    pub fn set_visible(&self, visible: bool) {
        self.visibility.send_replace(visible);
    }

    /// Host pushes OS-level link changes here
    pub fn set_online(&self, online: bool) {
        self.online.send_replace(online);
    }

    fn default_user_agent() -> Option<String> {
        System::long_os_version().map(|os| format!("educafric-monitor ({os})"))
    }
}

impl Default for NativeRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeEnvironmentProvider for NativeRuntime {
    fn is_visible(&self) -> bool {
        *self.visibility.borrow()
    }

    fn on_visibility_change(&self) -> watch::Receiver<bool> {
        self.visibility.subscribe()
    }

    fn battery_level(&self) -> Option<f32> {
        None
    }

    fn connection_hint(&self) -> Option<ConnectionHint> {
        self.connection.clone()
    }

    fn network_status(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    fn platform_snapshot(&self) -> PlatformSnapshot {
        let mut sys = System::new();
        sys.refresh_memory();
        sys.refresh_cpu();

        let total_bytes = sys.total_memory();
        let device_memory_gb = if total_bytes > 0 {
            Some(total_bytes as f64 / (1024.0 * 1024.0 * 1024.0))
        } else {
            None
        };
        let cores = sys.cpus().len() as u32;
        let hardware_concurrency = if cores > 0 { Some(cores) } else { None };

        debug!(
            "platform snapshot: memory={:?}GB cores={:?}",
            device_memory_gb, hardware_concurrency
        );

        PlatformSnapshot {
            device_memory_gb,
            hardware_concurrency,
            user_agent: self.user_agent.clone().or_else(Self::default_user_agent),
            connection: self.connection.clone(),
        }
    }
}
