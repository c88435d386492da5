use crate::error::ConfigError;
use crate::runtime::ConnectionHint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::warn;

pub const CONFIG_ENV_VAR: &str = "EDUCAFRIC_MONITOR_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "monitor.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Base URL of the school platform API
    pub api_base_url: String,
    pub user_agent: Option<String>,
    /// Where the offline snapshot is written; platform data dir when unset
    pub storage_dir: Option<PathBuf>,
    /// Bind address of the local status API
    pub status_addr: String,
    /// Overrides the platform connection hint (ex: "3g" on a metered uplink)
    pub connection: Option<ConnectionHint>,
    /// Set when the host forwards input events to `POST /activity`.
    /// Otherwise the scheduler's inactivity gate is turned off.
    pub track_user_activity: bool,
    pub scheduler: SchedulerSettings,
    pub heartbeat: HeartbeatSettings,
}

/// Health probe scheduling. The base interval comes from the device profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub health_path: String,
    pub probe_timeout_secs: u64,
    pub min_spacing_secs: u64,
    pub hourly_budget: u32,
    /// `max_interval = base_interval * max_interval_factor`
    pub max_interval_factor: u32,
    /// 0 disables the inactivity gate
    pub inactivity_timeout_secs: u64,
    pub peer_freshness_secs: u64,
}

/// Offline detection and recovery. The base interval comes from the device profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatSettings {
    pub heartbeat_path: String,
    pub sync_path: String,
    pub missed_notifications_path: String,
    pub failure_threshold: u32,
    pub max_interval_secs: u64,
    pub low_power_interval_secs: u64,
    /// Below this battery level the heartbeat behaves as on a low-end device once offline
    pub low_battery_threshold: f32,
    pub persist_interval_secs: u64,
    pub max_stored_notifications: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".into(),
            user_agent: None,
            storage_dir: None,
            status_addr: "127.0.0.1:8787".into(),
            connection: None,
            track_user_activity: false,
            scheduler: SchedulerSettings::default(),
            heartbeat: HeartbeatSettings::default(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            health_path: "/api/health".into(),
            probe_timeout_secs: 8,
            min_spacing_secs: 5 * 60,
            hourly_budget: 10,
            max_interval_factor: 2,
            inactivity_timeout_secs: 10 * 60,
            peer_freshness_secs: 60,
        }
    }
}

impl SchedulerSettings {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn min_spacing_ms(&self) -> i64 {
        (self.min_spacing_secs * 1000) as i64
    }

    pub fn inactivity_timeout_ms(&self) -> Option<i64> {
        match self.inactivity_timeout_secs {
            0 => None,
            secs => Some((secs * 1000) as i64),
        }
    }

    pub fn peer_freshness_ms(&self) -> i64 {
        (self.peer_freshness_secs * 1000) as i64
    }
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            heartbeat_path: "/api/health".into(),
            sync_path: "/api/sync/offline-actions".into(),
            missed_notifications_path: "/api/notifications/missed".into(),
            failure_threshold: 3,
            max_interval_secs: 60,
            low_power_interval_secs: 120,
            low_battery_threshold: 0.15,
            persist_interval_secs: 30,
            max_stored_notifications: 50,
        }
    }
}

impl HeartbeatSettings {
    pub fn max_interval(&self) -> Duration {
        Duration::from_secs(self.max_interval_secs)
    }

    pub fn low_power_interval(&self) -> Duration {
        Duration::from_secs(self.low_power_interval_secs)
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_secs(self.persist_interval_secs)
    }
}

impl MonitorConfig {
    /// Scheduler settings for this host; without an activity source the
    /// inactivity gate would stop scheduled probes for good
    pub fn scheduler_settings(&self) -> SchedulerSettings {
        let mut settings = self.scheduler.clone();
        if !self.track_user_activity {
            settings.inactivity_timeout_secs = 0;
        }
        settings
    }

    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let txt = fs::read_to_string(path).await?;
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&txt)?)
    }
}

/// Loads the config named by `EDUCAFRIC_MONITOR_CONFIG` (default `monitor.yaml`),
/// falling back to defaults when the file is missing or invalid
pub async fn load_config() -> MonitorConfig {
    let path = std::env::var(CONFIG_ENV_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    if !Path::new(&path).exists() {
        warn!("no {path}, using default config");
        return MonitorConfig::default();
    }
    MonitorConfig::from_file(&path).await.unwrap_or_else(|e| {
        warn!("invalid config {path}: {e}");
        MonitorConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_limits() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.scheduler.min_spacing_ms(), 300_000);
        assert_eq!(cfg.scheduler.hourly_budget, 10);
        assert_eq!(cfg.scheduler.probe_timeout(), Duration::from_secs(8));
        assert_eq!(cfg.scheduler.peer_freshness_ms(), 60_000);
        assert_eq!(cfg.scheduler.inactivity_timeout_ms(), Some(600_000));
        assert_eq!(cfg.heartbeat.failure_threshold, 3);
        assert_eq!(cfg.heartbeat.max_interval(), Duration::from_secs(60));
        assert_eq!(cfg.heartbeat.persist_interval(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_partial_yaml_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.yaml");
        std::fs::write(
            &path,
            "api_base_url: https://school.example\nconnection:\n  effective_type: 3g\nheartbeat:\n  failure_threshold: 5\n",
        )
        .unwrap();

        let cfg = MonitorConfig::from_file(&path).await.unwrap();
        assert_eq!(cfg.api_base_url, "https://school.example");
        assert_eq!(cfg.heartbeat.failure_threshold, 5);
        assert_eq!(cfg.heartbeat.sync_path, "/api/sync/offline-actions");
        assert_eq!(
            cfg.connection.and_then(|c| c.effective_type).as_deref(),
            Some("3g")
        );
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.yaml");
        std::fs::write(&path, "scheduler: [not, a, map]").unwrap();
        assert!(matches!(
            MonitorConfig::from_file(&path).await,
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_headless_host_disables_inactivity_gate() {
        let headless = MonitorConfig::default();
        assert_eq!(headless.scheduler_settings().inactivity_timeout_ms(), None);

        let tracked = MonitorConfig {
            track_user_activity: true,
            ..MonitorConfig::default()
        };
        assert_eq!(tracked.scheduler_settings().inactivity_timeout_ms(), Some(600_000));
    }
}
