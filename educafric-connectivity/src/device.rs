//! Device capability profiling
//!
//! One-shot classification of the host device and its network into a
//! [`DeviceCapabilities`] record, and selection of one of four fixed
//! [`OptimizationProfile`] presets that tune the rest of the subsystem:
//! - probe interval (minutes, kept high to spare the shared backend)
//! - cache budget and retry budget
//! - feature gates (background sync, notification queue, advanced features)
//!
//! There is no error path: missing platform data falls back to the standard preset.

use crate::runtime::{PlatformSnapshot, RuntimeEnvironmentProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Vendor/model tokens of entry-level handsets common on our user base
const LOW_END_MODEL_TOKENS: &[&str] = &[
    "itel", "tecno", "infinix", "kaios", "sm-j1", "sm-j2", "sm-a01", "go edition", "opera mini",
];

/// Mobile OS releases too old for the full client
const OLD_MOBILE_OS_TOKENS: &[&str] = &[
    "android 4.", "android 5.", "android 6.", "iphone os 9_", "iphone os 10_", "kaios",
];

const DEFAULT_RAM_GB: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkSpeed {
    Slow,
    Medium,
    Fast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportLevel {
    Basic,
    Standard,
    Advanced,
}

/// Coarse device class used by the scheduler config and the legacy connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    LowEnd,
    Standard,
    HighEnd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub ram_estimate_gb: f64,
    pub is_low_end: bool,
    pub connection_type: String,
    pub network_speed: NetworkSpeed,
    pub support_level: SupportLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProfilePreset {
    LowEnd,
    SlowNetwork,
    Standard,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationProfile {
    pub preset: ProfilePreset,
    pub probe_interval: Duration,
    pub max_cache_size_mb: u32,
    pub enable_background_sync: bool,
    pub enable_notification_queue: bool,
    pub connection_timeout: Duration,
    pub max_retries: u32,
    pub enable_advanced_features: bool,
}

impl OptimizationProfile {
    pub fn preset(preset: ProfilePreset) -> Self {
        let minutes = |m: u64| Duration::from_secs(m * 60);
        match preset {
            ProfilePreset::LowEnd => Self {
                preset,
                probe_interval: minutes(15),
                max_cache_size_mb: 10,
                enable_background_sync: false,
                enable_notification_queue: true,
                connection_timeout: Duration::from_secs(15),
                max_retries: 2,
                enable_advanced_features: false,
            },
            ProfilePreset::SlowNetwork => Self {
                preset,
                probe_interval: minutes(10),
                max_cache_size_mb: 25,
                enable_background_sync: true,
                enable_notification_queue: true,
                connection_timeout: Duration::from_secs(12),
                max_retries: 3,
                enable_advanced_features: false,
            },
            ProfilePreset::Standard => Self {
                preset,
                probe_interval: minutes(5),
                max_cache_size_mb: 50,
                enable_background_sync: true,
                enable_notification_queue: true,
                connection_timeout: Duration::from_secs(8),
                max_retries: 3,
                enable_advanced_features: false,
            },
            ProfilePreset::Advanced => Self {
                preset,
                probe_interval: minutes(5),
                max_cache_size_mb: 100,
                enable_background_sync: true,
                enable_notification_queue: true,
                connection_timeout: Duration::from_secs(8),
                max_retries: 5,
                enable_advanced_features: true,
            },
        }
    }
}

/// Feature gates readable by feature code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    BackgroundSync,
    NotificationQueue,
    AdvancedFeatures,
}

/// Classification result handed to the scheduler and heartbeat at bootstrap
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceProfile {
    pub capabilities: DeviceCapabilities,
    pub optimization: OptimizationProfile,
}

impl DeviceProfile {
    pub fn device_class(&self) -> DeviceClass {
        if self.capabilities.is_low_end {
            DeviceClass::LowEnd
        } else if self.capabilities.support_level == SupportLevel::Advanced {
            DeviceClass::HighEnd
        } else {
            DeviceClass::Standard
        }
    }

    pub fn is_low_end(&self) -> bool {
        self.capabilities.is_low_end
    }

    /// Heartbeat cadence: 15s, or 30s on low-end devices
    pub fn heartbeat_interval(&self) -> Duration {
        if self.is_low_end() {
            Duration::from_secs(30)
        } else {
            Duration::from_secs(15)
        }
    }

    pub fn offline_queue_capacity(&self) -> usize {
        if self.is_low_end() {
            20
        } else {
            100
        }
    }

    pub fn is_feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::BackgroundSync => self.optimization.enable_background_sync,
            Feature::NotificationQueue => self.optimization.enable_notification_queue,
            Feature::AdvancedFeatures => self.optimization.enable_advanced_features,
        }
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        let (capabilities, optimization) = classify(&PlatformSnapshot::default());
        Self { capabilities, optimization }
    }
}

pub struct DeviceProfiler;

impl DeviceProfiler {
    /// Read the platform once and classify it
    pub fn profile(runtime: &dyn RuntimeEnvironmentProvider) -> DeviceProfile {
        let mut snapshot = runtime.platform_snapshot();
        if snapshot.connection.is_none() {
            snapshot.connection = runtime.connection_hint();
        }

        let (capabilities, optimization) = classify(&snapshot);
        info!(
            "device profile: {:?} ({:.1}GB, {:?} network, low_end={})",
            optimization.preset,
            capabilities.ram_estimate_gb,
            capabilities.network_speed,
            capabilities.is_low_end
        );
        DeviceProfile { capabilities, optimization }
    }
}

/// Pure classification of a platform snapshot
pub fn classify(snapshot: &PlatformSnapshot) -> (DeviceCapabilities, OptimizationProfile) {
    let user_agent = snapshot
        .user_agent
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let ram_estimate_gb = estimate_ram_gb(snapshot, &user_agent);
    let old_mobile_os = OLD_MOBILE_OS_TOKENS.iter().any(|t| user_agent.contains(t));
    let is_low_end = ram_estimate_gb <= 2.0 || old_mobile_os;

    let (connection_type, network_speed) = match &snapshot.connection {
        Some(hint) => {
            let effective = hint.effective_type.clone().unwrap_or_else(|| "unknown".into());
            let speed = if hint.save_data {
                NetworkSpeed::Slow
            } else {
                network_speed_for(&effective)
            };
            (effective, speed)
        }
        None => ("unknown".to_string(), NetworkSpeed::Medium),
    };

    let support_level = if is_low_end {
        SupportLevel::Basic
    } else if ram_estimate_gb >= 6.0 {
        SupportLevel::Advanced
    } else {
        SupportLevel::Standard
    };

    let capabilities = DeviceCapabilities {
        ram_estimate_gb,
        is_low_end,
        connection_type,
        network_speed,
        support_level,
    };

    let preset = select_preset(&capabilities);
    debug!("selected {:?} preset for {:?}", preset, capabilities);

    (capabilities, OptimizationProfile::preset(preset))
}

fn estimate_ram_gb(snapshot: &PlatformSnapshot, user_agent: &str) -> f64 {
    if let Some(memory) = snapshot.device_memory_gb.filter(|m| *m > 0.0) {
        return memory;
    }

    let inferred = match snapshot.hardware_concurrency {
        Some(cores) if cores <= 2 => 1.0,
        Some(cores) if cores <= 4 => 2.0,
        Some(cores) if cores <= 8 => 4.0,
        Some(_) => 8.0,
        None => DEFAULT_RAM_GB,
    };

    if LOW_END_MODEL_TOKENS.iter().any(|t| user_agent.contains(t)) {
        inferred.min(1.0)
    } else {
        inferred
    }
}

fn network_speed_for(effective_type: &str) -> NetworkSpeed {
    match effective_type {
        "slow-2g" | "2g" => NetworkSpeed::Slow,
        "3g" => NetworkSpeed::Medium,
        "4g" => NetworkSpeed::Fast,
        _ => NetworkSpeed::Medium,
    }
}

fn select_preset(capabilities: &DeviceCapabilities) -> ProfilePreset {
    if capabilities.is_low_end {
        ProfilePreset::LowEnd
    } else if capabilities.network_speed == NetworkSpeed::Slow {
        ProfilePreset::SlowNetwork
    } else if capabilities.support_level == SupportLevel::Advanced
        && capabilities.network_speed == NetworkSpeed::Fast
    {
        ProfilePreset::Advanced
    } else {
        ProfilePreset::Standard
    }
}
