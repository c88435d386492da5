/*!
# Educafric Connectivity

Surveillance de la santé réseau et résilience de connexion pour les clients Educafric :
- Profilage d'appareil qui règle tous les intervalles et limites ci-dessous
- Un seul scheduler de sondes (single-flight, rate limité, backoff adaptatif, partagé entre pairs)
- Un heartbeat de résilience avec file hors-ligne et resynchro au retour
- Un adapter de compatibilité qui republie le signal aux consommateurs legacy
*/

pub mod clock;
pub mod compat;
pub mod config;
pub mod device;
pub mod error;
pub mod health;
pub mod heartbeat;
pub mod listeners;
pub mod peer;
pub mod queue;
pub mod runtime;
pub mod scheduler;
pub mod services;
pub mod storage;
pub mod transport;

pub use clock::{system_clock, Clock, SharedClock, SystemClock};
pub use compat::{
    CompatibilityAdapter, ConnectionQuality, ConnectionState, LegacyPoller, LegacyPollingConfig,
    NetworkQuality, NetworkQualityReport,
};
pub use config::{load_config, HeartbeatSettings, MonitorConfig, SchedulerSettings};
pub use device::{DeviceCapabilities, DeviceClass, DeviceProfile, DeviceProfiler, OptimizationProfile};
pub use error::{ChannelError, ConfigError, StorageError, TransportError};
pub use health::{AdaptiveConfig, HealthCheckResult, Telemetry};
pub use heartbeat::{ConnectionEvent, ConnectionMode, OfflineStats, ResilienceHeartbeat};
pub use listeners::ListenerId;
pub use peer::{LocalPeerBus, NoopPeerChannel, PeerResultChannel, SharedPeerChannel};
pub use queue::OfflineQueueEntry;
pub use runtime::{NativeRuntime, RuntimeEnvironmentProvider, SharedRuntime};
pub use scheduler::HealthProbeScheduler;
pub use services::{ConnectivityServices, ServiceDeps};
pub use storage::{FileStore, KeyValueStore, MemoryStore, SharedStore};
pub use transport::{
    HttpRequest, HttpResponse, HttpTransport, MonitoredClient, NetworkObserver, ReqwestTransport,
    SharedTransport,
};
