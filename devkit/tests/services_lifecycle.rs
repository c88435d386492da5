use educafric_connectivity::device::{Feature, ProfilePreset};
use educafric_connectivity::{
    ConnectivityServices, DeviceClass, MonitorConfig, NoopPeerChannel, ServiceDeps,
};
use educafric_devkit::{MockRuntime, TestHarness};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn bootstrap_start_and_shutdown_once() {
    let harness = TestHarness::new();
    let services = harness.services();
    services.start();
    services.start();

    harness
        .wait_until(1_000, || harness.transport.count("/api/health") >= 1)
        .await
        .unwrap();
    assert!(services.scheduler.is_timer_running());
    assert!(services.scheduler.latest_result().is_some());
    assert!(services.adapter.latest_quality().is_some());

    services.heartbeat.queue_offline_action(serde_json::json!({"type": "note"}));
    services.shutdown();
    services.shutdown();

    assert!(services.is_shut_down());
    assert!(services.scheduler.is_destroyed());
    assert!(!services.scheduler.is_timer_running());
    // snapshot written on the way out
    let restored = harness.heartbeat();
    assert_eq!(restored.offline_stats().actions_count, 1);
}

#[tokio::test(start_paused = true)]
async fn headless_host_without_peers_keeps_probing() {
    let harness = TestHarness::new();
    let cfg = MonitorConfig::default();
    let services = ConnectivityServices::bootstrap(ServiceDeps {
        scheduler: cfg.scheduler_settings(),
        heartbeat: cfg.heartbeat.clone(),
        transport: harness.transport.clone(),
        runtime: harness.runtime.clone(),
        store: harness.store.clone(),
        peers: Arc::new(NoopPeerChannel),
        clock: harness.clock.clone(),
    });
    services.start();
    harness
        .wait_until(1_000, || harness.transport.count("/api/health") >= 1)
        .await
        .unwrap();

    // no input events for well past the inactivity window
    harness.clock.advance(Duration::from_secs(30 * 60));
    let result = services.scheduler.run_scheduled_check().await;
    assert!(!result.from_cache);
    assert_eq!(services.scheduler.telemetry().total_checks, 2);

    services.shutdown();
}

#[test]
fn low_end_device_gets_conservative_tuning() {
    let harness = TestHarness::low_end();
    let profile = harness.profile();

    assert_eq!(profile.device_class(), DeviceClass::LowEnd);
    assert_eq!(profile.optimization.preset, ProfilePreset::LowEnd);
    assert_eq!(profile.optimization.probe_interval, Duration::from_secs(15 * 60));
    assert_eq!(profile.heartbeat_interval(), Duration::from_secs(30));
    assert_eq!(profile.offline_queue_capacity(), 20);
    assert!(!profile.is_feature_enabled(Feature::BackgroundSync));

    let scheduler = harness.scheduler();
    let config = scheduler.adaptive_config();
    assert_eq!(config.base_interval, Duration::from_secs(15 * 60));
    assert_eq!(config.max_interval, Duration::from_secs(30 * 60));
}

#[test]
fn fast_capable_device_gets_advanced_features() {
    let harness = TestHarness::with_runtime(MockRuntime::high_end());
    let profile = harness.profile();

    assert_eq!(profile.device_class(), DeviceClass::HighEnd);
    assert_eq!(profile.optimization.preset, ProfilePreset::Advanced);
    assert_eq!(profile.optimization.max_retries, 5);
    assert!(profile.is_feature_enabled(Feature::AdvancedFeatures));
}

#[test]
fn save_data_selects_slow_network_preset() {
    let runtime = MockRuntime::new();
    runtime.set_connection(Some(educafric_connectivity::runtime::ConnectionHint {
        effective_type: Some("4g".into()),
        save_data: true,
        ..Default::default()
    }));
    let harness = TestHarness::with_runtime(runtime);
    let profile = harness.profile();

    assert_eq!(profile.optimization.preset, ProfilePreset::SlowNetwork);
    assert_eq!(profile.optimization.probe_interval, Duration::from_secs(10 * 60));
    assert_eq!(profile.optimization.connection_timeout, Duration::from_secs(12));
}
