use educafric_connectivity::heartbeat::LAST_SYNC_HEADER;
use educafric_connectivity::transport::Method;
use educafric_connectivity::{Clock, ConnectionEvent, HttpRequest, HttpTransport};
use educafric_devkit::manual_clock::DEFAULT_START_MS;
use educafric_devkit::{MockReply, TestHarness};
use serde_json::json;
use std::time::Duration;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

const HEARTBEAT: &str = "/api/health";
const SYNC: &str = "/api/sync/offline-actions";
const MISSED: &str = "/api/notifications/missed";

#[tokio::test]
async fn offline_only_after_third_failure() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    let mut events = heartbeat.subscribe();
    harness
        .transport
        .reply(HEARTBEAT, MockReply::Fail("no route to host".into()));

    assert!(!heartbeat.beat().await);
    assert!(!heartbeat.beat().await);
    assert!(!heartbeat.is_offline_mode());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

    assert!(!heartbeat.beat().await);
    assert!(heartbeat.is_offline_mode());
    assert_eq!(
        events.try_recv().unwrap(),
        ConnectionEvent::Offline {
            offline_time: DEFAULT_START_MS
        }
    );

    assert!(!heartbeat.beat().await);
    assert!(heartbeat.is_offline_mode());
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(heartbeat.consecutive_failures(), 4);
}

#[tokio::test]
async fn low_end_queue_keeps_newest_twenty() {
    let harness = TestHarness::low_end();
    let heartbeat = harness.heartbeat();

    for seq in 0..25 {
        heartbeat.queue_offline_action(json!({ "seq": seq }));
    }

    let pending = heartbeat.pending_actions();
    assert_eq!(pending.len(), 20);
    assert_eq!(pending.first().map(|e| e.payload["seq"].clone()), Some(json!(5)));
    assert_eq!(pending.last().map(|e| e.payload["seq"].clone()), Some(json!(24)));
    assert_eq!(heartbeat.offline_stats().actions_count, 20);
}

#[tokio::test]
async fn recovery_pushes_queue_and_fetches_missed_notifications() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    let mut events = heartbeat.subscribe();

    harness.transport.reply(HEARTBEAT, MockReply::Status(503));
    for _ in 0..3 {
        heartbeat.beat().await;
    }
    assert!(heartbeat.is_offline_mode());
    let _ = events.try_recv();

    let first = heartbeat.queue_offline_action(json!({"type": "attendance", "student": 12}));
    let second = heartbeat.queue_offline_action(json!({"type": "grade", "value": 14}));
    harness.clock.advance(Duration::from_secs(30));
    assert_eq!(heartbeat.offline_stats().offline_time_ms, 30_000);

    harness.transport.reply(HEARTBEAT, MockReply::Status(200));
    harness
        .transport
        .reply(MISSED, MockReply::Json(200, json!([{"id": "n1"}, {"id": "n2"}])));
    harness.transport.reply(SYNC, MockReply::Status(200));

    assert!(heartbeat.beat().await);
    assert!(!heartbeat.is_offline_mode());

    assert_eq!(
        events.try_recv().unwrap(),
        ConnectionEvent::Online {
            offline_time: 30_000,
            pending_actions: 2
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        ConnectionEvent::MissedNotifications { count: 2 }
    );

    let missed = harness.transport.requests_to(MISSED);
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].method, Method::Get);
    assert_eq!(
        missed[0].header(LAST_SYNC_HEADER),
        Some(DEFAULT_START_MS.to_string().as_str())
    );

    let sync = harness.transport.requests_to(SYNC);
    assert_eq!(sync.len(), 1);
    assert_eq!(sync[0].method, Method::Post);
    let body = sync[0].body.clone().unwrap();
    assert_eq!(body["offlineTime"], 30_000);
    let ids: Vec<&str> = body["actions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![first.as_str(), second.as_str()]);

    assert_eq!(heartbeat.offline_stats().actions_count, 0);
    assert_eq!(heartbeat.last_sync_ms(), harness.clock.now_ms());
    assert_eq!(heartbeat.missed_notifications().len(), 2);
}

#[tokio::test]
async fn consecutive_outages_fetch_only_new_notifications() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    let mut events = heartbeat.subscribe();
    harness
        .transport
        .enqueue(MISSED, MockReply::Json(200, json!([{"id": "n1"}])))
        .reply(MISSED, MockReply::Json(200, json!([])));

    for _ in 0..2 {
        harness.transport.reply(HEARTBEAT, MockReply::Fail("down".into()));
        for _ in 0..3 {
            heartbeat.beat().await;
        }
        assert!(heartbeat.is_offline_mode());
        harness.clock.advance(Duration::from_secs(60));
        harness.transport.reply(HEARTBEAT, MockReply::Status(200));
        assert!(heartbeat.beat().await);
    }

    let last_sync: Vec<String> = harness
        .transport
        .requests_to(MISSED)
        .iter()
        .map(|r| r.header(LAST_SYNC_HEADER).unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        last_sync,
        vec![
            DEFAULT_START_MS.to_string(),
            (DEFAULT_START_MS + 60_000).to_string()
        ]
    );
    assert_eq!(heartbeat.missed_notifications(), vec![json!({"id": "n1"})]);
    assert_eq!(heartbeat.last_sync_ms(), DEFAULT_START_MS + 120_000);
    assert_eq!(harness.transport.count(SYNC), 0);

    let mut missed_events = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, ConnectionEvent::MissedNotifications { .. }) {
            missed_events += 1;
        }
    }
    assert_eq!(missed_events, 1);
}

#[tokio::test]
async fn rejected_sync_keeps_the_queue() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();

    harness.transport.reply(HEARTBEAT, MockReply::Fail("down".into()));
    for _ in 0..3 {
        heartbeat.beat().await;
    }
    heartbeat.queue_offline_action(json!({"type": "homework"}));

    harness.transport.reply(HEARTBEAT, MockReply::Status(200));
    harness.transport.reply(SYNC, MockReply::Status(500));
    assert!(heartbeat.beat().await);

    assert!(!heartbeat.is_offline_mode());
    assert_eq!(harness.transport.count(SYNC), 1);
    assert_eq!(heartbeat.offline_stats().actions_count, 1);
    assert_eq!(heartbeat.last_sync_ms(), DEFAULT_START_MS);
}

#[tokio::test]
async fn queue_survives_a_restart() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    let id = heartbeat.queue_offline_action(json!({"type": "message", "to": "parent-7"}));
    heartbeat.destroy();

    let restored = harness.heartbeat();
    let pending = restored.pending_actions();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);
}

#[tokio::test]
async fn low_battery_switches_to_low_power_once_offline() {
    let harness = TestHarness::new();
    harness.runtime.set_battery(Some(0.10));
    let heartbeat = harness.heartbeat();
    assert_eq!(heartbeat.current_interval(), Duration::from_secs(15));

    harness.transport.reply(HEARTBEAT, MockReply::Status(502));
    heartbeat.beat().await;
    assert_eq!(heartbeat.current_interval(), Duration::from_secs(30));
    heartbeat.beat().await;
    assert_eq!(heartbeat.current_interval(), Duration::from_secs(60));
    heartbeat.beat().await;
    assert_eq!(heartbeat.current_interval(), Duration::from_secs(120));
}

#[tokio::test]
async fn force_reconnect_resets_backoff() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();

    harness.transport.reply(HEARTBEAT, MockReply::Fail("down".into()));
    for _ in 0..3 {
        heartbeat.beat().await;
    }
    assert!(heartbeat.is_offline_mode());

    harness.transport.reply(HEARTBEAT, MockReply::Status(200));
    assert!(heartbeat.force_reconnect().await);
    assert!(!heartbeat.is_offline_mode());
    assert_eq!(heartbeat.consecutive_failures(), 0);
    assert_eq!(heartbeat.current_interval(), Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn platform_link_events_drive_the_heartbeat() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    harness.transport.reply(HEARTBEAT, MockReply::Fail("down".into()));
    for _ in 0..3 {
        heartbeat.beat().await;
    }
    heartbeat.start();

    // link down: one more heartbeat, still offline
    harness.runtime.set_online(false);
    harness
        .wait_until(1_000, || heartbeat.consecutive_failures() == 4)
        .await
        .unwrap();
    assert!(heartbeat.is_offline_mode());

    // link up: recovery without waiting for the next heartbeat
    harness.runtime.set_online(true);
    harness
        .wait_until(1_000, || !heartbeat.is_offline_mode())
        .await
        .unwrap();
    assert_eq!(harness.transport.count(MISSED), 1);

    heartbeat.destroy();
}

#[tokio::test]
async fn application_requests_feed_the_heartbeat() {
    let harness = TestHarness::new();
    let services = harness.services();
    let heartbeat = &services.heartbeat;
    assert_eq!(services.client.observer_count(), 1);

    harness.transport.reply("/api/grades", MockReply::Fail("reset by peer".into()));
    let err = services.client.execute(HttpRequest::get("/api/grades")).await;
    assert!(err.is_err());
    assert_eq!(heartbeat.consecutive_failures(), 1);

    harness.transport.reply(HEARTBEAT, MockReply::Fail("down".into()));
    heartbeat.beat().await;
    heartbeat.beat().await;
    assert!(heartbeat.is_offline_mode());

    harness.transport.reply("/api/grades", MockReply::Status(200));
    services
        .client
        .execute(HttpRequest::get("/api/grades"))
        .await
        .unwrap();
    harness
        .wait_until(1_000, || !heartbeat.is_offline_mode())
        .await
        .unwrap();

    services.shutdown();
}

#[tokio::test]
async fn destroy_closes_event_subscriptions() {
    let harness = TestHarness::new();
    let heartbeat = harness.heartbeat();
    let mut events = heartbeat.subscribe();

    let waiter = tokio::spawn(async move { events.recv().await });
    harness.settle().await;
    heartbeat.destroy();

    let outcome = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, Err(RecvError::Closed)));

    let mut late = heartbeat.subscribe();
    assert!(matches!(late.try_recv(), Err(TryRecvError::Closed)));
}
