/**
 * API DE STATUT - surface HTTP locale des services de connectivité
 *
 * RÔLE :
 * Expose les opérations publiques du scheduler, du heartbeat et de l'adapter
 * aux outils locaux (dashboards, scripts, shell desktop).
 *
 * ROUTES :
 * - /health, /health/latest, /health/check, /health/telemetry
 * - /connection (état de connexion legacy + dernier rapport de qualité)
 * - /offline/stats, /offline/actions, /offline/reconnect
 * - /activity (input utilisateur vu par l'hôte, garde le scheduler actif)
 */

use axum::http::StatusCode;
use axum::{extract::State, routing::{get, post}, Json, Router};
use educafric_connectivity::{
    AdaptiveConfig, ConnectionMode, ConnectionState, ConnectivityServices, DeviceProfile,
    HealthCheckResult, NetworkQualityReport, OfflineStats, Telemetry,
};
use serde::Serialize;

#[derive(Clone)]
pub struct AppState {
    pub services: ConnectivityServices,
}

#[derive(Serialize)]
struct TelemetryView {
    telemetry: Telemetry,
    adaptive: AdaptiveConfig,
    timer_running: bool,
}

#[derive(Serialize)]
struct ConnectionView {
    state: ConnectionState,
    quality: Option<NetworkQualityReport>,
    profile: DeviceProfile,
}

#[derive(Serialize)]
struct OfflineView {
    mode: ConnectionMode,
    #[serde(flatten)]
    stats: OfflineStats,
    consecutive_failures: u32,
    last_sync_ms: i64,
    missed_notifications: usize,
}

#[derive(Serialize)]
struct QueuedView {
    id: String,
}

#[derive(Serialize)]
struct ReconnectView {
    reconnected: bool,
    mode: ConnectionMode,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/health/latest", get(latest_result))
        .route("/health/check", post(check_now))
        .route("/health/telemetry", get(telemetry))
        .route("/connection", get(connection))
        .route("/offline/stats", get(offline_stats))
        .route("/offline/actions", post(queue_action))
        .route("/offline/reconnect", post(reconnect))
        .route("/activity", post(activity))
        .with_state(app_state)
}

// GET /health/latest
async fn latest_result(State(app): State<AppState>) -> Result<Json<HealthCheckResult>, StatusCode> {
    app.services
        .scheduler
        .latest_result()
        .map(Json)
        .ok_or(StatusCode::NO_CONTENT)
}

// POST /health/check
async fn check_now(State(app): State<AppState>) -> Json<HealthCheckResult> {
    Json(app.services.scheduler.check_health_immediate().await)
}

// GET /health/telemetry
async fn telemetry(State(app): State<AppState>) -> Json<TelemetryView> {
    let scheduler = &app.services.scheduler;
    Json(TelemetryView {
        telemetry: scheduler.telemetry(),
        adaptive: scheduler.adaptive_config(),
        timer_running: scheduler.is_timer_running(),
    })
}

// GET /connection
async fn connection(State(app): State<AppState>) -> Json<ConnectionView> {
    Json(ConnectionView {
        state: app.services.adapter.connection_state(),
        quality: app.services.adapter.latest_quality(),
        profile: app.services.profile.clone(),
    })
}

// GET /offline/stats
async fn offline_stats(State(app): State<AppState>) -> Json<OfflineView> {
    let heartbeat = &app.services.heartbeat;
    Json(OfflineView {
        mode: heartbeat.connection_mode(),
        stats: heartbeat.offline_stats(),
        consecutive_failures: heartbeat.consecutive_failures(),
        last_sync_ms: heartbeat.last_sync_ms(),
        missed_notifications: heartbeat.missed_notifications().len(),
    })
}

// POST /offline/actions
async fn queue_action(
    State(app): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> (StatusCode, Json<QueuedView>) {
    let id = app.services.heartbeat.queue_offline_action(payload);
    (StatusCode::ACCEPTED, Json(QueuedView { id }))
}

// POST /offline/reconnect
async fn reconnect(State(app): State<AppState>) -> Json<ReconnectView> {
    let reconnected = app.services.heartbeat.force_reconnect().await;
    Json(ReconnectView {
        reconnected,
        mode: app.services.heartbeat.connection_mode(),
    })
}

// POST /activity
async fn activity(State(app): State<AppState>) -> StatusCode {
    app.services.scheduler.record_user_activity();
    StatusCode::NO_CONTENT
}
