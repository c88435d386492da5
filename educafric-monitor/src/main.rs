/**
 * EDUCAFRIC MONITOR - hôte natif des services de connectivité
 *
 * RÔLE : charge la config, construit le transport, le runtime et le file store,
 * bootstrap les services et sert l'API de statut locale.
 *
 * Un monitor par machine : aucune autre instance ne partage ses résultats,
 * le canal pair est donc le canal no-op. Sans source d'input, le filtre
 * d'inactivité est coupé sauf si `track_user_activity` est activé.
 *
 * Ctrl-C arrête le serveur HTTP et arrête les services une seule fois
 * (timers annulés, snapshot hors-ligne persisté).
 */

mod http;

use crate::http::AppState;
use anyhow::Context;
use educafric_connectivity::{
    load_config, system_clock, ConnectivityServices, FileStore, NativeRuntime, NoopPeerChannel,
    ReqwestTransport, ServiceDeps,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = load_config().await;
    info!("[monitor] api {}", cfg.api_base_url);

    let mut runtime = NativeRuntime::new();
    if let Some(hint) = cfg.connection.clone() {
        runtime = runtime.with_connection_hint(hint);
    }
    if let Some(ua) = cfg.user_agent.clone() {
        runtime = runtime.with_user_agent(ua);
    }

    let storage_dir = cfg.storage_dir.clone().unwrap_or_else(default_storage_dir);
    std::fs::create_dir_all(&storage_dir)
        .with_context(|| format!("creating storage dir {}", storage_dir.display()))?;

    let services = ConnectivityServices::bootstrap(ServiceDeps {
        scheduler: cfg.scheduler_settings(),
        heartbeat: cfg.heartbeat.clone(),
        transport: Arc::new(ReqwestTransport::new(cfg.api_base_url.clone())),
        runtime: Arc::new(runtime),
        store: Arc::new(FileStore::new(&storage_dir)),
        peers: Arc::new(NoopPeerChannel),
        clock: system_clock(),
    });
    services.start();

    let app = http::build_router(AppState {
        services: services.clone(),
    });

    let addr: SocketAddr = cfg
        .status_addr
        .parse()
        .with_context(|| format!("invalid status_addr {}", cfg.status_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("[monitor] status api on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("status api")?;

    services.shutdown();
    Ok(())
}

fn default_storage_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("educafric-monitor"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[monitor] ctrl-c handler failed: {e}");
    }
    info!("[monitor] shutting down");
}
