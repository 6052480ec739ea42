/**
 * INVENTORY KERNEL - Entry point of the website inventory dashboard
 *
 * ROLE: wires config, catalog client, snapshot store, refresh loop and HTTP.
 * Startup runs one catalog refresh before binding, so the first page view
 * already has data when Consul is reachable (or the last saved snapshot
 * when it is not).
 */

use inventory_kernel::auth::{SessionGate, SessionStore, SharedGate};
use inventory_kernel::catalog::CatalogClient;
use inventory_kernel::config::{load_config, Config};
use inventory_kernel::health::HealthTracker;
use inventory_kernel::http::{self, AppState};
use inventory_kernel::scheduler::RefreshScheduler;
use inventory_kernel::state::SnapshotStore;
use inventory_kernel::sync::Synchronizer;

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cfg: Config = load_config().context("invalid configuration")?;
    init_tracing(&cfg);
    info!("Starting infra-inventory");

    let client = CatalogClient::new(&cfg.catalog).context("failed to build Consul client")?;
    info!("Consul catalog at {}", client.base_url());
    let synchronizer = Synchronizer::new(client, cfg.catalog.datacenter.clone(), cfg.catalog.concurrency);

    let store = Arc::new(SnapshotStore::new(&cfg.snapshot_path));
    let health = HealthTracker::new();

    // the saved snapshot serves until the first refresh publishes a new one
    let saved = store.current().await;
    info!("{} websites available from {}", saved.len(), store.path().display());

    let scheduler = RefreshScheduler::new(synchronizer, store.clone(), health.clone(), cfg.refresh_interval);
    scheduler.refresh_once().await;
    let refresh_loop = scheduler.spawn();
    tokio::spawn(async move {
        match refresh_loop.await {
            Err(e) if e.is_panic() => error!("Refresh loop panicked, snapshot will go stale: {e}"),
            _ => error!("Refresh loop stopped, snapshot will go stale"),
        }
    });

    let sessions = SessionStore::new(cfg.auth.session_ttl_hours);
    if cfg.auth.secret_key.is_none() {
        warn!("SECRET_KEY not set, the login flow cannot sign its sessions");
    }
    if cfg.auth.oauth.issuer.is_none() {
        warn!("OAUTH_ISSUER not set, no login flow will open sessions");
    }
    let gate: SharedGate = Arc::new(SessionGate::new(sessions, cfg.auth.api_key.clone()));

    let app = http::build_router(AppState { store, health, gate });

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on http://{addr}");
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cfg.log_directive()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
