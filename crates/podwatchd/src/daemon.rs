//! Process assembly and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use podwatch_core::PodwatchConfig;
use podwatch_dispatch::SignalBus;
use podwatch_probe::{BreakerSettings, ClusterInfo, HttpRuntimeClient, StaticCluster};
use podwatch_reconcile::{
    BackgroundReloads, Reconciler, ReconcileSettings, ReloadOrchestrator, StatusCollector,
};
use podwatch_state::{StateStore, StatusStore};

use crate::api::{ApiState, build_router};
use crate::bootstrap::run_bootstrap;

/// Run the daemon until Ctrl-C.
pub async fn run(config: PodwatchConfig) -> anyhow::Result<()> {
    info!(environment = %config.environment, "podwatch daemon starting");

    // ── State store ────────────────────────────────────────────

    std::fs::create_dir_all(&config.data_dir)?;
    let db_path = config.data_dir.join("podwatch.redb");
    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    // ── Bootstrap ──────────────────────────────────────────────

    let cluster = Arc::new(StaticCluster::detect(&config.cluster));
    let signals = SignalBus::default();
    run_bootstrap(&store, cluster.as_ref(), &signals, &config)?;

    // ── Reconciliation engine ──────────────────────────────────

    let port: Arc<dyn StatusStore> = Arc::new(store.clone());
    let cluster: Arc<dyn ClusterInfo> = cluster;
    let client = Arc::new(HttpRuntimeClient::new(cluster, BreakerSettings::from(&config)));
    let settings = ReconcileSettings::from(&config);

    let reload = Arc::new(ReloadOrchestrator::new(port.clone(), client.clone(), &settings));
    let background = BackgroundReloads::new(reload.clone());
    let collector = Arc::new(
        StatusCollector::new(port.clone(), client, &settings)
            .with_context_callback(background.context_callback()),
    );
    let reconciler = Reconciler::start(collector, &settings);

    // ── API server ─────────────────────────────────────────────

    let router = build_router(ApiState {
        store: port,
        environment: settings.environment.clone(),
        reload,
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    reconciler.shutdown().await;
    background.shutdown().await;
    info!("podwatch daemon stopped");
    Ok(())
}
