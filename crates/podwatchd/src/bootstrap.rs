//! Startup sequence.
//!
//! Runs once, before the loops start: mark the store ready, persist the
//! environment record, and announce the one-time imports and the cluster
//! watchers on the signal bus. Signals are fire-and-forget.

use podwatch_core::PodwatchConfig;
use podwatch_dispatch::{Signal, SignalBus};
use podwatch_probe::ClusterInfo;
use podwatch_state::{Environment, StateStore, StatusStore};
use tracing::info;

/// Run the startup sequence and return the environment it recorded.
pub fn run_bootstrap(
    store: &StateStore,
    cluster: &dyn ClusterInfo,
    signals: &SignalBus,
    config: &PodwatchConfig,
) -> anyhow::Result<Environment> {
    store.start();

    let environment = Environment {
        name: config.environment.clone(),
        cluster: cluster.cluster(),
        namespace: cluster.namespace(),
        pipeline: config.pipeline.clone(),
    };
    store.save_environment(&environment)?;
    info!(
        environment = %environment.name,
        cluster = %environment.cluster,
        namespace = %environment.namespace,
        "environment recorded"
    );

    if store.list_projects()?.is_empty() {
        info!("no projects in store, requesting import");
        signals.publish(Signal::ImportProjects);
    }
    signals.publish(Signal::ImportKamelets);
    signals.publish(Signal::StartWatchers);

    Ok(environment)
}
