//! Cluster identity port.
//!
//! The runtime client needs to know whether it runs inside Kubernetes (to
//! pick service DNS over plain container names) and in which namespace;
//! bootstrap needs the cluster name to persist the environment record.

use std::path::Path;

use tracing::debug;

use podwatch_core::config::ClusterConfig;

/// Service-account file holding the pod's namespace.
pub const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

pub trait ClusterInfo: Send + Sync {
    fn cluster(&self) -> String;
    fn namespace(&self) -> String;
    fn in_cluster(&self) -> bool;
}

/// Cluster identity captured once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCluster {
    pub name: String,
    pub namespace: String,
    pub in_cluster: bool,
}

impl StaticCluster {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, in_cluster: bool) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            in_cluster,
        }
    }

    /// Detect the cluster from the process environment.
    pub fn detect(fallback: &ClusterConfig) -> Self {
        Self::detect_with(
            fallback,
            |key| std::env::var(key).ok(),
            Path::new(NAMESPACE_FILE),
        )
    }

    /// Detection with injectable environment lookup and namespace file.
    ///
    /// Inside a pod `KUBERNETES_SERVICE_HOST` is set and names the API
    /// server; it doubles as the cluster name. The namespace comes from
    /// the service-account file when readable.
    pub fn detect_with(
        fallback: &ClusterConfig,
        env: impl Fn(&str) -> Option<String>,
        namespace_file: &Path,
    ) -> Self {
        let api_host = env("KUBERNETES_SERVICE_HOST").filter(|h| !h.trim().is_empty());
        let in_cluster = api_host.is_some();

        let namespace = std::fs::read_to_string(namespace_file)
            .ok()
            .map(|ns| ns.trim().to_string())
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| fallback.namespace.clone());

        let name = api_host.unwrap_or_else(|| fallback.name.clone());

        debug!(cluster = %name, %namespace, in_cluster, "cluster detected");
        Self::new(name, namespace, in_cluster)
    }
}

impl ClusterInfo for StaticCluster {
    fn cluster(&self) -> String {
        self.name.clone()
    }

    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn in_cluster(&self) -> bool {
        self.in_cluster
    }
}

/// Base address of a runtime container.
///
/// In-cluster: `http://<container>.<namespace>.svc.cluster.local`;
/// otherwise `http://<container>:8080`.
pub fn container_address(cluster: &dyn ClusterInfo, container: &str) -> String {
    if cluster.in_cluster() {
        format!("http://{container}.{}.svc.cluster.local", cluster.namespace())
    } else {
        format!("http://{container}:8080")
    }
}
