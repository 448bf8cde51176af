pub mod config;
pub mod images;
pub mod run;
pub mod seed;
pub mod select;
pub mod status;

use anyhow::Context;
use clyde_core::cluster::ClusterApi;
use clyde_core::config::{Config, WarnLevel};
use clyde_core::kube_cluster::KubeCluster;
use clyde_core::store::SeederStore;
use std::sync::Arc;

pub(crate) fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Runtime::new()?)
}

pub(crate) async fn connect() -> anyhow::Result<Arc<dyn ClusterApi>> {
    let cluster = KubeCluster::try_default()
        .await
        .context("failed to initialize Kubernetes client")?;
    Ok(Arc::new(cluster))
}

pub(crate) fn store(config: &Config) -> SeederStore {
    SeederStore::new(&config.seeder_tracker_file)
}

/// Refuse to touch the cluster with a configuration that has errors.
pub(crate) fn ensure_valid(config: &Config) -> anyhow::Result<()> {
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }
    Ok(())
}
