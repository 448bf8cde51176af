//! One full seeding pass: namespace bootstrap, seeder selection, pre-pull.

use crate::cluster::ClusterApi;
use crate::dispatcher::{DispatchConfig, Dispatcher, PullReport};
use crate::error::Result;
use crate::images::ImageList;
use crate::selector::{Selection, Selector};
use crate::store::SeederStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub selection: Selection,
    pub pulls: Vec<PullReport>,
}

/// Ensure the pull namespace exists, select seeders at `percentage`, then
/// pull every image onto them.
pub async fn run_once(
    cluster: Arc<dyn ClusterApi>,
    store: SeederStore,
    percentage: u32,
    dispatch: DispatchConfig,
    images: &ImageList,
) -> Result<RunReport> {
    info!(namespace = %dispatch.namespace, "ensuring pull namespace");
    if let Err(e) = cluster.ensure_namespace(&dispatch.namespace).await {
        error!(namespace = %dispatch.namespace, error = %e, "failed to ensure namespace");
        return Err(e.into());
    }

    let selection = Selector::new(cluster.clone(), store).select(percentage).await?;
    let pulls = Dispatcher::new(cluster, dispatch)
        .seed_images(images, &selection.seeders)
        .await?;
    Ok(RunReport { selection, pulls })
}
