//! Seeder selection.
//!
//! A run loads the recorded seeders, keeps those that still exist and still
//! carry the marker label, then labels randomly chosen nodes until the quota
//! `max(1, floor(nodes * percentage / 100))` is met or no candidates remain.
//! The store lock is held from the load until the save, so two runs against
//! the same snapshot never grow from the same baseline.

use crate::cluster::{ClusterApi, NodeInfo};
use crate::error::{Result, SeedError};
use crate::labels;
use crate::store::SeederStore;
use crate::types::SeederSet;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of one selection run.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub seeders: SeederSet,
    pub target: usize,
    pub node_count: usize,
    /// Recorded seeders dropped during validation.
    pub dropped: Vec<String>,
    /// Nodes labeled during this run.
    pub labeled: Vec<String>,
    /// Nodes whose label patch failed.
    pub failed: Vec<String>,
}

pub struct Selector {
    cluster: Arc<dyn ClusterApi>,
    store: SeederStore,
}

impl Selector {
    pub fn new(cluster: Arc<dyn ClusterApi>, store: SeederStore) -> Self {
        Self { cluster, store }
    }

    /// Compute, label, and persist the seeder set for `percentage` (0-100).
    pub async fn select_seeders(&self, percentage: u32) -> Result<SeederSet> {
        Ok(self.select(percentage).await?.seeders)
    }

    /// Same as [`Selector::select_seeders`] with the per-run details.
    pub async fn select(&self, percentage: u32) -> Result<Selection> {
        if percentage > 100 {
            return Err(SeedError::InvalidPercentage(percentage));
        }
        info!(percentage, "starting seeder selection");

        let guard = self.store.lock().await?;
        let recorded = guard.load();
        debug!(recorded = recorded.len(), "recorded seeders");

        let nodes = self.cluster.list_nodes().await?;
        info!(count = nodes.len(), "listed cluster nodes");

        let (mut seeders, dropped) = self.validate(&recorded).await;

        let target = target_count(nodes.len(), percentage);
        let needed = target.saturating_sub(seeders.len());
        info!(
            target,
            healthy = seeders.len(),
            needed,
            "computed seeder quota"
        );

        let mut labeled = Vec::new();
        let mut failed = Vec::new();
        if needed > 0 {
            let picked = pick_candidates(&nodes, &seeders, needed);
            for name in picked {
                match labels::mark_seeder(self.cluster.as_ref(), &name).await {
                    Ok(()) => {
                        info!(node = %name, "labeled new seeder");
                        seeders.insert(name.clone());
                        labeled.push(name);
                    }
                    Err(e) => {
                        error!(node = %name, error = %e, "failed to label seeder");
                        failed.push(name);
                    }
                }
            }
        }

        guard.save(&seeders)?;
        drop(guard);

        info!(
            seeders = ?seeders.iter().collect::<Vec<_>>(),
            "seeder selection complete"
        );
        Ok(Selection {
            seeders,
            target,
            node_count: nodes.len(),
            dropped,
            labeled,
            failed,
        })
    }

    /// Keep recorded seeders that still exist and still carry the marker.
    async fn validate(&self, recorded: &SeederSet) -> (SeederSet, Vec<String>) {
        let mut healthy = SeederSet::new();
        let mut dropped = Vec::new();
        for name in recorded.iter() {
            match self.cluster.get_node(name).await {
                Ok(node) if node.is_seeder() => {
                    debug!(node = %name, "validated recorded seeder");
                    healthy.insert(name);
                }
                Ok(_) => {
                    warn!(node = %name, "recorded seeder lost its label, dropping");
                    dropped.push(name.to_string());
                }
                Err(e) if e.is_not_found() => {
                    warn!(node = %name, "recorded seeder no longer exists, dropping");
                    dropped.push(name.to_string());
                }
                Err(e) => {
                    warn!(node = %name, error = %e, "could not read recorded seeder, dropping");
                    dropped.push(name.to_string());
                }
            }
        }
        (healthy, dropped)
    }
}

/// Seeder quota for a cluster of `node_count` nodes. Never below one.
pub fn target_count(node_count: usize, percentage: u32) -> usize {
    (node_count * percentage as usize / 100).max(1)
}

/// Uniformly sample up to `needed` nodes that are not already seeders.
fn pick_candidates(nodes: &[NodeInfo], seeders: &SeederSet, needed: usize) -> Vec<String> {
    let candidates: Vec<&NodeInfo> = nodes
        .iter()
        .filter(|n| !seeders.contains(&n.name))
        .collect();
    let count = needed.min(candidates.len());
    if count < needed {
        warn!(
            needed,
            candidates = candidates.len(),
            "not enough candidate nodes to meet seeder quota"
        );
    }
    info!(count, candidates = candidates.len(), "labeling new seeders");

    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count)
        .map(|n| n.name.clone())
        .collect()
}
