//! Control-plane capability interface consumed by the selector and the
//! dispatcher.
//!
//! The orchestrator only ever needs a handful of node, namespace, workload
//! and pod operations. They are collected in [`ClusterApi`] so the same
//! seeding logic runs against a live cluster ([`crate::kube_cluster`]) or an
//! in-process one ([`crate::memory`]).

use crate::labels;
use crate::workload::PullWorkload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("control plane returned {code}: {message}")]
    Api { code: u16, message: String },

    #[error("control plane client error: {0}")]
    Client(String),
}

impl ClusterError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ClusterError::AlreadyExists { .. })
    }
}

pub type ClusterResult<T> = std::result::Result<T, ClusterError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl NodeInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn is_seeder(&self) -> bool {
        labels::is_seeder(&self.labels)
    }
}

/// Scheduling status of a pull workload as reported by the control plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkloadStatus {
    /// Number of nodes the workload should run a replica on.
    pub desired: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

#[async_trait]
pub trait ClusterApi: Send + Sync {
    async fn list_nodes(&self) -> ClusterResult<Vec<NodeInfo>>;

    /// Read one node. Returns `NotFound` when the node was removed.
    async fn get_node(&self, name: &str) -> ClusterResult<NodeInfo>;

    /// Set `key=value` on the node's labels. Setting an existing label is a no-op.
    async fn label_node(&self, name: &str, key: &str, value: &str) -> ClusterResult<()>;

    /// Create the namespace if it does not exist yet.
    async fn ensure_namespace(&self, namespace: &str) -> ClusterResult<()>;

    async fn create_workload(&self, namespace: &str, workload: &PullWorkload) -> ClusterResult<()>;

    async fn workload_status(&self, namespace: &str, name: &str) -> ClusterResult<WorkloadStatus>;

    /// Phases of every pod matching `selector` (`key=value[,key=value]`).
    async fn list_workload_pods(&self, namespace: &str, selector: &str) -> ClusterResult<Vec<PodPhase>>;

    async fn delete_workload(&self, namespace: &str, name: &str) -> ClusterResult<()>;
}
