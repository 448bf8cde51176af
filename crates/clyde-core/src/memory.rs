//! In-process [`ClusterApi`] implementation.
//!
//! Nodes, labels and pull workloads live in memory. Workload scheduling and
//! pod start-up are simulated with poll counters so callers can exercise the
//! pending/scheduled/running progression deterministically, and individual
//! operations can be made to fail.

use crate::cluster::{ClusterApi, ClusterError, ClusterResult, NodeInfo, PodPhase, WorkloadStatus};
use crate::labels;
use crate::workload::PullWorkload;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct MemWorkload {
    workload: PullWorkload,
    status_reads: u32,
    pod_reads: u32,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, NodeInfo>,
    namespaces: BTreeSet<String>,
    workloads: BTreeMap<(String, String), MemWorkload>,
    fail_label: BTreeSet<String>,
    fail_create: bool,
    fail_delete: bool,
    schedule_delay: u32,
    running_delay: u32,
    status_errors: u32,
    pod_list_errors: u32,
    created: Vec<PullWorkload>,
    deleted: Vec<String>,
    max_live: usize,
}

#[derive(Debug, Default)]
pub struct MemoryCluster {
    state: Mutex<State>,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cluster with nodes `node-0` .. `node-{count-1}`, none labeled.
    pub fn with_nodes(count: usize) -> Self {
        let cluster = Self::new();
        for i in 0..count {
            cluster.add_node(&format!("node-{i}"));
        }
        cluster
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -----------------------------------------------------------------------
    // Node fixtures
    // -----------------------------------------------------------------------

    pub fn add_node(&self, name: &str) {
        self.state()
            .nodes
            .insert(name.to_string(), NodeInfo::new(name));
    }

    pub fn remove_node(&self, name: &str) {
        self.state().nodes.remove(name);
    }

    pub fn node(&self, name: &str) -> Option<NodeInfo> {
        self.state().nodes.get(name).cloned()
    }

    pub fn remove_label(&self, node: &str, key: &str) {
        if let Some(n) = self.state().nodes.get_mut(node) {
            n.labels.remove(key);
        }
    }

    /// Names of nodes currently carrying the seeder marker.
    pub fn labeled_nodes(&self) -> Vec<String> {
        self.state()
            .nodes
            .values()
            .filter(|n| n.is_seeder())
            .map(|n| n.name.clone())
            .collect()
    }

    // -----------------------------------------------------------------------
    // Behaviour knobs
    // -----------------------------------------------------------------------

    /// Make label patches on `node` fail.
    pub fn fail_label(&self, node: &str) {
        self.state().fail_label.insert(node.to_string());
    }

    pub fn fail_create(&self, fail: bool) {
        self.state().fail_create = fail;
    }

    pub fn fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    /// Status reads that report zero desired replicas before scheduling.
    pub fn set_schedule_delay(&self, reads: u32) {
        self.state().schedule_delay = reads;
    }

    /// Pod listings that report `Pending` before pods are `Running`.
    pub fn set_running_delay(&self, reads: u32) {
        self.state().running_delay = reads;
    }

    /// Fail the next `count` status reads with a transient error.
    pub fn inject_status_errors(&self, count: u32) {
        self.state().status_errors = count;
    }

    /// Fail the next `count` pod listings with a transient error.
    pub fn inject_pod_list_errors(&self, count: u32) {
        self.state().pod_list_errors = count;
    }

    // -----------------------------------------------------------------------
    // Observations
    // -----------------------------------------------------------------------

    pub fn namespaces(&self) -> Vec<String> {
        self.state().namespaces.iter().cloned().collect()
    }

    /// Every workload ever created, in creation order.
    pub fn created_workloads(&self) -> Vec<PullWorkload> {
        self.state().created.clone()
    }

    pub fn deleted_workloads(&self) -> Vec<String> {
        self.state().deleted.clone()
    }

    pub fn live_workloads(&self) -> Vec<String> {
        self.state()
            .workloads
            .values()
            .map(|w| w.workload.name.clone())
            .collect()
    }

    /// Highest number of workloads that existed at the same time.
    pub fn max_live_workloads(&self) -> usize {
        self.state().max_live
    }
}

impl State {
    fn desired_for(&self, workload: &PullWorkload) -> u32 {
        let selector = workload.node_selector();
        self.nodes
            .values()
            .filter(|n| labels::matches(&selector, &n.labels))
            .count() as u32
    }
}

fn transient(what: &str) -> ClusterError {
    ClusterError::Api {
        code: 503,
        message: format!("{what} temporarily unavailable"),
    }
}

#[async_trait]
impl ClusterApi for MemoryCluster {
    async fn list_nodes(&self) -> ClusterResult<Vec<NodeInfo>> {
        Ok(self.state().nodes.values().cloned().collect())
    }

    async fn get_node(&self, name: &str) -> ClusterResult<NodeInfo> {
        self.state()
            .nodes
            .get(name)
            .cloned()
            .ok_or_else(|| ClusterError::NotFound {
                kind: "node",
                name: name.to_string(),
            })
    }

    async fn label_node(&self, name: &str, key: &str, value: &str) -> ClusterResult<()> {
        let mut state = self.state();
        if state.fail_label.contains(name) {
            return Err(ClusterError::Api {
                code: 403,
                message: format!("patching node {name} is forbidden"),
            });
        }
        let node = state
            .nodes
            .get_mut(name)
            .ok_or_else(|| ClusterError::NotFound {
                kind: "node",
                name: name.to_string(),
            })?;
        node.labels.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> ClusterResult<()> {
        self.state().namespaces.insert(namespace.to_string());
        Ok(())
    }

    async fn create_workload(&self, namespace: &str, workload: &PullWorkload) -> ClusterResult<()> {
        let mut state = self.state();
        if state.fail_create {
            return Err(ClusterError::Api {
                code: 500,
                message: "admission webhook rejected workload".to_string(),
            });
        }
        let key = (namespace.to_string(), workload.name.clone());
        if state.workloads.contains_key(&key) {
            return Err(ClusterError::AlreadyExists {
                kind: "daemonset",
                name: workload.name.clone(),
            });
        }
        state.workloads.insert(
            key,
            MemWorkload {
                workload: workload.clone(),
                status_reads: 0,
                pod_reads: 0,
            },
        );
        state.created.push(workload.clone());
        state.max_live = state.max_live.max(state.workloads.len());
        Ok(())
    }

    async fn workload_status(&self, namespace: &str, name: &str) -> ClusterResult<WorkloadStatus> {
        let mut state = self.state();
        if state.status_errors > 0 {
            state.status_errors -= 1;
            return Err(transient("daemonset status"));
        }
        let key = (namespace.to_string(), name.to_string());
        let schedule_delay = state.schedule_delay;
        let (reads, workload) = match state.workloads.get_mut(&key) {
            Some(w) => {
                w.status_reads += 1;
                (w.status_reads, w.workload.clone())
            }
            None => {
                return Err(ClusterError::NotFound {
                    kind: "daemonset",
                    name: name.to_string(),
                })
            }
        };
        let desired = if reads > schedule_delay {
            state.desired_for(&workload)
        } else {
            0
        };
        Ok(WorkloadStatus { desired })
    }

    async fn list_workload_pods(&self, namespace: &str, selector: &str) -> ClusterResult<Vec<PodPhase>> {
        let mut state = self.state();
        if state.pod_list_errors > 0 {
            state.pod_list_errors -= 1;
            return Err(transient("pod list"));
        }
        let selector = labels::parse_selector(selector);
        let running_delay = state.running_delay;
        let mut matched = Vec::new();
        for ((ns, _), w) in state.workloads.iter_mut() {
            if ns == namespace && labels::matches(&selector, &w.workload.labels()) {
                w.pod_reads += 1;
                matched.push((w.workload.clone(), w.pod_reads));
            }
        }
        let mut phases = Vec::new();
        for (workload, reads) in matched {
            let phase = if reads > running_delay {
                PodPhase::Running
            } else {
                PodPhase::Pending
            };
            let replicas = state.desired_for(&workload);
            phases.extend(std::iter::repeat(phase).take(replicas as usize));
        }
        Ok(phases)
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        let mut state = self.state();
        if state.fail_delete {
            return Err(ClusterError::Api {
                code: 500,
                message: format!("etcd timeout deleting daemonset {name}"),
            });
        }
        let key = (namespace.to_string(), name.to_string());
        if state.workloads.remove(&key).is_none() {
            return Err(ClusterError::NotFound {
                kind: "daemonset",
                name: name.to_string(),
            });
        }
        state.deleted.push(name.to_string());
        Ok(())
    }
}
