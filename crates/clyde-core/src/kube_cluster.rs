//! [`ClusterApi`] backed by a live Kubernetes API server.
//!
//! Pull workloads are DaemonSets restricted to seeder nodes by node
//! selector. Their pods idle with the image loaded, are never replaced on
//! spec changes (`OnDelete`), and terminate with no grace period.

use crate::cluster::{ClusterApi, ClusterError, ClusterResult, NodeInfo, PodPhase, WorkloadStatus};
use crate::workload::{PullWorkload, CONTAINER_NAME};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetSpec, DaemonSetUpdateStrategy};
use k8s_openapi::api::core::v1::{Container, Namespace, Node, Pod, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::json;
use tracing::{debug, info};

#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the local kubeconfig, falling back to in-cluster config.
    pub async fn try_default() -> ClusterResult<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| ClusterError::Client(e.to_string()))?;
        info!("kubernetes client initialized");
        Ok(Self::new(client))
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn daemon_sets(&self, namespace: &str) -> Api<DaemonSet> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn map_err(kind: &'static str, name: &str, err: kube::Error) -> ClusterError {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => ClusterError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) if resp.code == 409 => ClusterError::AlreadyExists {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(resp) => ClusterError::Api {
            code: resp.code,
            message: resp.message,
        },
        other => ClusterError::Client(other.to_string()),
    }
}

fn node_info(node: Node) -> NodeInfo {
    NodeInfo {
        name: node.metadata.name.unwrap_or_default(),
        labels: node.metadata.labels.unwrap_or_default(),
    }
}

/// DaemonSet manifest for a pull workload.
pub fn daemon_set(namespace: &str, workload: &PullWorkload) -> DaemonSet {
    let labels = workload.labels();
    DaemonSet {
        metadata: ObjectMeta {
            name: Some(workload.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DaemonSetSpec {
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    node_selector: Some(workload.node_selector()),
                    containers: vec![Container {
                        name: CONTAINER_NAME.to_string(),
                        image: Some(workload.image.clone()),
                        command: Some(workload.command()),
                        ..Default::default()
                    }],
                    restart_policy: Some("Always".to_string()),
                    termination_grace_period_seconds: Some(0),
                    ..Default::default()
                }),
            },
            update_strategy: Some(DaemonSetUpdateStrategy {
                type_: Some("OnDelete".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_nodes(&self) -> ClusterResult<Vec<NodeInfo>> {
        let list = self
            .nodes()
            .list(&ListParams::default())
            .await
            .map_err(|e| map_err("node", "*", e))?;
        Ok(list.items.into_iter().map(node_info).collect())
    }

    async fn get_node(&self, name: &str) -> ClusterResult<NodeInfo> {
        self.nodes()
            .get(name)
            .await
            .map(node_info)
            .map_err(|e| map_err("node", name, e))
    }

    async fn label_node(&self, name: &str, key: &str, value: &str) -> ClusterResult<()> {
        let patch = json!({ "metadata": { "labels": { key: value } } });
        self.nodes()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_err("node", name, e))?;
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> ClusterResult<()> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(namespace).await {
            Ok(_) => {
                info!(namespace, "namespace already exists");
                return Ok(());
            }
            Err(e) => match map_err("namespace", namespace, e) {
                ClusterError::NotFound { .. } => {}
                other => return Err(other),
            },
        }
        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!(namespace, "namespace created");
                Ok(())
            }
            Err(e) => match map_err("namespace", namespace, e) {
                ClusterError::AlreadyExists { .. } => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn create_workload(&self, namespace: &str, workload: &PullWorkload) -> ClusterResult<()> {
        let ds = daemon_set(namespace, workload);
        self.daemon_sets(namespace)
            .create(&PostParams::default(), &ds)
            .await
            .map_err(|e| map_err("daemonset", &workload.name, e))?;
        debug!(namespace, workload = %workload.name, "daemonset created");
        Ok(())
    }

    async fn workload_status(&self, namespace: &str, name: &str) -> ClusterResult<WorkloadStatus> {
        let ds = self
            .daemon_sets(namespace)
            .get(name)
            .await
            .map_err(|e| map_err("daemonset", name, e))?;
        let desired = ds
            .status
            .map(|s| s.desired_number_scheduled)
            .unwrap_or(0)
            .max(0) as u32;
        Ok(WorkloadStatus { desired })
    }

    async fn list_workload_pods(&self, namespace: &str, selector: &str) -> ClusterResult<Vec<PodPhase>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| map_err("pod", selector, e))?;
        Ok(pods
            .items
            .into_iter()
            .map(|p| {
                p.status
                    .and_then(|s| s.phase)
                    .map(|phase| PodPhase::parse(&phase))
                    .unwrap_or(PodPhase::Unknown)
            })
            .collect())
    }

    async fn delete_workload(&self, namespace: &str, name: &str) -> ClusterResult<()> {
        self.daemon_sets(namespace)
            .delete(name, &DeleteParams::background())
            .await
            .map_err(|e| map_err("daemonset", name, e))?;
        Ok(())
    }
}
