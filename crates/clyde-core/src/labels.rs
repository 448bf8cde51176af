use crate::cluster::{ClusterApi, ClusterResult};
use std::collections::BTreeMap;

/// Node label marking a node as an image seeder.
pub const SEEDER_LABEL: &str = "clyde-seeder";
pub const SEEDER_VALUE: &str = "true";

/// Label shared by every pull workload and its pods.
pub const JOB_LABEL: &str = "clyde-job";
pub const JOB_VALUE: &str = "image-pull";

/// Label identifying the pods of one pull workload.
pub const PULL_LABEL: &str = "clyde-pull";

pub fn is_seeder(labels: &BTreeMap<String, String>) -> bool {
    labels.get(SEEDER_LABEL).map(String::as_str) == Some(SEEDER_VALUE)
}

/// Put the seeder marker on a node.
pub async fn mark_seeder(cluster: &dyn ClusterApi, node: &str) -> ClusterResult<()> {
    cluster.label_node(node, SEEDER_LABEL, SEEDER_VALUE).await
}

/// Node selector restricting a workload to seeder nodes.
pub fn seeder_selector() -> BTreeMap<String, String> {
    BTreeMap::from([(SEEDER_LABEL.to_string(), SEEDER_VALUE.to_string())])
}

/// Render labels as a `key=value,key=value` selector string.
pub fn to_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse a `key=value,key=value` selector. Malformed terms are skipped.
pub fn parse_selector(selector: &str) -> BTreeMap<String, String> {
    selector
        .split(',')
        .filter_map(|term| term.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect()
}

/// True when every `key=value` in `selector` is present in `labels`.
pub fn matches(selector: &BTreeMap<String, String>, labels: &BTreeMap<String, String>) -> bool {
    selector.iter().all(|(k, v)| labels.get(k) == Some(v))
}
