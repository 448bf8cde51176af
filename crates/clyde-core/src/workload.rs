use crate::labels;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const NAME_PREFIX: &str = "pull-";
const DIGEST_CHARS: usize = 12;

/// Container name of the single replica a pull workload runs per node.
pub const CONTAINER_NAME: &str = "puller";

/// Seconds a replica idles before exiting; the workload is deleted long before.
const IDLE_SECONDS: u32 = 3600;

/// Phase of one image's pull. Transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PullPhase {
    Pending,
    Scheduled,
    Running,
    Retired,
}

impl std::fmt::Display for PullPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PullPhase::Pending => "pending",
            PullPhase::Scheduled => "scheduled",
            PullPhase::Running => "running",
            PullPhase::Retired => "retired",
        };
        f.write_str(s)
    }
}

/// Ephemeral fleet-wide workload holding one image on every seeder node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullWorkload {
    pub name: String,
    pub image: String,
}

impl PullWorkload {
    pub fn for_image(image: &str) -> Self {
        Self {
            name: workload_name(image),
            image: image.to_string(),
        }
    }

    /// Labels carried by the workload and its pods.
    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (labels::JOB_LABEL.to_string(), labels::JOB_VALUE.to_string()),
            (labels::PULL_LABEL.to_string(), self.name.clone()),
        ])
    }

    /// Selector matching only this workload's pods.
    pub fn pod_selector(&self) -> String {
        labels::to_selector(&self.labels())
    }

    pub fn node_selector(&self) -> BTreeMap<String, String> {
        labels::seeder_selector()
    }

    pub fn command(&self) -> Vec<String> {
        vec![
            "/bin/sh".to_string(),
            "-c".to_string(),
            format!(
                "echo 'Waiting for image {} to be pulled'; sleep {IDLE_SECONDS}",
                self.image
            ),
        ]
    }
}

/// Deterministic DNS-safe workload name for an image reference.
pub fn workload_name(image: &str) -> String {
    let digest = Sha256::digest(image.as_bytes());
    let hex = format!("{digest:x}");
    format!("{NAME_PREFIX}{}", &hex[..DIGEST_CHARS])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_stable_and_dns_safe() {
        let a = workload_name("repo/image:tag");
        assert_eq!(a, workload_name("repo/image:tag"));
        assert!(a.starts_with("pull-"));
        assert_eq!(a.len(), NAME_PREFIX.len() + DIGEST_CHARS);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
    }

    #[test]
    fn name_distinguishes_tags() {
        assert_ne!(
            workload_name("nginx:1.25"),
            workload_name("nginx:1.26")
        );
    }

    #[test]
    fn pod_selector_is_per_workload() {
        let w = PullWorkload::for_image("busybox:latest");
        assert_eq!(
            w.pod_selector(),
            format!("clyde-job=image-pull,clyde-pull={}", w.name)
        );
    }

    #[test]
    fn command_idles_with_image() {
        let w = PullWorkload::for_image("busybox:latest");
        let cmd = w.command();
        assert_eq!(cmd[0], "/bin/sh");
        assert!(cmd[2].contains("busybox:latest"));
        assert!(cmd[2].contains("sleep"));
    }

    #[test]
    fn phases_are_ordered() {
        assert!(PullPhase::Pending < PullPhase::Scheduled);
        assert!(PullPhase::Running < PullPhase::Retired);
        assert_eq!(PullPhase::Retired.to_string(), "retired");
    }
}
