//! Image pre-pull dispatch.
//!
//! Each image gets one ephemeral [`PullWorkload`] that runs a replica on
//! every seeder node. The dispatcher drives it through
//! `pending -> scheduled -> running -> retired` and only then moves on to
//! the next image.

use crate::cluster::{ClusterApi, PodPhase};
use crate::error::{Result, SeedError};
use crate::images::ImageList;
use crate::types::SeederSet;
use crate::workload::{PullPhase, PullWorkload};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub namespace: String,
    /// Polls of the scheduling-wait before continuing without a desired count.
    pub schedule_timeout_polls: u32,
    pub schedule_poll_interval: Duration,
    pub running_poll_interval: Duration,
    /// Bound on the running-wait. `None` waits indefinitely.
    pub running_timeout: Option<Duration>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            namespace: "clyde".to_string(),
            schedule_timeout_polls: 30,
            schedule_poll_interval: Duration::from_secs(1),
            running_poll_interval: Duration::from_secs(3),
            running_timeout: None,
        }
    }
}

/// Result of one retired pull workload.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub image: String,
    pub workload: String,
    pub desired: u32,
    pub running: u32,
    /// The workload was deleted by a concurrent run pulling the same image.
    pub retired_elsewhere: bool,
    #[serde(with = "secs_f64")]
    pub elapsed: Duration,
}

/// How the running-wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunningWait {
    AllRunning(u32),
    /// The workload disappeared before all replicas were seen running.
    Vanished(u32),
}

pub struct Dispatcher {
    cluster: Arc<dyn ClusterApi>,
    config: DispatchConfig,
}

/// Fail with `NoSeedersAvailable` when `seeders` is empty.
pub fn ensure_seeders(seeders: &SeederSet) -> Result<()> {
    if seeders.is_empty() {
        error!("no seeders available for seeding");
        return Err(SeedError::NoSeedersAvailable);
    }
    Ok(())
}

impl Dispatcher {
    pub fn new(cluster: Arc<dyn ClusterApi>, config: DispatchConfig) -> Self {
        Self { cluster, config }
    }

    /// Pull every image onto the seeder nodes, one image at a time.
    ///
    /// Stops at the first image that fails; images before it are retired.
    pub async fn seed_images(&self, images: &ImageList, seeders: &SeederSet) -> Result<Vec<PullReport>> {
        ensure_seeders(seeders)?;
        info!(
            images = images.len(),
            seeders = seeders.len(),
            "seeding images to seeders"
        );

        let mut reports = Vec::with_capacity(images.len());
        for image in images.iter() {
            info!(image = %image, "processing image");
            let report = self.pull_image(image).await?;
            reports.push(report);
        }
        info!(count = reports.len(), "node seeding completed");
        Ok(reports)
    }

    async fn pull_image(&self, image: &str) -> Result<PullReport> {
        let started = Instant::now();
        let workload = PullWorkload::for_image(image);
        let ns = &self.config.namespace;
        info!(image = %image, workload = %workload.name, "creating pull workload");

        match self.cluster.create_workload(ns, &workload).await {
            Ok(()) => {
                debug!(workload = %workload.name, phase = %PullPhase::Pending, "pull workload created");
            }
            Err(e) if e.is_already_exists() => {
                warn!(workload = %workload.name, "pull workload already exists, adopting it");
            }
            Err(source) => {
                error!(workload = %workload.name, error = %source, "pull workload creation failed");
                return Err(SeedError::WorkloadCreate {
                    workload: workload.name,
                    image: image.to_string(),
                    source,
                });
            }
        }

        let desired = self.wait_scheduled(&workload).await;
        debug!(workload = %workload.name, phase = %PullPhase::Scheduled, desired);

        let waited = self.wait_running(&workload, desired).await;
        if let Ok(RunningWait::AllRunning(_)) = waited {
            debug!(workload = %workload.name, phase = %PullPhase::Running, desired);
        }

        // Tear down even when the running-wait gave up, so nothing leaks.
        self.teardown(&workload).await?;
        let (running, retired_elsewhere) = match waited? {
            RunningWait::AllRunning(running) => (running, false),
            RunningWait::Vanished(running) => (running, true),
        };

        let report = PullReport {
            image: image.to_string(),
            workload: workload.name,
            desired,
            running,
            retired_elsewhere,
            elapsed: started.elapsed(),
        };
        info!(
            image = %report.image,
            workload = %report.workload,
            phase = %PullPhase::Retired,
            elapsed_secs = report.elapsed.as_secs_f64(),
            "image seeded"
        );
        Ok(report)
    }

    /// Poll until the workload reports a nonzero desired count, up to the
    /// configured number of polls. Returns the last desired count seen.
    async fn wait_scheduled(&self, workload: &PullWorkload) -> u32 {
        let ns = &self.config.namespace;
        for attempt in 0..self.config.schedule_timeout_polls {
            match self.cluster.workload_status(ns, &workload.name).await {
                Ok(status) if status.desired > 0 => {
                    info!(workload = %workload.name, desired = status.desired, "pull workload scheduled");
                    return status.desired;
                }
                Ok(_) => {
                    debug!(workload = %workload.name, attempt, "pull workload not scheduled yet");
                }
                Err(e) => {
                    warn!(workload = %workload.name, error = %e, "error checking pull workload status");
                }
            }
            tokio::time::sleep(self.config.schedule_poll_interval).await;
        }
        warn!(
            workload = %workload.name,
            polls = self.config.schedule_timeout_polls,
            "pull workload has no desired replicas after scheduling timeout, proceeding"
        );
        0
    }

    /// Poll pod phases until `desired` replicas are running, or until the
    /// workload itself is gone.
    async fn wait_running(&self, workload: &PullWorkload, desired: u32) -> Result<RunningWait> {
        if desired == 0 {
            info!(workload = %workload.name, "no replicas to wait for");
            return Ok(RunningWait::AllRunning(0));
        }
        let ns = &self.config.namespace;
        let selector = workload.pod_selector();
        let started = Instant::now();
        let mut running = 0;
        loop {
            match self.cluster.list_workload_pods(ns, &selector).await {
                Ok(phases) => {
                    running = phases.iter().filter(|p| **p == PodPhase::Running).count() as u32;
                    debug!(workload = %workload.name, running, desired, "pods running");
                    if running == desired {
                        info!(workload = %workload.name, running, "all pull pods running");
                        return Ok(RunningWait::AllRunning(running));
                    }
                }
                Err(e) => {
                    warn!(workload = %workload.name, error = %e, "error checking pull pod status");
                }
            }
            // A concurrent run pulling the same image may retire the workload
            // first. Its pods will never come back.
            match self.cluster.workload_status(ns, &workload.name).await {
                Err(e) if e.is_not_found() => {
                    warn!(
                        workload = %workload.name,
                        running,
                        desired,
                        "pull workload was removed by another run"
                    );
                    return Ok(RunningWait::Vanished(running));
                }
                Err(e) => {
                    warn!(workload = %workload.name, error = %e, "error checking pull workload status");
                }
                Ok(_) => {}
            }
            if let Some(limit) = self.config.running_timeout {
                if started.elapsed() >= limit {
                    error!(workload = %workload.name, running, desired, "timed out waiting for pull pods");
                    return Err(SeedError::RunningTimeout {
                        workload: workload.name.clone(),
                        running,
                        desired,
                    });
                }
            }
            tokio::time::sleep(self.config.running_poll_interval).await;
        }
    }

    async fn teardown(&self, workload: &PullWorkload) -> Result<()> {
        match self
            .cluster
            .delete_workload(&self.config.namespace, &workload.name)
            .await
        {
            Ok(()) => {
                info!(workload = %workload.name, "pull workload removed");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                warn!(workload = %workload.name, "pull workload already removed");
                Ok(())
            }
            Err(source) => {
                error!(
                    workload = %workload.name,
                    error = %source,
                    "failed to delete pull workload, it will keep running on seeder nodes"
                );
                Err(SeedError::Teardown {
                    workload: workload.name.clone(),
                    source,
                })
            }
        }
    }
}

mod secs_f64 {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;
    use crate::memory::MemoryCluster;

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            schedule_timeout_polls: 5,
            schedule_poll_interval: Duration::from_millis(1),
            running_poll_interval: Duration::from_millis(1),
            ..DispatchConfig::default()
        }
    }

    async fn seeded_cluster(nodes: usize, seeders: &[&str]) -> Arc<MemoryCluster> {
        let cluster = Arc::new(MemoryCluster::with_nodes(nodes));
        for name in seeders {
            labels::mark_seeder(cluster.as_ref(), name).await.unwrap();
        }
        cluster
    }

    fn images(list: &[&str]) -> ImageList {
        ImageList::try_from(list.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    fn seeders(names: &[&str]) -> SeederSet {
        names.iter().copied().collect()
    }

    #[tokio::test]
    async fn empty_seeders_fail_before_any_workload() {
        let cluster = seeded_cluster(3, &[]).await;
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let err = dispatcher
            .seed_images(&images(&["nginx:1"]), &SeederSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::NoSeedersAvailable));
        assert!(cluster.created_workloads().is_empty());
    }

    #[tokio::test]
    async fn pulls_each_image_sequentially_and_cleans_up() {
        let cluster = seeded_cluster(4, &["node-0", "node-1"]).await;
        cluster.set_schedule_delay(2);
        cluster.set_running_delay(3);
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());

        let reports = dispatcher
            .seed_images(
                &images(&["nginx:1", "redis:7", "alpine:3"]),
                &seeders(&["node-0", "node-1"]),
            )
            .await
            .unwrap();

        assert_eq!(reports.len(), 3);
        for r in &reports {
            assert_eq!(r.desired, 2);
            assert_eq!(r.running, 2);
        }
        assert_eq!(cluster.max_live_workloads(), 1);
        assert!(cluster.live_workloads().is_empty());
        let created: Vec<String> = cluster
            .created_workloads()
            .into_iter()
            .map(|w| w.image)
            .collect();
        assert_eq!(created, vec!["nginx:1", "redis:7", "alpine:3"]);
        assert_eq!(cluster.deleted_workloads().len(), 3);
    }

    #[tokio::test]
    async fn unscheduled_workload_proceeds_and_is_deleted() {
        // Seeder set is non-empty but no node carries the label any more.
        let cluster = seeded_cluster(2, &[]).await;
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let reports = dispatcher
            .seed_images(&images(&["nginx:1"]), &seeders(&["node-0"]))
            .await
            .unwrap();
        assert_eq!(reports[0].desired, 0);
        assert_eq!(reports[0].running, 0);
        assert_eq!(cluster.deleted_workloads().len(), 1);
    }

    #[tokio::test]
    async fn transient_poll_errors_are_retried() {
        let cluster = seeded_cluster(3, &["node-2"]).await;
        cluster.inject_status_errors(2);
        cluster.inject_pod_list_errors(3);
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let reports = dispatcher
            .seed_images(&images(&["nginx:1"]), &seeders(&["node-2"]))
            .await
            .unwrap();
        assert_eq!(reports[0].desired, 1);
        assert_eq!(reports[0].running, 1);
    }

    #[tokio::test]
    async fn create_failure_aborts_without_teardown() {
        let cluster = seeded_cluster(2, &["node-0"]).await;
        cluster.fail_create(true);
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let err = dispatcher
            .seed_images(&images(&["nginx:1", "redis:7"]), &seeders(&["node-0"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::WorkloadCreate { ref image, .. } if image == "nginx:1"));
        assert!(cluster.deleted_workloads().is_empty());
    }

    #[tokio::test]
    async fn existing_workload_is_adopted() {
        let cluster = seeded_cluster(2, &["node-0"]).await;
        cluster
            .create_workload("clyde", &PullWorkload::for_image("nginx:1"))
            .await
            .unwrap();
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let reports = dispatcher
            .seed_images(&images(&["nginx:1"]), &seeders(&["node-0"]))
            .await
            .unwrap();
        assert_eq!(reports[0].running, 1);
        assert!(cluster.live_workloads().is_empty());
    }

    #[tokio::test]
    async fn adopted_workload_removed_by_peer_ends_the_wait() {
        let cluster = seeded_cluster(2, &["node-0"]).await;
        cluster.set_running_delay(u32::MAX);
        let workload = PullWorkload::for_image("nginx:1");
        cluster.create_workload("clyde", &workload).await.unwrap();

        let peer = {
            let cluster = cluster.clone();
            let name = workload.name.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cluster.delete_workload("clyde", &name).await.unwrap();
            })
        };

        // No running deadline: only the vanished workload can end the wait.
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let reports = tokio::time::timeout(
            Duration::from_secs(10),
            dispatcher.seed_images(&images(&["nginx:1"]), &seeders(&["node-0"])),
        )
        .await
        .expect("running-wait did not notice the removed workload")
        .unwrap();
        peer.await.unwrap();

        assert_eq!(reports[0].desired, 1);
        assert_eq!(reports[0].running, 0);
        assert!(reports[0].retired_elsewhere);
        assert!(cluster.live_workloads().is_empty());
        // Only the peer's delete went through.
        assert_eq!(cluster.deleted_workloads(), vec![workload.name]);
    }

    #[tokio::test]
    async fn completed_pull_is_not_marked_retired_elsewhere() {
        let cluster = seeded_cluster(2, &["node-1"]).await;
        cluster.set_running_delay(2);
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let reports = dispatcher
            .seed_images(&images(&["nginx:1"]), &seeders(&["node-1"]))
            .await
            .unwrap();
        assert_eq!(reports[0].running, 1);
        assert!(!reports[0].retired_elsewhere);
    }

    #[tokio::test]
    async fn teardown_failure_is_surfaced() {
        let cluster = seeded_cluster(2, &["node-0"]).await;
        cluster.fail_delete(true);
        let dispatcher = Dispatcher::new(cluster.clone(), fast_config());
        let err = dispatcher
            .seed_images(&images(&["nginx:1", "redis:7"]), &seeders(&["node-0"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SeedError::Teardown { .. }));
        // The second image was never started.
        assert_eq!(cluster.created_workloads().len(), 1);
    }

    #[tokio::test]
    async fn running_timeout_tears_down_and_fails() {
        let cluster = seeded_cluster(2, &["node-0"]).await;
        cluster.set_running_delay(u32::MAX);
        let config = DispatchConfig {
            running_timeout: Some(Duration::from_millis(20)),
            ..fast_config()
        };
        let dispatcher = Dispatcher::new(cluster.clone(), config);
        let err = dispatcher
            .seed_images(&images(&["nginx:1"]), &seeders(&["node-0"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SeedError::RunningTimeout {
                running: 0,
                desired: 1,
                ..
            }
        ));
        assert!(cluster.live_workloads().is_empty());
    }

    #[test]
    fn report_serializes_elapsed_as_seconds() {
        let report = PullReport {
            image: "nginx:1".into(),
            workload: "pull-abc".into(),
            desired: 2,
            running: 2,
            retired_elsewhere: false,
            elapsed: Duration::from_millis(1500),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed"], 1.5);
    }
}
