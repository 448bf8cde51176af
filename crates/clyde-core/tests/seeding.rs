use clyde_core::dispatcher::{DispatchConfig, Dispatcher};
use clyde_core::images::ImageList;
use clyde_core::memory::MemoryCluster;
use clyde_core::run::run_once;
use clyde_core::selector::Selector;
use clyde_core::store::SeederStore;
use clyde_core::types::SeederSet;
use clyde_core::SeedError;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fast_dispatch() -> DispatchConfig {
    DispatchConfig {
        namespace: "clyde".to_string(),
        schedule_timeout_polls: 10,
        schedule_poll_interval: Duration::from_millis(1),
        running_poll_interval: Duration::from_millis(1),
        running_timeout: None,
    }
}

// ---------------------------------------------------------------------------
// End to end: select, persist, seed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ten_nodes_forty_percent_end_to_end() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("seeder_tracker.json");
    let cluster = Arc::new(MemoryCluster::with_nodes(10));
    cluster.set_schedule_delay(1);
    cluster.set_running_delay(2);

    let selector = Selector::new(cluster.clone(), SeederStore::new(&snapshot));
    let seeders = selector.select_seeders(40).await.unwrap();
    assert_eq!(seeders.len(), 4);
    assert_eq!(cluster.labeled_nodes().len(), 4);

    let persisted = SeederStore::new(&snapshot).load().await.unwrap();
    assert_eq!(persisted, seeders);

    let images = ImageList::parse("repo/image:tag\n").unwrap();
    let dispatcher = Dispatcher::new(cluster.clone(), fast_dispatch());
    let reports = dispatcher.seed_images(&images, &seeders).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].image, "repo/image:tag");
    assert_eq!(reports[0].desired, 4);
    assert_eq!(reports[0].running, 4);
    assert_eq!(cluster.created_workloads().len(), 1);
    assert_eq!(cluster.deleted_workloads(), vec![reports[0].workload.clone()]);
    assert!(cluster.live_workloads().is_empty());
}

#[tokio::test]
async fn full_run_bootstraps_namespace_then_selects_and_seeds() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("seeder_tracker.json");
    let cluster = Arc::new(MemoryCluster::with_nodes(10));
    cluster.set_running_delay(1);
    let images = ImageList::parse("nginx:1\nredis:7\n").unwrap();
    let dispatch = DispatchConfig {
        namespace: "image-seeding".to_string(),
        ..fast_dispatch()
    };

    let report = run_once(
        cluster.clone(),
        SeederStore::new(&snapshot),
        40,
        dispatch.clone(),
        &images,
    )
    .await
    .unwrap();

    assert_eq!(cluster.namespaces(), vec!["image-seeding".to_string()]);
    assert_eq!(report.selection.seeders.len(), 4);
    assert_eq!(report.pulls.len(), 2);
    assert!(report.pulls.iter().all(|p| p.desired == 4 && p.running == 4));
    assert!(cluster.live_workloads().is_empty());

    // A second pass reuses the namespace and the persisted seeders.
    let again = run_once(cluster.clone(), SeederStore::new(&snapshot), 40, dispatch, &images)
        .await
        .unwrap();
    assert_eq!(cluster.namespaces(), vec!["image-seeding".to_string()]);
    assert_eq!(again.selection.seeders, report.selection.seeders);
    assert!(again.selection.labeled.is_empty());
}

#[tokio::test]
async fn full_run_on_empty_cluster_fails_without_workloads() {
    let dir = TempDir::new().unwrap();
    let cluster = Arc::new(MemoryCluster::new());
    let images = ImageList::parse("nginx:1\n").unwrap();
    let err = run_once(
        cluster.clone(),
        SeederStore::new(dir.path().join("seeder_tracker.json")),
        40,
        fast_dispatch(),
        &images,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SeedError::NoSeedersAvailable));
    assert_eq!(cluster.namespaces(), vec!["clyde".to_string()]);
    assert!(cluster.created_workloads().is_empty());
}

#[tokio::test]
async fn empty_cluster_yields_no_seeders_and_dispatch_refuses() {
    let dir = TempDir::new().unwrap();
    let cluster = Arc::new(MemoryCluster::new());
    let selector = Selector::new(
        cluster.clone(),
        SeederStore::new(dir.path().join("seeders.json")),
    );
    let seeders = selector.select_seeders(40).await.unwrap();
    assert!(seeders.is_empty());

    let dispatcher = Dispatcher::new(cluster.clone(), fast_dispatch());
    let err = dispatcher
        .seed_images(&ImageList::parse("nginx:1").unwrap(), &seeders)
        .await
        .unwrap_err();
    assert!(matches!(err, SeedError::NoSeedersAvailable));
    assert!(cluster.created_workloads().is_empty());
}

#[tokio::test]
async fn relabeled_cluster_keeps_survivors() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("seeders.json");
    let cluster = Arc::new(MemoryCluster::with_nodes(10));
    let selector = Selector::new(cluster.clone(), SeederStore::new(&snapshot));

    let first = selector.select_seeders(30).await.unwrap();
    let mut names = first.iter().map(str::to_string);
    let removed = names.next().unwrap();
    let unlabeled = names.next().unwrap();
    let survivor = names.next().unwrap();
    cluster.remove_node(&removed);
    cluster.remove_label(&unlabeled, clyde_core::labels::SEEDER_LABEL);

    let second = selector.select_seeders(30).await.unwrap();
    // 9 nodes at 30% -> 2 seeders.
    assert_eq!(second.len(), 2);
    assert!(second.contains(&survivor));
    assert!(!second.contains(&removed));
    for name in second.iter() {
        assert!(cluster.node(name).unwrap().is_seeder());
    }
}

// ---------------------------------------------------------------------------
// Concurrency: the store lock serializes whole selection runs
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_selections_do_not_overshoot_quota() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("seeders.json");
    let cluster = Arc::new(MemoryCluster::with_nodes(10));

    let a = Selector::new(cluster.clone(), SeederStore::new(&snapshot));
    let b = Selector::new(cluster.clone(), SeederStore::new(&snapshot));

    let (ra, rb) = tokio::join!(a.select(40), b.select(40));
    let (ra, rb) = (ra.unwrap(), rb.unwrap());

    assert_eq!(ra.labeled.len() + rb.labeled.len(), 4);
    assert_eq!(cluster.labeled_nodes().len(), 4);
    assert_eq!(ra.seeders, rb.seeders);

    let persisted: SeederSet = SeederStore::new(&snapshot).load().await.unwrap();
    assert_eq!(persisted, ra.seeders);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_selections_from_spawned_tasks() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("seeders.json");
    let cluster = Arc::new(MemoryCluster::with_nodes(20));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let selector = Selector::new(cluster.clone(), SeederStore::new(&snapshot));
        handles.push(tokio::spawn(async move { selector.select(25).await }));
    }
    let mut labeled = 0;
    for h in handles {
        labeled += h.await.unwrap().unwrap().labeled.len();
    }
    assert_eq!(labeled, 5);
    assert_eq!(cluster.labeled_nodes().len(), 5);
}
