use crate::output::{print_json, print_table};
use anyhow::Context;
use clyde_core::config::Config;
use clyde_core::dispatcher::{ensure_seeders, Dispatcher, PullReport};
use clyde_core::images::ImageList;
use std::path::Path;

pub fn run(config: &Config, images: Option<&Path>, json: bool) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    let path = images.unwrap_or(&config.images_to_seed);
    tracing::info!(images = %path.display(), "starting node seeding");
    let images = ImageList::read(path).context("failed to read image list")?;

    let rt = super::runtime()?;
    let reports = rt.block_on(async {
        let seeders = super::store(config)
            .load()
            .await
            .context("failed to load seeders")?;
        ensure_seeders(&seeders)?;

        let cluster = super::connect().await?;
        let dispatcher = Dispatcher::new(cluster, config.dispatch());
        dispatcher
            .seed_images(&images, &seeders)
            .await
            .context("node seeding failed")
    })?;

    print_reports(&reports, json)
}

pub(crate) fn print_reports(reports: &[PullReport], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&reports);
    }
    let rows: Vec<Vec<String>> = reports
        .iter()
        .map(|r| {
            vec![
                r.image.clone(),
                r.workload.clone(),
                if r.retired_elsewhere {
                    format!("{}/{} (removed by another run)", r.running, r.desired)
                } else {
                    format!("{}/{}", r.running, r.desired)
                },
                format!("{:.1}s", r.elapsed.as_secs_f64()),
            ]
        })
        .collect();
    print_table(&["IMAGE", "WORKLOAD", "RUNNING", "ELAPSED"], &rows);
    Ok(())
}
