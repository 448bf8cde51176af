use crate::output::print_json;
use anyhow::Context;
use clyde_core::config::Config;
use clyde_core::images::ImageList;
use clyde_core::run::run_once;

/// Full seeding pass: namespace, selection, then image pre-pull.
pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    tracing::info!("starting clyde seeder");
    let images = ImageList::read(&config.images_to_seed).context("failed to read image list")?;

    let rt = super::runtime()?;
    let report = rt.block_on(async {
        let cluster = super::connect().await?;
        run_once(
            cluster,
            super::store(config),
            config.seeder_percentage,
            config.dispatch(),
            &images,
        )
        .await
        .context("seeding run failed")
    })?;
    tracing::info!("clyde seeder completed");

    if json {
        return print_json(&report);
    }
    super::select::print_selection(&report.selection, false)?;
    println!();
    super::seed::print_reports(&report.pulls, false)
}
