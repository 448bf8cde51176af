use crate::output::{print_json, print_table};
use anyhow::Context;
use clyde_core::config::Config;
use clyde_core::selector::{Selection, Selector};
use clyde_core::SeedError;

pub fn run(config: &Config, percentage: Option<u32>, json: bool) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    // The configured value is already range-checked by ensure_valid.
    if let Some(p) = percentage.filter(|p| *p > 100) {
        return Err(SeedError::InvalidPercentage(p).into());
    }
    let percentage = percentage.unwrap_or(config.seeder_percentage);

    let rt = super::runtime()?;
    let selection = rt.block_on(async {
        let cluster = super::connect().await?;
        let selector = Selector::new(cluster, super::store(config));
        selector
            .select(percentage)
            .await
            .context("seeder selection failed")
    })?;

    print_selection(&selection, json)
}

pub(crate) fn print_selection(selection: &Selection, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(selection);
    }

    println!(
        "Seeders: {} (target {}, {} nodes in cluster)",
        selection.seeders.len(),
        selection.target,
        selection.node_count
    );
    let rows: Vec<Vec<String>> = selection
        .seeders
        .iter()
        .map(|name| {
            let status = if selection.labeled.iter().any(|l| l == name) {
                "new"
            } else {
                "kept"
            };
            vec![name.to_string(), status.to_string()]
        })
        .collect();
    if !rows.is_empty() {
        print_table(&["NODE", "STATUS"], &rows);
    }
    if !selection.dropped.is_empty() {
        println!("Dropped stale seeders: {}", selection.dropped.join(", "));
    }
    if !selection.failed.is_empty() {
        println!("Failed to label: {}", selection.failed.join(", "));
    }
    Ok(())
}
