use crate::output::print_json;
use anyhow::Context;
use clyde_core::config::Config;
use clyde_core::workload::workload_name;
use std::path::Path;

pub fn run(config: &Config, images: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let path = images.unwrap_or(&config.images_to_seed);
    let images = clyde_core::images::ImageList::read(path).context("failed to read image list")?;

    if json {
        let entries: Vec<serde_json::Value> = images
            .iter()
            .map(|image| {
                serde_json::json!({
                    "image": image,
                    "workload": workload_name(image),
                })
            })
            .collect();
        return print_json(&entries);
    }

    let rows: Vec<Vec<String>> = images
        .iter()
        .map(|image| vec![image.to_string(), workload_name(image)])
        .collect();
    crate::output::print_table(&["IMAGE", "WORKLOAD"], &rows);
    Ok(())
}
