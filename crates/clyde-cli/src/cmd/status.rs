use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{DateTime, Utc};
use clyde_core::config::Config;

pub fn run(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = super::store(config);
    let seeders = {
        let guard = store.lock_blocking().context("failed to lock seeder store")?;
        guard.load()
    };
    let updated_at: Option<DateTime<Utc>> = std::fs::metadata(store.path())
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::from);

    if json {
        let value = serde_json::json!({
            "snapshot": store.path().display().to_string(),
            "updated_at": updated_at,
            "seeders": seeders,
        });
        return print_json(&value);
    }

    println!("Snapshot: {}", store.path().display());
    if let Some(t) = updated_at {
        println!("Updated:  {}", t.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if seeders.is_empty() {
        println!("No seeders recorded.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = seeders.iter().map(|n| vec![n.to_string()]).collect();
    print_table(&["NODE"], &rows);
    Ok(())
}
