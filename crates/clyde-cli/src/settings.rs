use anyhow::Context;
use clap::Args;
use clyde_core::config::Config;
use clyde_core::paths;
use std::path::{Path, PathBuf};

/// Command-line overrides for values from the config file.
#[derive(Args, Debug, Default)]
pub struct Overrides {
    /// Kubernetes namespace for pull workloads
    #[arg(long, global = true, env = "CLYDE_NAMESPACE")]
    pub namespace: Option<String>,

    /// Percentage of nodes to use as seeders (0-100)
    #[arg(long, global = true, env = "CLYDE_SEEDER_PERCENTAGE")]
    pub seeder_percentage: Option<u32>,

    /// Seeder snapshot file (relative to base dir)
    #[arg(long, global = true)]
    pub seeder_tracker_file: Option<PathBuf>,

    /// Image list file (relative to base dir)
    #[arg(long, global = true)]
    pub images_to_seed: Option<PathBuf>,

    /// Log file (relative to base dir)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log level
    #[arg(
        long,
        global = true,
        value_parser = ["trace", "debug", "info", "warn", "error"]
    )]
    pub log_level: Option<String>,

    /// Disable console logging
    #[arg(long, global = true)]
    pub no_stdout: bool,
}

impl Overrides {
    pub fn apply(&self, cfg: &mut Config) {
        if let Some(ns) = &self.namespace {
            cfg.namespace = ns.clone();
        }
        if let Some(p) = self.seeder_percentage {
            cfg.seeder_percentage = p;
        }
        if let Some(p) = &self.seeder_tracker_file {
            cfg.seeder_tracker_file = p.clone();
        }
        if let Some(p) = &self.images_to_seed {
            cfg.images_to_seed = p.clone();
        }
        if let Some(p) = &self.log_file {
            cfg.log_file = Some(p.clone());
        }
        if let Some(level) = &self.log_level {
            cfg.log_level = level.clone();
        }
        if self.no_stdout {
            cfg.log_to_stdout = false;
        }
    }
}

/// Load the effective configuration: file, then overrides, then path resolution.
pub fn load(base_dir: &Path, explicit: Option<&Path>, overrides: &Overrides) -> anyhow::Result<Config> {
    let path = match explicit {
        Some(p) => {
            let p = paths::resolve(base_dir, p);
            if !p.is_file() {
                anyhow::bail!("config file not found: {}", p.display());
            }
            p
        }
        None => paths::config_path(base_dir),
    };
    let mut cfg = Config::load(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    overrides.apply(&mut cfg);
    cfg.resolve_paths(base_dir);
    Ok(cfg)
}
