use anyhow::Context;
use clyde_core::config::Config;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Console output goes
/// to stderr so `--json` output on stdout stays parseable. `quiet` keeps
/// read-only commands to warnings on stderr and skips the log file.
pub fn init(config: &Config, quiet: bool) -> anyhow::Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    if quiet {
        tracing_subscriber::fmt()
            .with_env_filter(filter_for(env.as_deref(), "warn"))
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
        return Ok(());
    }

    let filter = filter_for(env.as_deref(), &config.log_level);

    let console = config
        .log_to_stdout
        .then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));

    let file = match &config.log_file {
        Some(path) => {
            clyde_core::io::ensure_parent(path)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            Some(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();
    Ok(())
}

/// `RUST_LOG` when it is set and parses, `fallback` otherwise.
fn filter_for(env: Option<&str>, fallback: &str) -> EnvFilter {
    env.filter(|s| !s.trim().is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new(fallback))
}
