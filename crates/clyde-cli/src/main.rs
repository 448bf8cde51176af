mod cmd;
mod logging;
mod output;
mod root;
mod settings;

use clap::{Parser, Subcommand};
use cmd::config::ConfigSubcommand;
use settings::Overrides;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "clyde-seeder",
    about = "Label seeder nodes and pre-pull container images onto them",
    version,
    propagate_version = true
)]
struct Cli {
    /// Base directory for relative paths (default: nearest dir with clyde.yaml, else cwd)
    #[arg(long, global = true, env = "CLYDE_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Config file (default: <base-dir>/clyde.yaml)
    #[arg(long, global = true, env = "CLYDE_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ensure the namespace, select seeders, and seed every image (default)
    Run,

    /// Select and label seeder nodes
    Select {
        /// Percentage of nodes to use as seeders (overrides config)
        #[arg(long)]
        percentage: Option<u32>,
    },

    /// Pre-pull images onto the persisted seeder nodes
    Seed {
        /// Image list file (overrides config)
        #[arg(long)]
        images: Option<PathBuf>,
    },

    /// Show the persisted seeder set
    Status,

    /// Show the parsed image list
    Images {
        /// Image list file (overrides config)
        #[arg(long)]
        images: Option<PathBuf>,
    },

    /// Inspect and validate configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let base_dir = root::resolve_base_dir(cli.base_dir.as_deref());
    let config = match settings::load(&base_dir, cli.config.as_deref(), &cli.overrides) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    // Read-only commands log to stderr only, without touching the log file.
    let command = cli.command.unwrap_or(Commands::Run);
    let quiet = matches!(
        command,
        Commands::Status | Commands::Images { .. } | Commands::Config { .. }
    );
    if let Err(e) = logging::init(&config, quiet) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
    tracing::debug!(base_dir = %base_dir.display(), config = ?config, "configuration loaded");

    let result = match command {
        Commands::Run => cmd::run::run(&config, cli.json),
        Commands::Select { percentage } => cmd::select::run(&config, percentage, cli.json),
        Commands::Seed { images } => cmd::seed::run(&config, images.as_deref(), cli.json),
        Commands::Status => cmd::status::run(&config, cli.json),
        Commands::Images { images } => cmd::images::run(&config, images.as_deref(), cli.json),
        Commands::Config { subcommand } => cmd::config::run(&config, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
