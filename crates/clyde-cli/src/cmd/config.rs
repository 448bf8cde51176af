use crate::output::print_json;
use clap::Subcommand;
use clyde_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(config: &Config, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(config, json),
        ConfigSubcommand::Validate => validate(config, json),
    }
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
