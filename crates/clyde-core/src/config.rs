use crate::dispatcher::DispatchConfig;
use crate::error::Result;
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub seeder_tracker_file: PathBuf,
    pub images_to_seed: PathBuf,
    pub namespace: String,
    pub seeder_percentage: u32,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
    pub log_to_stdout: bool,
    /// Number of scheduling polls before giving up on a nonzero desired count.
    pub schedule_timeout_polls: u32,
    pub schedule_poll_interval_secs: u64,
    pub running_poll_interval_secs: u64,
    /// Upper bound on the running-wait. `None` waits forever.
    pub running_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            seeder_tracker_file: PathBuf::from(paths::DEFAULT_TRACKER_FILE),
            images_to_seed: PathBuf::from(paths::DEFAULT_IMAGES_FILE),
            namespace: "clyde".to_string(),
            seeder_percentage: 40,
            log_file: Some(PathBuf::from(paths::DEFAULT_LOG_FILE)),
            log_level: "info".to_string(),
            log_to_stdout: true,
            schedule_timeout_polls: 30,
            schedule_poll_interval_secs: 1,
            running_poll_interval_secs: 3,
            running_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load `path`, or the defaults if it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Make every relative path absolute against `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        self.seeder_tracker_file = paths::resolve(base_dir, &self.seeder_tracker_file);
        self.images_to_seed = paths::resolve(base_dir, &self.images_to_seed);
        if let Some(log_file) = &self.log_file {
            self.log_file = Some(paths::resolve(base_dir, log_file));
        }
    }

    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            namespace: self.namespace.clone(),
            schedule_timeout_polls: self.schedule_timeout_polls,
            schedule_poll_interval: Duration::from_secs(self.schedule_poll_interval_secs),
            running_poll_interval: Duration::from_secs(self.running_poll_interval_secs),
            running_timeout: self.running_timeout_secs.map(Duration::from_secs),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.seeder_percentage > 100 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "seeder_percentage is {} (must be between 0 and 100)",
                    self.seeder_percentage
                ),
            });
        }

        if !is_dns_label(&self.namespace) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "namespace '{}' is not a valid DNS-1123 label",
                    self.namespace
                ),
            });
        }

        if self.schedule_timeout_polls == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "schedule_timeout_polls is 0: workloads are never waited on to schedule"
                    .to_string(),
            });
        }

        if self.schedule_poll_interval_secs == 0 || self.running_poll_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "a poll interval of 0s polls the control plane in a tight loop"
                    .to_string(),
            });
        }

        if self.running_timeout_secs == Some(0) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "running_timeout_secs is 0: every pull times out immediately".to_string(),
            });
        }

        warnings
    }
}

static DNS_LABEL_RE: OnceLock<Regex> = OnceLock::new();

fn dns_label_re() -> &'static Regex {
    DNS_LABEL_RE.get_or_init(|| Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").unwrap())
}

fn is_dns_label(s: &str) -> bool {
    s.len() <= 63 && dns_label_re().is_match(s)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
