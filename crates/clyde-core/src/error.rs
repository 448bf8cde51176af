use crate::cluster::ClusterError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("no seeders available for seeding")]
    NoSeedersAvailable,

    #[error("no valid images found in {}", path.display())]
    NoImages { path: PathBuf },

    #[error("image file not found: {}", path.display())]
    ImageFileNotFound { path: PathBuf },

    #[error("invalid seeder percentage {0}: must be between 0 and 100")]
    InvalidPercentage(u32),

    #[error("failed to create pull workload {workload} for image {image}: {source}")]
    WorkloadCreate {
        workload: String,
        image: String,
        #[source]
        source: ClusterError,
    },

    #[error("failed to delete pull workload {workload} (it may still hold seeder capacity): {source}")]
    Teardown {
        workload: String,
        #[source]
        source: ClusterError,
    },

    #[error("pull workload {workload} did not reach running state: {running}/{desired} replicas running")]
    RunningTimeout {
        workload: String,
        running: u32,
        desired: u32,
    },

    #[error("failed to acquire seeder store lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SeedError>;
