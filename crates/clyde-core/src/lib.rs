pub mod cluster;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod images;
pub mod io;
pub mod kube_cluster;
pub mod labels;
pub mod memory;
pub mod paths;
pub mod run;
pub mod selector;
pub mod store;
pub mod types;
pub mod workload;

pub use error::{Result, SeedError};
