use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File name defaults
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "clyde.yaml";
pub const DEFAULT_TRACKER_FILE: &str = "seeder_tracker.json";
pub const DEFAULT_IMAGES_FILE: &str = "images.txt";
pub const DEFAULT_LOG_FILE: &str = "seeder.log";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(base_dir: &Path) -> PathBuf {
    base_dir.join(CONFIG_FILE)
}

/// Join `path` onto `base_dir` unless it is already absolute.
pub fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}
