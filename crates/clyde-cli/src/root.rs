use clyde_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the base directory relative paths are anchored to.
///
/// Priority:
/// 1. `--base-dir` flag / `CLYDE_BASE_DIR` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `clyde.yaml`
/// 3. Fall back to `cwd`
pub fn resolve_base_dir(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if let Some(p) = explicit {
        return if p.is_absolute() {
            p.to_path_buf()
        } else {
            cwd.join(p)
        };
    }

    let mut dir = cwd.clone();
    loop {
        if paths::config_path(&dir).is_file() {
            return dir;
        }
        match dir.parent() {
            Some(p) => dir = p.to_path_buf(),
            None => break,
        }
    }

    cwd
}
