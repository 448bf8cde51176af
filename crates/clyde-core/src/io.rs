use crate::error::Result;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
///
/// The tempfile is flushed to disk before it is renamed over `path`, so a
/// reader sees either the previous content or the new content, never a mix.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create the parent directory of `path` if it has one, idempotent.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seeders.json");
        atomic_write(&path, b"[\"node-a\"]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[\"node-a\"]");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/seeders.json");
        atomic_write(&path, b"[]").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_replaces_and_leaves_no_tempfiles() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seeders.json");
        atomic_write(&path, b"[\"old\"]").unwrap();
        atomic_write(&path, b"[\"new\"]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[\"new\"]");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn ensure_parent_handles_bare_file_name() {
        ensure_parent(Path::new("seeders.json")).unwrap();
    }
}
