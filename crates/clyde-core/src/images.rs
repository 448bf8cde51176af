use crate::error::{Result, SeedError};
use std::path::Path;
use tracing::{debug, info};

/// Comment marker for image list files.
const COMMENT_PREFIX: char = '#';

/// Ordered, non-empty list of image references to pre-pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageList(Vec<String>);

impl ImageList {
    /// Parse one reference per line, skipping blank lines and `#` comments.
    /// Returns `None` when nothing remains.
    pub fn parse(text: &str) -> Option<Self> {
        let images: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with(COMMENT_PREFIX))
            .map(str::to_string)
            .collect();
        if images.is_empty() {
            None
        } else {
            Some(Self(images))
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading image list");
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SeedError::ImageFileNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let images = Self::parse(&text).ok_or_else(|| SeedError::NoImages {
            path: path.to_path_buf(),
        })?;
        info!(path = %path.display(), count = images.len(), "loaded image list");
        Ok(images)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl TryFrom<Vec<String>> for ImageList {
    type Error = SeedError;

    fn try_from(images: Vec<String>) -> Result<Self> {
        Self::parse(&images.join("\n")).ok_or(SeedError::NoImages {
            path: "<inline>".into(),
        })
    }
}
