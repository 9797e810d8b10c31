//! # Content Resolution Module
//!
//! Astrae l'accesso ai contenuti gestiti dal sistema operativo.
//!
//! ## Responsabilità:
//! - `ContentLocator`: locator opaco (content URI, identificatore Photos, `file://`, path)
//! - `ContentResolver`: apertura in sola lettura, display name e MIME type di un locator
//! - `FileSystemResolver`: implementazione per `file://` e path locali

use crate::file_manager::FileManager;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Opaque OS locator for a media item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentLocator(String);

impl ContentLocator {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn from_path(path: &Path) -> Self {
        Self(format!("file://{}", path.display()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Local path for `file://` locators and bare paths
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if let Some(rest) = self.0.strip_prefix("file://") {
            return Some(PathBuf::from(rest));
        }
        if self.0.contains("://") {
            return None;
        }
        Some(PathBuf::from(&self.0))
    }
}

impl fmt::Display for ContentLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentLocator {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Read-only access to OS-managed content
pub trait ContentResolver: Send + Sync {
    fn open(&self, locator: &ContentLocator) -> io::Result<Box<dyn Read + Send>>;

    fn display_name(&self, locator: &ContentLocator) -> Option<String>;

    fn mime_type(&self, locator: &ContentLocator) -> Option<String>;
}

/// Resolver for locators that point at the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSystemResolver;

impl FileSystemResolver {
    fn path_of(locator: &ContentLocator) -> io::Result<PathBuf> {
        locator.to_file_path().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::Unsupported,
                format!("not a filesystem locator: {}", locator),
            )
        })
    }
}

impl ContentResolver for FileSystemResolver {
    fn open(&self, locator: &ContentLocator) -> io::Result<Box<dyn Read + Send>> {
        let path = Self::path_of(locator)?;
        let file = File::open(path)?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn display_name(&self, locator: &ContentLocator) -> Option<String> {
        let path = locator.to_file_path()?;
        path.file_name().map(|n| n.to_string_lossy().into_owned())
    }

    fn mime_type(&self, locator: &ContentLocator) -> Option<String> {
        let path = locator.to_file_path()?;
        FileManager::mime_for_path(&path).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_locator_paths() {
        assert_eq!(
            ContentLocator::new("file:///tmp/a.jpg").to_file_path(),
            Some(PathBuf::from("/tmp/a.jpg"))
        );
        assert_eq!(ContentLocator::new("/tmp/b.png").to_file_path(), Some(PathBuf::from("/tmp/b.png")));
        assert_eq!(ContentLocator::new("content://media/external/images/1").to_file_path(), None);
        assert_eq!(ContentLocator::from_path(Path::new("/x/y.gif")).as_str(), "file:///x/y.gif");
    }

    #[test]
    fn test_filesystem_resolver() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"frames").unwrap();
        let locator = ContentLocator::from_path(&path);

        let resolver = FileSystemResolver;
        let mut content = Vec::new();
        resolver.open(&locator).unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"frames");
        assert_eq!(resolver.display_name(&locator).as_deref(), Some("clip.mp4"));
        assert_eq!(resolver.mime_type(&locator).as_deref(), Some("video/mp4"));

        let remote = ContentLocator::new("content://media/1");
        assert!(resolver.open(&remote).is_err());
        assert!(resolver.display_name(&remote).is_none());
    }
}
