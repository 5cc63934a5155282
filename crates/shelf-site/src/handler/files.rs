use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use super::{ContentHandler, normalize_uri};
use crate::Producer;

/// URIs mapped to individual files on disk, registered as they appear.
///
/// Book builders add downloaded images and covers here while they run, so the
/// set is empty (or partial) until the build finishes.
#[derive(Default)]
pub struct FilesHandler {
    files: RwLock<BTreeMap<String, PathBuf>>,
}

impl FilesHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `uri` to `path`, replacing any earlier mapping.
    pub fn add_file(&self, uri: &str, path: PathBuf) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(normalize_uri(uri), path);
    }
}

impl ContentHandler for FilesHandler {
    fn resolve(&self, uri: &str) -> Option<Producer> {
        let path = self
            .files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()?;
        Some(Producer::from_file(path))
    }

    fn uris(&self) -> Vec<String> {
        self.files
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_before_registration() {
        let handler = FilesHandler::new();
        assert!(handler.uris().is_empty());
        assert!(handler.resolve("/go/img/a.png").is_none());
    }

    #[test]
    fn test_added_file_resolves() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.png");
        std::fs::write(&path, b"png").unwrap();

        let handler = FilesHandler::new();
        handler.add_file("go/img/a.png", path);

        assert_eq!(handler.uris(), vec!["/go/img/a.png"]);
        let producer = handler.resolve("/go/img/a.png").unwrap();
        assert_eq!(producer.content_type(), "image/png");
        assert_eq!(producer.to_bytes().unwrap(), b"png");
    }

    #[test]
    fn test_deleted_file_fails_only_that_item() {
        let tmp = TempDir::new().unwrap();
        let kept = tmp.path().join("kept.png");
        let gone = tmp.path().join("gone.png");
        std::fs::write(&kept, b"k").unwrap();
        std::fs::write(&gone, b"g").unwrap();

        let handler = FilesHandler::new();
        handler.add_file("/kept.png", kept);
        handler.add_file("/gone.png", gone.clone());
        std::fs::remove_file(gone).unwrap();

        assert!(handler.resolve("/gone.png").unwrap().to_bytes().is_err());
        assert_eq!(handler.resolve("/kept.png").unwrap().to_bytes().unwrap(), b"k");
    }
}
