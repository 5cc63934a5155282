//! Content producers.
//!
//! A [`Producer`] is what a handler hands back for a URI it owns: a content
//! type plus a function that writes the body. Producing is deferred so the
//! HTTP front end can stream into a response buffer and exporters can stream
//! straight into a file or zip entry.

use std::fmt;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crate::mime::content_type_for;

/// Error producing content for a URI.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// Backing file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Sink rejected the bytes.
    #[error("write failed: {0}")]
    Write(#[from] io::Error),
    /// Template or page rendering failed.
    #[error("render failed: {0}")]
    Render(String),
}

type WriteFn = dyn Fn(&mut dyn Write) -> Result<(), ContentError> + Send + Sync;

/// Deferred content for one URI.
#[derive(Clone)]
pub struct Producer {
    content_type: String,
    write: Arc<WriteFn>,
}

impl Producer {
    pub fn new<F>(content_type: impl Into<String>, write: F) -> Self
    where
        F: Fn(&mut dyn Write) -> Result<(), ContentError> + Send + Sync + 'static,
    {
        Self {
            content_type: content_type.into(),
            write: Arc::new(write),
        }
    }

    /// Producer for bytes already in memory.
    pub fn from_bytes(content_type: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into();
        Self::new(content_type, move |w| {
            w.write_all(&bytes)?;
            Ok(())
        })
    }

    /// Producer streaming a file, typed by its extension.
    pub fn from_file(path: PathBuf) -> Self {
        let content_type = content_type_for(&path.to_string_lossy());
        Self::new(content_type, move |w| {
            let mut file = File::open(&path).map_err(|source| ContentError::File {
                path: path.clone(),
                source,
            })?;
            io::copy(&mut file, w).map_err(|source| ContentError::File {
                path: path.clone(),
                source,
            })?;
            Ok(())
        })
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Stream the content into `w`.
    pub fn write_to(&self, w: &mut dyn Write) -> Result<(), ContentError> {
        (self.write)(w)
    }

    /// Produce the whole body in memory.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ContentError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_bytes() {
        let producer = Producer::from_bytes("text/plain", b"hello".to_vec());
        assert_eq!(producer.content_type(), "text/plain");
        assert_eq!(producer.to_bytes().unwrap(), b"hello");
    }

    #[test]
    fn test_from_file_streams_and_types() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.css");
        std::fs::write(&path, "body{}").unwrap();

        let producer = Producer::from_file(path);
        assert_eq!(producer.content_type(), "text/css; charset=utf-8");
        assert_eq!(producer.to_bytes().unwrap(), b"body{}");
    }

    #[test]
    fn test_from_file_missing_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let producer = Producer::from_file(tmp.path().join("gone.png"));

        let err = producer.to_bytes().unwrap_err();
        assert!(matches!(err, ContentError::File { .. }));
        assert!(err.to_string().contains("gone.png"));
    }
}
