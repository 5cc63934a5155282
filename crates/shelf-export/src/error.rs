//! Export error type.

use std::path::PathBuf;

use shelf_site::{BarrierTimeout, ContentError};

/// Export failed, as a whole or for a single URI.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// Background builds did not finish in time.
    #[error(transparent)]
    NotReady(#[from] BarrierTimeout),

    /// A listed URI no longer resolves.
    #[error("no handler for {0}")]
    Unresolved(String),

    /// URI cannot be mapped to a relative path.
    #[error("refusing to export {0}: not a plain relative path")]
    InvalidUri(String),

    #[error("failed to produce {uri}: {source}")]
    Content {
        uri: String,
        #[source]
        source: ContentError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Writer task died.
    #[error("export task failed: {0}")]
    Task(String),

    #[error("upload failed: {0}")]
    Http(#[from] ureq::Error),

    /// Upload endpoint answered with an error status.
    #[error("upload rejected ({status}): {body}")]
    Upload { status: u16, body: String },
}

impl ExportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
