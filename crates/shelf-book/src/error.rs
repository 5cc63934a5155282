//! Error types for templates and book builds.

use std::path::PathBuf;

use shelf_site::BarrierTimeout;
use shelf_source::FetchError;

/// Template loading or rendering failed.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// A template every site needs is absent.
    #[error("required template '{0}' is missing")]
    Missing(String),
    /// Template source does not parse.
    #[error("template '{name}' is invalid: {source}")]
    Syntax {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("failed to render '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("failed to read template {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Book build or site assembly failed.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Fetching the page tree failed (root page or fail-fast).
    #[error("book '{book}': {source}")]
    Fetch {
        book: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Builder task died without reporting a result.
    #[error("book '{0}' build task panicked")]
    Panicked(String),
    /// Concurrency limiter closed before the book got a slot.
    #[error("book '{0}' build was cancelled")]
    Cancelled(String),
    #[error(transparent)]
    Timeout(#[from] BarrierTimeout),
}

impl BuildError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
