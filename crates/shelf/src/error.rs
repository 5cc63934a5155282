//! CLI error types.

use shelf_book::BuildError;
use shelf_config::ConfigError;
use shelf_export::ExportError;
use shelf_server::ServerError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Build(#[from] BuildError),

    #[error("{0}")]
    Export(#[from] ExportError),

    #[error("{0}")]
    Server(#[from] ServerError),

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("{0}")]
    Validation(String),
}
