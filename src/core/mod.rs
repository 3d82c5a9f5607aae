use thiserror::Error;

use crate::{command::CliError, config_store::ConfigError, xref::XrefError};

/// Error types for the cmdopt application layer.
///
/// Each module reports its own error enum; this one wraps them so callers
/// driving the whole startup sequence can use a single `?`.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration store, loader or watcher error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Command tree cross-reference error
    #[error("xref error: {0}")]
    Xref(#[from] XrefError),

    /// Command lookup, flag validation or action error
    #[error("{0}")]
    Cli(#[from] CliError),

    /// Standard I/O operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for cmdopt operations.
///
/// This type alias simplifies error handling by defaulting the error type
/// to [`Error`] for all application level operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the error is a duplicate alias reported by an xref build.
    pub fn is_duplicate_alias(&self) -> bool {
        matches!(self, Self::Xref(XrefError::DuplicateAlias { .. }))
    }
}
