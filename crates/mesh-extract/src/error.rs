//! Error types for extraction and persistence.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors that can occur during extraction or when reading/writing its inputs and outputs.
///
/// Recoverable conditions inside the pipeline (empty selections, unsupported option
/// combinations, missing root bones) are reported as [`crate::Notice`]s instead.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Error reading from a file.
    #[error("failed to read {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error writing to a file.
    #[error("failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error parsing a scene, selection, config or asset file.
    #[error("failed to parse {path}: {details}")]
    ParseError { path: PathBuf, details: String },

    /// Unsupported output format.
    #[error("unsupported output format: {extension:?}")]
    UnsupportedFormat { extension: Option<String> },

    /// A selected triangle references an object that is not part of the scene.
    #[error("selection references unknown object #{object}")]
    UnknownObject { object: u32 },

    /// A scene object references a mesh that is not part of the scene.
    #[error("object '{object}' references unknown mesh #{mesh}")]
    UnknownMesh { object: String, mesh: u32 },

    /// Invalid configuration text.
    #[error("invalid configuration: {details}")]
    Config { details: String },
}
