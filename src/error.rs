// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for microdrop-constructor
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// Version or specifier string could not be parsed
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Index query failed or no release matched the specifier
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// Rendered output already exists and overwrite was not requested
    #[error("Output file exists {}.  Use `-f` to overwrite.", .0.display())]
    OutputExistsError(PathBuf),

    /// Template parsed but could not be rendered
    #[error("Failed to render template {}: {message}", path.display())]
    TemplateError { path: PathBuf, message: String },

    /// External tool could not be started
    #[error("Failed to launch `{command}`: {source}")]
    ToolLaunchError {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// External tool exited with a non-zero status
    #[error("`{command}` failed ({status}): {stderr}")]
    BuildCommandError {
        command: String,
        status: String,
        stderr: String,
    },

    /// Build tool finished but produced no recognizable artifact
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Final artifact copy failed
    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    CopyError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Copied artifact differs from the built one
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;
