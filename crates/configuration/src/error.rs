//! Errors that can be thrown when processing configuration.

use std::path::PathBuf;

use query_engine_metadata::metadata::CustomEntityError;

/// The errors that can be thrown when processing configuration.
///
/// This is effectively a copy of the `ParseError` enum used by connectors, so that
/// the configuration crate does not depend on the host surface.
#[derive(Debug, thiserror::Error)]
pub enum ParseConfigurationError {
    #[error("parse error on {file_path}:{line}:{column}: {message}")]
    ParseError {
        file_path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    #[error("unsupported configuration version {found} in {file_path}, expected {expected}")]
    UnsupportedVersion {
        file_path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    // Sometimes we need to produce an error from a path we can't report easily.
    #[error("I/O error: {0}")]
    IoErrorButStringified(String),
}

/// Errors that can occur when turning a parsed configuration into the runtime one.
#[derive(Debug, thiserror::Error)]
pub enum MakeRuntimeConfigurationError {
    #[error("invalid configuration environment: {message}")]
    MissingEnvironmentVariable {
        file_path: PathBuf,
        message: String,
    },
    #[error("{file_path}: {source}")]
    CustomEntities {
        file_path: PathBuf,
        source: CustomEntityError,
    },
    #[error("I/O error reading {file_path}: {source}")]
    IoError {
        file_path: PathBuf,
        source: std::io::Error,
    },
}

/// The errors that can be thrown when writing configuration.
#[derive(Debug, thiserror::Error)]
pub enum WriteParsedConfigurationError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
