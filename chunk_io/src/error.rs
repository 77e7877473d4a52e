//! Error types for chunk_io.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum ChunkIoError {
    /// A cache key was written twice. The cache is write-once: the first
    /// entry's bytes are left untouched and the run must stop.
    #[error("duplicate cache key: entry already exists at {path:?}")]
    DuplicateKey {
        /// Path of the existing entry.
        path: PathBuf,
    },

    /// An on-disk entry does not match the expected schema.
    #[error("corrupt entry at {path:?}: {detail}")]
    CorruptEntry {
        /// Path of the offending file.
        path: PathBuf,
        /// What was wrong with it.
        detail: String,
    },

    /// A scene was requested that the store does not contain.
    #[error("scene {name:?} not found at {path:?}")]
    SceneNotFound {
        /// Requested scene name.
        name: String,
        /// Path that was probed.
        path: PathBuf,
    },

    /// A scene or key name that cannot be used as a file name.
    #[error("invalid name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },

    /// A malformed payload encountered while decoding a reader.
    ///
    /// File-level loaders convert this into [`ChunkIoError::CorruptEntry`]
    /// with the offending path attached.
    #[error("invalid format: {detail}")]
    InvalidFormat {
        /// What was wrong with the payload.
        detail: String,
    },

    /// A split manifest that could not be parsed.
    #[error("invalid manifest at {path:?}: {detail}")]
    InvalidManifest {
        /// Path of the manifest file.
        path: PathBuf,
        /// Parser error text.
        detail: String,
    },

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChunkIoError {
    /// Rewrites decode-level failures as a corrupt entry at `path`.
    ///
    /// Used by file-level loaders so callers see which file was bad rather
    /// than a bare format or EOF error.
    pub(crate) fn at_path(self, path: &Path) -> Self {
        match self {
            ChunkIoError::InvalidFormat { detail } => ChunkIoError::CorruptEntry {
                path: path.to_path_buf(),
                detail,
            },
            ChunkIoError::Io(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                ChunkIoError::CorruptEntry {
                    path: path.to_path_buf(),
                    detail: "truncated file".to_string(),
                }
            }
            other => other,
        }
    }
}

/// Result type for chunk_io operations.
pub type Result<T> = std::result::Result<T, ChunkIoError>;
