//! Error types for the pipeline layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while sampling, streaming or aggregating chunks.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A scene with zero points cannot be sampled.
    #[error("scene {scene:?} has no points")]
    EmptyScene {
        /// Name of the offending scene.
        scene: String,
    },

    /// Every crop attempt came up empty.
    #[error("no usable crop found in scene {scene:?} after {attempts} attempts")]
    DegenerateCrop {
        /// Name of the offending scene.
        scene: String,
        /// How many anchors were tried.
        attempts: u32,
    },

    /// Predictions for a scene arrived after that scene was already
    /// flushed. Chunk streams must deliver scenes contiguously.
    #[error("predictions for scene {scene:?} arrived after it was flushed")]
    OutOfOrderScene {
        /// Name of the offending scene.
        scene: String,
    },

    /// Two masked predictions landed on the same point while duplicates
    /// are configured to be rejected.
    #[error("duplicate prediction for point {index} of scene {scene:?}")]
    DuplicateScatter {
        /// Name of the offending scene.
        scene: String,
        /// Scene point index written twice.
        index: u32,
    },

    /// An origin index points outside the reconstructed scene.
    #[error("origin index {index} out of range for scene {scene:?} ({len} points covered)")]
    ScatterOutOfRange {
        /// Name of the offending scene.
        scene: String,
        /// The out-of-range origin index.
        index: u32,
        /// Number of points the scene's chunks cover.
        len: usize,
    },

    /// Two arrays that must be the same length were not.
    #[error("{context}: expected {expected} elements, got {got}")]
    MismatchedLengths {
        /// What was being checked.
        context: String,
        /// Required length.
        expected: usize,
        /// Observed length.
        got: usize,
    },

    /// A configuration value outside its valid range.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// What was wrong.
        message: String,
    },

    /// A replay stream was opened over a cache with no entries.
    #[error("chunk cache at {path:?} is empty")]
    EmptyCache {
        /// Root of the empty cache.
        path: PathBuf,
    },

    /// An export target already exists and will not be overwritten.
    #[error("export target {path:?} already exists")]
    ExportExists {
        /// The occupied path.
        path: PathBuf,
    },

    /// Error from the storage layer.
    #[error("storage error: {0}")]
    Store(#[from] chunk_io::ChunkIoError),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
