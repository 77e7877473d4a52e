//! chunk_core - scene, chunk, and label types for the point-cloud chunk pipeline.
//!
//! This crate holds the pure data model shared by the storage layer
//! (`chunk_io`) and the pipeline layer (`chunk_pipeline`): full scenes,
//! fixed-size chunks with their sampling provenance, and the internal
//! label space with its external remapping.
//!
//! # Core Types
//!
//! - [`Scene`]: one full point cloud with optional labels
//! - [`Chunk`]: a fixed-size K-point sample in model-consumable shape
//! - [`Provenance`]: origin indices and validity mask tying a chunk to its scene
//! - [`SceneChunk`]: a chunk paired with its provenance
//! - [`LabelRemap`]: internal-to-external class id mapping

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chunk;
pub mod labels;
pub mod scene;
pub mod types;

pub use chunk::{Chunk, Provenance, SceneChunk};
pub use labels::{
    default_class_weights, frequency_class_weights, LabelRemap, CLASS_NAMES, NUM_CLASSES,
    UNANNOTATED,
};
pub use scene::Scene;
pub use types::{Aabb, Point3};
