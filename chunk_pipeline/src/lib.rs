//! # chunk_pipeline
//!
//! Scene-to-chunk data pipeline for point cloud segmentation models.
//!
//! This crate turns whole indoor scans into the fixed-size point chunks a
//! segmentation model consumes, and turns per-chunk predictions back into
//! whole labeled scenes, integrating with the chunk_core and chunk_io
//! crates for storage.
//!
//! ## Features
//!
//! - **Anchor-crop sampling**: randomized fixed-size training chunks with
//!   annotation-aware retries
//! - **Exhaustive tiling**: every scene point lands in exactly one eval
//!   chunk
//! - **Write-once precompute**: parallel cache generation that is
//!   reproducible per cache key and collision-safe across runs
//! - **Streams**: endless cyclic replay for training, single-pass and
//!   write-through delivery for evaluation, bounded prefetching
//! - **Aggregation**: scene reconstruction from chunk predictions with a
//!   configurable overlap policy, label remap and plain-text export
//!
//! ## Quick Start
//!
//! ```ignore
//! use chunk_pipeline::prelude::*;
//!
//! // Precompute a training cache
//! let store = SceneStore::open("data/scenes")?;
//! let scenes = store.manifest()?.train;
//! let sampler = ChunkSampler::new(SamplerConfig::new())?;
//! let cache = ChunkCache::create("data/cache/train")?;
//! precompute_train(&store, &scenes, &sampler, &cache, &PrecomputeConfig::new(8, 2000))?;
//!
//! // Feed a training loop
//! let stream = CyclicStream::open(cache)?;
//! let mut chunks = Prefetcher::spawn(stream, 2)?;
//! for chunk in chunks.by_ref().take(10_000) {
//!     let chunk = chunk?;
//!     // forward / backward ...
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! chunk_core (types)
//!     │
//!     ▼
//! chunk_io (scene store, chunk cache, formats)
//!     │
//!     ▼
//! chunk_pipeline
//!   sampler ──▶ precompute ──▶ cache ──▶ streams ──▶ model
//!                                                     │
//!                      export ◀── aggregate ◀─────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod export;
pub mod precompute;
pub mod sampler;
pub mod stream;

// Re-export key types for convenience
pub use aggregate::{ChunkPrediction, PredictionAggregator, RestoredScene};
pub use config::{
    AggregatorConfig, DuplicatePolicy, PrecomputeConfig, SamplerConfig, StreamConfig,
};
pub use error::{PipelineError, Result};
pub use precompute::{precompute_eval, precompute_train};
pub use sampler::ChunkSampler;
pub use stream::{CyclicStream, EvalStream, FiniteStream, Prefetcher, WriteThroughStream};

// Re-export from chunk_core and chunk_io for convenience
pub use chunk_core::{Chunk, LabelRemap, Point3, Provenance, Scene, SceneChunk};
pub use chunk_io::{CacheKey, ChunkCache, SceneStore, SplitManifest};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{ChunkPrediction, PredictionAggregator, RestoredScene};
    pub use crate::config::{
        AggregatorConfig, DuplicatePolicy, PrecomputeConfig, SamplerConfig, StreamConfig,
    };
    pub use crate::error::{PipelineError, Result};
    pub use crate::export::{export_predictions, export_scene, write_labels};
    pub use crate::precompute::{element_seed, precompute_eval, precompute_train};
    pub use crate::sampler::ChunkSampler;
    pub use crate::stream::{
        CyclicStream, EvalStream, FiniteStream, Prefetcher, WriteThroughStream,
    };

    pub use chunk_core::{
        Aabb, Chunk, LabelRemap, Point3, Provenance, Scene, SceneChunk, CLASS_NAMES,
        NUM_CLASSES, UNANNOTATED,
    };
    pub use chunk_io::{CacheKey, ChunkCache, SceneStore, SplitManifest};
}
