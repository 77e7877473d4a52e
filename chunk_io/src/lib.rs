//! Storage layer for the chunk pipeline.
//!
//! This crate owns everything that touches disk:
//!
//! - [`SceneStore`]: named `.scene` files plus the `splits.json` manifest
//! - [`ChunkCache`]: write-once `.chunk` entries keyed by `(outer, inner)`
//! - [`format`]: the shared binary container layout
//!
//! Higher layers read and write whole [`Scene`](chunk_core::Scene),
//! [`Chunk`](chunk_core::Chunk) and [`SceneChunk`](chunk_core::SceneChunk)
//! values; byte layout stays private to [`format`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod error;
pub mod format;
pub mod store;

pub use cache::{CacheKey, ChunkCache, CHUNK_EXT};
pub use error::{ChunkIoError, Result};
pub use store::{SceneStore, SplitManifest, MANIFEST_FILE, SCENE_EXT};
