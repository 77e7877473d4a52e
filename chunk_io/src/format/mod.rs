//! Binary container formats for scenes and chunks.
//!
//! This module provides reading and writing of the on-disk `.scene` and
//! `.chunk` containers used by the pipeline.
//!
//! # Format Overview
//!
//! Both containers share a 16-byte header followed by little-endian array
//! sections in a fixed order. Arrays are stored one section per attribute
//! so a reader can skip or stream them without per-point framing.
//!
//! # Example
//!
//! ```ignore
//! use chunk_io::format::{save_chunk, load_chunk};
//! use std::fs::File;
//!
//! let mut file = File::create("000-0001.chunk")?;
//! save_chunk(&chunk, &mut file)?;
//!
//! let mut file = File::open("000-0001.chunk")?;
//! let loaded = load_chunk(&mut file)?;
//! ```

pub mod header;
pub mod payload;

pub use header::{
    FileHeader, CHUNK_MAGIC, FLAG_LABELS, FLAG_PROVENANCE, FORMAT_VERSION, HEADER_SIZE,
    SCENE_MAGIC,
};
pub use payload::{
    load_chunk, load_scene, load_scene_chunk, save_chunk, save_scene, save_scene_chunk,
};
