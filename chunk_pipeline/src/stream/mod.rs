//! Chunk delivery for training and evaluation loops.
//!
//! Three stream shapes cover the consumers:
//!
//! - [`CyclicStream`]: endless replay of a precomputed train cache
//! - [`FiniteStream`]: one ordered pass over a cache, with provenance
//! - [`WriteThroughStream`] / [`EvalStream`]: sample scenes on the fly,
//!   persisting every chunk before it is handed out
//!
//! Any of them can be wrapped in a [`Prefetcher`] to hide storage latency
//! behind a bounded worker thread.

pub mod prefetch;
pub mod replay;
pub mod write_through;

pub use prefetch::Prefetcher;
pub use replay::{CyclicStream, FiniteStream};
pub use write_through::{EvalStream, WriteThroughStream};
