//! Sampling streams that persist every chunk before handing it out.

use std::collections::VecDeque;

use chunk_core::SceneChunk;
use chunk_io::{CacheKey, ChunkCache, SceneStore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::Result;
use crate::sampler::ChunkSampler;
use crate::stream::replay::FiniteStream;

/// Samples eval chunks scene by scene, writing each one to the cache
/// before it is yielded.
///
/// Scenes are processed in the given order; chunk `i` of scene `j` is
/// cached under key `(j, i)`. Because every chunk is persisted first, a
/// consumer that stops halfway leaves a cache that a later run can extend
/// or replay.
#[derive(Debug)]
pub struct WriteThroughStream {
    store: SceneStore,
    sampler: ChunkSampler,
    cache: ChunkCache,
    scenes: Vec<String>,
    rng: ChaCha8Rng,
    scene_cursor: usize,
    pending: VecDeque<SceneChunk>,
    failed: bool,
}

impl WriteThroughStream {
    /// Creates a stream over `scenes` in order, seeded for reproducible
    /// padding draws.
    pub fn new(
        store: SceneStore,
        sampler: ChunkSampler,
        cache: ChunkCache,
        scenes: Vec<String>,
        seed: u64,
    ) -> Self {
        Self {
            store,
            sampler,
            cache,
            scenes,
            rng: ChaCha8Rng::seed_from_u64(seed),
            scene_cursor: 0,
            pending: VecDeque::new(),
            failed: false,
        }
    }

    /// Loads the next scene, samples it exhaustively and caches the
    /// resulting chunks.
    fn advance_scene(&mut self) -> Result<()> {
        let name = &self.scenes[self.scene_cursor];
        let scene = self.store.load(name)?;
        let chunks = self.sampler.sample_all(&scene, &mut self.rng)?;

        let outer = self.scene_cursor as u32;
        for (i, sc) in chunks.iter().enumerate() {
            self.cache.put_traced(&CacheKey::new(outer, i as u32), sc)?;
        }
        log::info!("scene {}: cached {} eval chunks", name, chunks.len());

        self.pending.extend(chunks);
        self.scene_cursor += 1;
        Ok(())
    }
}

impl Iterator for WriteThroughStream {
    type Item = Result<SceneChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(sc) = self.pending.pop_front() {
                return Some(Ok(sc));
            }
            if self.scene_cursor == self.scenes.len() {
                return None;
            }
            if let Err(err) = self.advance_scene() {
                self.failed = true;
                return Some(Err(err));
            }
        }
    }
}

/// Evaluation chunk source that reuses the cache when possible.
///
/// A populated cache is replayed as-is; an empty one is filled by sampling
/// the given scenes write-through. Either way the consumer sees one
/// contiguous run of chunks per scene.
#[derive(Debug)]
pub enum EvalStream {
    /// All chunks were already cached.
    Cached(FiniteStream),
    /// The cache is being filled on the fly.
    Sampled(WriteThroughStream),
}

impl EvalStream {
    /// Opens a replay stream over a populated cache, or a write-through
    /// sampling stream when the cache is empty.
    pub fn open(
        store: SceneStore,
        sampler: ChunkSampler,
        cache: ChunkCache,
        scenes: Vec<String>,
        seed: u64,
    ) -> Result<Self> {
        if cache.keys()?.is_empty() {
            log::info!(
                "eval cache at {} is empty, sampling {} scenes write-through",
                cache.root().display(),
                scenes.len()
            );
            Ok(EvalStream::Sampled(WriteThroughStream::new(
                store, sampler, cache, scenes, seed,
            )))
        } else {
            Ok(EvalStream::Cached(FiniteStream::open(cache)?))
        }
    }
}

impl Iterator for EvalStream {
    type Item = Result<SceneChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            EvalStream::Cached(stream) => stream.next(),
            EvalStream::Sampled(stream) => stream.next(),
        }
    }
}
