//! Replay streams over a precomputed chunk cache.

use chunk_core::{Chunk, SceneChunk};
use chunk_io::{CacheKey, ChunkCache};

use crate::error::{PipelineError, Result};

/// Endless replay of a train cache in ascending key order.
///
/// The key list is snapshotted when the stream is opened; entries added to
/// the cache later are not picked up. After the last key the stream wraps
/// to the first, so `next()` never returns `None`.
#[derive(Debug)]
pub struct CyclicStream {
    cache: ChunkCache,
    keys: Vec<CacheKey>,
    cursor: usize,
}

impl CyclicStream {
    /// Opens an endless stream over the cache's current entries.
    ///
    /// # Errors
    /// Returns [`EmptyCache`](PipelineError::EmptyCache) when the cache has
    /// no entries, since an endless stream over nothing cannot make
    /// progress.
    pub fn open(cache: ChunkCache) -> Result<Self> {
        let keys = cache.keys()?;
        if keys.is_empty() {
            return Err(PipelineError::EmptyCache {
                path: cache.root().to_path_buf(),
            });
        }
        log::info!(
            "cyclic stream over {} cached chunks at {}",
            keys.len(),
            cache.root().display()
        );
        Ok(Self {
            cache,
            keys,
            cursor: 0,
        })
    }

    /// Number of distinct entries in one cycle.
    pub fn cycle_len(&self) -> usize {
        self.keys.len()
    }
}

impl Iterator for CyclicStream {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys[self.cursor];
        self.cursor += 1;
        if self.cursor == self.keys.len() {
            self.cursor = 0;
            log::debug!("cache replay wrapped after {} chunks", self.keys.len());
        }
        Some(self.cache.load(&key).map_err(PipelineError::from))
    }
}

/// One ordered pass over an eval cache, yielding chunks with provenance.
#[derive(Debug)]
pub struct FiniteStream {
    cache: ChunkCache,
    keys: std::vec::IntoIter<CacheKey>,
}

impl FiniteStream {
    /// Opens a single pass over the cache's current entries in key order.
    ///
    /// An empty cache yields an empty stream.
    pub fn open(cache: ChunkCache) -> Result<Self> {
        let keys = cache.keys()?;
        log::info!(
            "finite stream over {} cached chunks at {}",
            keys.len(),
            cache.root().display()
        );
        Ok(Self {
            cache,
            keys: keys.into_iter(),
        })
    }

    /// Entries not yet yielded.
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

impl Iterator for FiniteStream {
    type Item = Result<SceneChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.keys.next()?;
        Some(self.cache.load_traced(&key).map_err(PipelineError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_core::{Point3, Provenance};
    use tempfile::TempDir;

    /// One-point chunk whose x coordinate encodes `tag`.
    fn tagged_chunk(tag: f32) -> Chunk {
        Chunk::with_labels(
            vec![Point3::new(tag, 0.0, 0.0)],
            vec![[0, 0, 0]],
            vec![Point3::new(0.0, 0.0, 1.0)],
            vec![1],
            vec![1.0],
        )
    }

    fn tag_of(chunk: &Chunk) -> f32 {
        chunk.points[0].x
    }

    #[test]
    fn test_cyclic_stream_wraps_in_order() {
        let dir = TempDir::new().unwrap();
        let cache = ChunkCache::create(dir.path()).unwrap();
        for i in 0..3 {
            cache
                .put(&CacheKey::new(0, i), &tagged_chunk(i as f32))
                .unwrap();
        }

        let stream = CyclicStream::open(cache).unwrap();
        assert_eq!(stream.cycle_len(), 3);

        let tags: Vec<f32> = stream
            .take(7)
            .map(|c| tag_of(&c.unwrap()))
            .collect();
        assert_eq!(tags, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_cyclic_stream_orders_across_outer_index() {
        let dir = TempDir::new().unwrap();
        let cache = ChunkCache::create(dir.path()).unwrap();
        // Inserted out of order on purpose.
        cache.put(&CacheKey::new(1, 0), &tagged_chunk(2.0)).unwrap();
        cache.put(&CacheKey::new(0, 1), &tagged_chunk(1.0)).unwrap();
        cache.put(&CacheKey::new(0, 0), &tagged_chunk(0.0)).unwrap();

        let stream = CyclicStream::open(cache).unwrap();
        let tags: Vec<f32> = stream.take(3).map(|c| tag_of(&c.unwrap())).collect();
        assert_eq!(tags, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_cyclic_stream_rejects_empty_cache() {
        let dir = TempDir::new().unwrap();
        let cache = ChunkCache::create(dir.path()).unwrap();

        let result = CyclicStream::open(cache);
        assert!(matches!(result, Err(PipelineError::EmptyCache { .. })));
    }

    #[test]
    fn test_finite_stream_single_pass() {
        let dir = TempDir::new().unwrap();
        let cache = ChunkCache::create(dir.path()).unwrap();
        for i in 0..4 {
            let traced = SceneChunk::new(
                tagged_chunk(i as f32),
                Provenance::new("scene_a", vec![i], vec![true]),
            );
            cache.put_traced(&CacheKey::new(0, i), &traced).unwrap();
        }

        let stream = FiniteStream::open(cache).unwrap();
        assert_eq!(stream.remaining(), 4);

        let origins: Vec<u32> = stream
            .map(|sc| sc.unwrap().provenance.origin_index[0])
            .collect();
        assert_eq!(origins, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_finite_stream_empty_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = ChunkCache::create(dir.path()).unwrap();

        let mut stream = FiniteStream::open(cache).unwrap();
        assert!(stream.next().is_none());
    }
}
