//! Parallel cache precompute drivers.
//!
//! Both drivers write through the write-once cache, so two runs that
//! accidentally target the same key range abort on the first collision
//! instead of silently mixing outputs. A resumed train run picks a fresh
//! epoch range via [`PrecomputeConfig::start_epoch`].

use chunk_core::Scene;
use chunk_io::{CacheKey, ChunkCache, SceneStore};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::PrecomputeConfig;
use crate::error::{PipelineError, Result};
use crate::sampler::ChunkSampler;

/// Derives the RNG seed of one cached element from the run's base seed.
///
/// SplitMix64 finalizer over the packed cache key, so neighbouring keys
/// get uncorrelated streams and every element can be regenerated on its
/// own.
pub fn element_seed(base_seed: u64, outer: u32, inner: u32) -> u64 {
    let mut z = base_seed
        .wrapping_add(((outer as u64) << 32) | inner as u64)
        .wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Fills a train cache with `epochs * elements_per_epoch` sampled chunks.
///
/// Element `j` of epoch `e` is cached under key `(start_epoch + e, j)` and
/// draws from scene `scenes[j % scenes.len()]` with an RNG derived from
/// the base seed and that key, so reruns and resumed runs regenerate
/// identical chunks. Elements of an epoch are generated in parallel.
/// Returns the number of chunks written.
pub fn precompute_train(
    store: &SceneStore,
    scenes: &[String],
    sampler: &ChunkSampler,
    cache: &ChunkCache,
    config: &PrecomputeConfig,
) -> Result<usize> {
    config.validate()?;
    let loaded = load_scenes(store, scenes)?;

    let mut written = 0usize;
    for e in 0..config.epochs {
        let outer = config.start_epoch + e as u32;
        (0..config.elements_per_epoch)
            .into_par_iter()
            .try_for_each(|j| -> Result<()> {
                let scene = &loaded[j % loaded.len()];
                let key = CacheKey::new(outer, j as u32);
                let mut rng =
                    ChaCha8Rng::seed_from_u64(element_seed(config.base_seed, key.outer, key.inner));

                let sc = sampler.sample(scene, &mut rng)?;
                cache.put(&key, &sc.chunk)?;
                Ok(())
            })?;
        written += config.elements_per_epoch;
        log::info!(
            "epoch {}: cached {} train chunks",
            outer,
            config.elements_per_epoch
        );
    }
    Ok(written)
}

/// Fills an eval cache by exhaustively tiling every scene.
///
/// Chunks of scene `j` land under keys `(j, 0..)`, keeping each scene's
/// run contiguous in key order. Scenes are processed in parallel. Returns
/// the number of chunks written.
pub fn precompute_eval(
    store: &SceneStore,
    scenes: &[String],
    sampler: &ChunkSampler,
    cache: &ChunkCache,
    base_seed: u64,
) -> Result<usize> {
    let loaded = load_scenes(store, scenes)?;

    loaded
        .par_iter()
        .enumerate()
        .map(|(j, scene)| -> Result<usize> {
            let outer = j as u32;
            let mut rng = ChaCha8Rng::seed_from_u64(element_seed(base_seed, outer, 0));

            let chunks = sampler.sample_all(scene, &mut rng)?;
            for (i, sc) in chunks.iter().enumerate() {
                cache.put_traced(&CacheKey::new(outer, i as u32), sc)?;
            }
            log::info!("scene {}: cached {} eval chunks", scene.name, chunks.len());
            Ok(chunks.len())
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))
}

fn load_scenes(store: &SceneStore, names: &[String]) -> Result<Vec<Scene>> {
    if names.is_empty() {
        return Err(PipelineError::InvalidConfig {
            message: "no scenes to sample".to_string(),
        });
    }
    names
        .iter()
        .map(|name| store.load(name).map_err(PipelineError::from))
        .collect()
}
