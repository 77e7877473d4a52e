//! Anchor-crop chunk sampling.
//!
//! Training chunks come from [`ChunkSampler::sample`]: pick a random scene
//! point as anchor, crop a fixed-size box around it, and draw a chunk from
//! the cropped points. Evaluation chunks come from
//! [`ChunkSampler::sample_all`], which tiles the scene so every point is
//! the responsibility of exactly one chunk.

use chunk_core::{Aabb, Chunk, Point3, Provenance, Scene, SceneChunk, UNANNOTATED};
use rand::Rng;

use crate::config::SamplerConfig;
use crate::error::{PipelineError, Result};

/// Draws fixed-size chunks from scenes.
#[derive(Debug, Clone)]
pub struct ChunkSampler {
    config: SamplerConfig,
}

impl ChunkSampler {
    /// Creates a sampler, validating the configuration.
    pub fn new(config: SamplerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The active configuration.
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Draws one training chunk around a random anchor point.
    ///
    /// Crops are retried up to `max_retries` times until the core box holds
    /// enough annotated points; if no crop qualifies the last one is kept.
    /// Points are drawn from the padded crop with replacement. A drawn
    /// point is valid when it lies in the core box and carries a real
    /// annotation; invalid points get sample weight 0.
    ///
    /// # Errors
    /// Returns [`EmptyScene`](PipelineError::EmptyScene) for scenes without
    /// points and [`DegenerateCrop`](PipelineError::DegenerateCrop) when
    /// every attempted crop contained nothing.
    pub fn sample(&self, scene: &Scene, rng: &mut impl Rng) -> Result<SceneChunk> {
        let n = scene.len();
        if n == 0 {
            return Err(PipelineError::EmptyScene {
                scene: scene.name.clone(),
            });
        }

        let mut selection: Option<(Aabb, Vec<u32>)> = None;
        let mut accepted = false;

        for _ in 0..self.config.max_retries {
            let anchor = scene.points[rng.gen_range(0..n)];
            let core = Aabb::centered(anchor, self.config.half_extents);
            let crop = core.padded(self.config.crop_margin);

            let candidates: Vec<u32> = (0..n as u32)
                .filter(|&i| crop.contains(scene.points[i as usize]))
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let ok = self.crop_acceptable(scene, &core, &candidates);
            selection = Some((core, candidates));
            if ok {
                accepted = true;
                break;
            }
        }

        let (core, candidates) = selection.ok_or_else(|| PipelineError::DegenerateCrop {
            scene: scene.name.clone(),
            attempts: self.config.max_retries,
        })?;
        if !accepted {
            log::warn!(
                "scene {}: no crop reached {:.0}% annotated points in {} attempts, keeping last",
                scene.name,
                self.config.min_annotated_fraction * 100.0,
                self.config.max_retries
            );
        }

        Ok(self.draw_chunk(scene, &core, &candidates, rng))
    }

    /// Tiles the scene and returns one chunk group per occupied tile.
    ///
    /// The xy plane is cut into tiles of the full crop size; the core box
    /// of each tile spans the scene's whole z range. Every scene point is a
    /// masked member of exactly one chunk. Tiles holding more than
    /// `chunk_size` points emit several chunks; chunks short of
    /// `chunk_size` are padded with unmasked context points drawn with
    /// replacement from the padded tile.
    pub fn sample_all(&self, scene: &Scene, rng: &mut impl Rng) -> Result<Vec<SceneChunk>> {
        let n = scene.len();
        if n == 0 {
            return Err(PipelineError::EmptyScene {
                scene: scene.name.clone(),
            });
        }
        let bounds = match scene.bounds() {
            Some(bounds) => bounds,
            None => {
                return Err(PipelineError::EmptyScene {
                    scene: scene.name.clone(),
                })
            }
        };

        let stride_x = 2.0 * self.config.half_extents.x;
        let stride_y = 2.0 * self.config.half_extents.y;
        let nx = tile_count(bounds.min.x, bounds.max.x, stride_x);
        let ny = tile_count(bounds.min.y, bounds.max.y, stride_y);

        let mut tiles: Vec<Vec<u32>> = vec![Vec::new(); nx * ny];
        for i in 0..n {
            let p = scene.points[i];
            let cx = tile_of(p.x, bounds.min.x, stride_x, nx);
            let cy = tile_of(p.y, bounds.min.y, stride_y, ny);
            tiles[cy * nx + cx].push(i as u32);
        }

        let mut chunks = Vec::new();
        for (ti, members) in tiles.iter().enumerate() {
            if members.is_empty() {
                continue;
            }
            let cx = ti % nx;
            let cy = ti / nx;
            let core = Aabb::new(
                Point3::new(
                    bounds.min.x + cx as f32 * stride_x,
                    bounds.min.y + cy as f32 * stride_y,
                    bounds.min.z,
                ),
                Point3::new(
                    bounds.min.x + (cx + 1) as f32 * stride_x,
                    bounds.min.y + (cy + 1) as f32 * stride_y,
                    bounds.max.z,
                ),
            );
            let crop = core.padded(self.config.crop_margin);
            let context: Vec<u32> = (0..n as u32)
                .filter(|&i| crop.contains(scene.points[i as usize]))
                .collect();

            for group in members.chunks(self.config.chunk_size) {
                chunks.push(self.assemble_tile_chunk(scene, group, &context, rng));
            }
        }

        log::debug!(
            "scene {}: {} points tiled into {} chunks ({}x{} tiles)",
            scene.name,
            n,
            chunks.len(),
            nx,
            ny
        );
        Ok(chunks)
    }

    /// Whether a candidate crop holds enough annotated core points.
    fn crop_acceptable(&self, scene: &Scene, core: &Aabb, candidates: &[u32]) -> bool {
        if !scene.has_labels() {
            return true;
        }

        let core_test = core.padded(self.config.mask_margin);
        let mut in_core = 0usize;
        let mut annotated = 0usize;
        for &i in candidates {
            if core_test.contains(scene.points[i as usize]) {
                in_core += 1;
                if scene.label(i as usize).is_some_and(|l| l != UNANNOTATED) {
                    annotated += 1;
                }
            }
        }

        in_core > 0 && annotated as f32 / in_core as f32 >= self.config.min_annotated_fraction
    }

    /// Draws `chunk_size` points with replacement from `candidates`.
    fn draw_chunk(
        &self,
        scene: &Scene,
        core: &Aabb,
        candidates: &[u32],
        rng: &mut impl Rng,
    ) -> SceneChunk {
        let k = self.config.chunk_size;
        let core_test = core.padded(self.config.mask_margin);
        let mut draft = ChunkDraft::new(k, scene.has_labels());

        for _ in 0..k {
            let idx = candidates[rng.gen_range(0..candidates.len())];
            let label = scene.label(idx as usize);

            let in_core = core_test.contains(scene.points[idx as usize]);
            let valid = match label {
                Some(l) => in_core && l != UNANNOTATED,
                None => in_core,
            };
            let weight = if valid { self.weight_for(label) } else { 0.0 };
            draft.push(scene, idx, valid, weight);
        }

        draft.into_scene_chunk(&scene.name)
    }

    /// Builds one eval chunk from a tile's member group plus padding.
    fn assemble_tile_chunk(
        &self,
        scene: &Scene,
        group: &[u32],
        context: &[u32],
        rng: &mut impl Rng,
    ) -> SceneChunk {
        let k = self.config.chunk_size;
        let mut draft = ChunkDraft::new(k, scene.has_labels());

        for &idx in group {
            let label = scene.label(idx as usize);
            let annotated = label.map_or(true, |l| l != UNANNOTATED);
            let weight = if annotated { self.weight_for(label) } else { 0.0 };
            draft.push(scene, idx, true, weight);
        }

        // Top up short chunks with unmasked context points. The tile's own
        // members are always part of the padded crop, so the pool is never
        // empty; the fallback covers points with non-finite coordinates.
        let pool = if context.is_empty() { group } else { context };
        while draft.len() < k {
            let idx = pool[rng.gen_range(0..pool.len())];
            draft.push(scene, idx, false, 0.0);
        }

        draft.into_scene_chunk(&scene.name)
    }

    fn weight_for(&self, label: Option<i32>) -> f32 {
        match (&self.config.class_weights, label) {
            (Some(weights), Some(label)) => usize::try_from(label)
                .ok()
                .and_then(|i| weights.get(i).copied())
                .unwrap_or(0.0),
            _ => 1.0,
        }
    }
}

/// Column accumulator for a chunk under construction.
struct ChunkDraft {
    points: Vec<Point3>,
    colors: Vec<[u8; 3]>,
    normals: Vec<Point3>,
    labels: Option<Vec<i32>>,
    weight: Vec<f32>,
    origin_index: Vec<u32>,
    valid_mask: Vec<bool>,
}

impl ChunkDraft {
    fn new(k: usize, labeled: bool) -> Self {
        Self {
            points: Vec::with_capacity(k),
            colors: Vec::with_capacity(k),
            normals: Vec::with_capacity(k),
            labels: labeled.then(|| Vec::with_capacity(k)),
            weight: Vec::with_capacity(k),
            origin_index: Vec::with_capacity(k),
            valid_mask: Vec::with_capacity(k),
        }
    }

    fn len(&self) -> usize {
        self.points.len()
    }

    /// Copies scene point `idx` into the draft.
    fn push(&mut self, scene: &Scene, idx: u32, valid: bool, weight: f32) {
        let i = idx as usize;
        self.points.push(scene.points[i]);
        self.colors.push(scene.colors[i]);
        self.normals.push(scene.normals[i]);
        if let Some(labels) = &mut self.labels {
            labels.push(scene.label(i).unwrap_or(UNANNOTATED));
        }
        self.weight.push(weight);
        self.origin_index.push(idx);
        self.valid_mask.push(valid);
    }

    fn into_scene_chunk(self, scene_name: &str) -> SceneChunk {
        let chunk = match self.labels {
            Some(labels) => {
                Chunk::with_labels(self.points, self.colors, self.normals, labels, self.weight)
            }
            None => Chunk::new(self.points, self.colors, self.normals, self.weight),
        };
        SceneChunk::new(
            chunk,
            Provenance::new(scene_name.to_string(), self.origin_index, self.valid_mask),
        )
    }
}

fn tile_count(min: f32, max: f32, stride: f32) -> usize {
    let span = (max - min).max(0.0);
    let count = (span / stride).floor() as usize + 1;
    count.max(1)
}

fn tile_of(value: f32, min: f32, stride: f32, count: usize) -> usize {
    // Saturating float casts send NaN to tile 0, keeping the partition
    // total even for broken coordinates.
    let idx = ((value - min) / stride).floor() as isize;
    idx.clamp(0, count as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// A flat grid of `nx * ny` labeled points spaced `step` apart.
    fn make_grid_scene(name: &str, nx: usize, ny: usize, step: f32) -> Scene {
        let mut points = Vec::new();
        let mut labels = Vec::new();
        for y in 0..ny {
            for x in 0..nx {
                points.push(Point3::new(x as f32 * step, y as f32 * step, 0.5));
                labels.push(((x + y) % 4 + 1) as i32);
            }
        }
        let n = points.len();
        Scene::with_labels(
            name,
            points,
            vec![[127, 127, 127]; n],
            vec![Point3::new(0.0, 0.0, 1.0); n],
            labels,
        )
    }

    fn small_config() -> SamplerConfig {
        SamplerConfig::new()
            .with_chunk_size(64)
            .with_half_extents(Point3::new(0.75, 0.75, 1.5))
    }

    #[test]
    fn test_sample_has_configured_size() {
        let scene = make_grid_scene("grid", 20, 20, 0.1);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        let sc = sampler.sample(&scene, &mut rng).unwrap();
        assert_eq!(sc.k(), 64);
        assert_eq!(sc.provenance.origin_index.len(), 64);
        assert_eq!(sc.provenance.valid_mask.len(), 64);
        assert!(sc.chunk.has_labels());
    }

    #[test]
    fn test_sample_origin_indices_point_back_into_scene() {
        let scene = make_grid_scene("grid", 15, 15, 0.2);
        let sampler = ChunkSampler::new(small_config()).unwrap();

        for seed in 0..20 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let sc = sampler.sample(&scene, &mut rng).unwrap();
            for (j, &idx) in sc.provenance.origin_index.iter().enumerate() {
                assert!((idx as usize) < scene.len());
                assert_eq!(sc.chunk.points[j], scene.points[idx as usize]);
                assert_eq!(sc.chunk.colors[j], scene.colors[idx as usize]);
            }
        }
    }

    #[test]
    fn test_sample_is_deterministic_per_seed() {
        let scene = make_grid_scene("grid", 12, 12, 0.15);
        let sampler = ChunkSampler::new(small_config()).unwrap();

        let a = sampler
            .sample(&scene, &mut ChaCha8Rng::seed_from_u64(99))
            .unwrap();
        let b = sampler
            .sample(&scene, &mut ChaCha8Rng::seed_from_u64(99))
            .unwrap();
        let c = sampler
            .sample(&scene, &mut ChaCha8Rng::seed_from_u64(100))
            .unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_sample_empty_scene() {
        let scene = Scene::new("void", vec![], vec![], vec![]);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let result = sampler.sample(&scene, &mut rng);
        assert!(matches!(result, Err(PipelineError::EmptyScene { .. })));
    }

    #[test]
    fn test_sample_unlabeled_scene() {
        let labeled = make_grid_scene("grid", 10, 10, 0.2);
        let scene = Scene::new(
            "unlabeled",
            labeled.points.clone(),
            labeled.colors.clone(),
            labeled.normals.clone(),
        );
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let sc = sampler.sample(&scene, &mut rng).unwrap();
        assert!(!sc.chunk.has_labels());
        assert!(sc.provenance.valid_mask.iter().any(|&m| m));
    }

    #[test]
    fn test_fully_unannotated_scene_falls_back() {
        let mut scene = make_grid_scene("blank", 10, 10, 0.1);
        scene.labels = Some(vec![UNANNOTATED; scene.len()]);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        // No crop can reach the annotated threshold; the last one is kept
        // and every drawn point is invalid.
        let sc = sampler.sample(&scene, &mut rng).unwrap();
        assert!(sc.provenance.valid_mask.iter().all(|&m| !m));
        assert!(sc.chunk.sample_weight.iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_class_weights_applied() {
        let mut scene = make_grid_scene("uniform", 10, 10, 0.1);
        scene.labels = Some(vec![2; scene.len()]);
        let config = small_config().with_class_weights(vec![0.0, 1.0, 2.5, 1.0, 1.0]);
        let sampler = ChunkSampler::new(config).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        let sc = sampler.sample(&scene, &mut rng).unwrap();
        for (j, &valid) in sc.provenance.valid_mask.iter().enumerate() {
            let expected = if valid { 2.5 } else { 0.0 };
            assert_eq!(sc.chunk.sample_weight[j], expected);
        }
    }

    #[test]
    fn test_sample_all_covers_every_point_exactly_once() {
        let scene = make_grid_scene("grid", 25, 17, 0.2);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let chunks = sampler.sample_all(&scene, &mut rng).unwrap();
        assert!(!chunks.is_empty());

        let mut covered = Vec::new();
        for sc in &chunks {
            assert_eq!(sc.k(), 64);
            for (j, &masked) in sc.provenance.valid_mask.iter().enumerate() {
                if masked {
                    covered.push(sc.provenance.origin_index[j]);
                }
            }
        }
        covered.sort_unstable();

        let expected: Vec<u32> = (0..scene.len() as u32).collect();
        assert_eq!(covered, expected);
    }

    #[test]
    fn test_sample_all_tiny_scene_single_padded_chunk() {
        let scene = make_grid_scene("tiny", 3, 1, 0.1);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        let chunks = sampler.sample_all(&scene, &mut rng).unwrap();
        assert_eq!(chunks.len(), 1);

        let sc = &chunks[0];
        assert_eq!(sc.k(), 64);
        assert_eq!(sc.provenance.valid_mask.iter().filter(|&&m| m).count(), 3);
        // Padding points carry no weight.
        for (j, &masked) in sc.provenance.valid_mask.iter().enumerate() {
            if !masked {
                assert_eq!(sc.chunk.sample_weight[j], 0.0);
            }
        }
    }

    #[test]
    fn test_sample_all_empty_scene() {
        let scene = Scene::new("void", vec![], vec![], vec![]);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(0);

        let result = sampler.sample_all(&scene, &mut rng);
        assert!(matches!(result, Err(PipelineError::EmptyScene { .. })));
    }

    #[test]
    fn test_sample_all_large_tile_splits_into_multiple_chunks() {
        // 200 points inside one tile with chunk_size 64 must yield 4 chunks.
        let scene = make_grid_scene("dense", 20, 10, 0.05);
        let sampler = ChunkSampler::new(small_config()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let chunks = sampler.sample_all(&scene, &mut rng).unwrap();
        assert_eq!(chunks.len(), 4);

        let masked: usize = chunks
            .iter()
            .map(|sc| sc.provenance.valid_mask.iter().filter(|&&m| m).count())
            .sum();
        assert_eq!(masked, 200);
    }
}
