//! Fixed-size chunk data sampled from a scene.

use crate::types::Point3;

/// A fixed-size sample of K points in the shape the model consumes.
///
/// All arrays have the same length K. Labels are present for train/eval
/// chunks and absent for inference on unlabeled scenes.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Point positions.
    pub points: Vec<Point3>,
    /// Point colors (RGB).
    pub colors: Vec<[u8; 3]>,
    /// Point normals.
    pub normals: Vec<Point3>,
    /// Optional per-point class labels.
    pub labels: Option<Vec<i32>>,
    /// Per-point loss weight; 0 for padded or unannotated samples.
    pub sample_weight: Vec<f32>,
}

impl Chunk {
    /// Create an unlabeled chunk.
    pub fn new(
        points: Vec<Point3>,
        colors: Vec<[u8; 3]>,
        normals: Vec<Point3>,
        sample_weight: Vec<f32>,
    ) -> Self {
        assert_eq!(points.len(), colors.len());
        assert_eq!(points.len(), normals.len());
        assert_eq!(points.len(), sample_weight.len());
        Self {
            points,
            colors,
            normals,
            labels: None,
            sample_weight,
        }
    }

    /// Create a labeled chunk.
    pub fn with_labels(
        points: Vec<Point3>,
        colors: Vec<[u8; 3]>,
        normals: Vec<Point3>,
        labels: Vec<i32>,
        sample_weight: Vec<f32>,
    ) -> Self {
        assert_eq!(points.len(), labels.len());
        let mut chunk = Self::new(points, colors, normals, sample_weight);
        chunk.labels = Some(labels);
        chunk
    }

    /// Get the chunk size K.
    pub fn k(&self) -> usize {
        self.points.len()
    }

    /// Check if the chunk carries labels.
    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }
}

/// Sampling bookkeeping tying a chunk back to its parent scene.
///
/// `origin_index[i]` is the index of sample i in the parent scene's point
/// array; duplicates are legal when a neighborhood has fewer than K points.
/// `valid_mask[i]` marks the samples that are authoritative for their
/// original point and should be written back during aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Provenance {
    /// Name of the parent scene.
    pub scene: String,
    /// Index of each sample in the parent scene.
    pub origin_index: Vec<u32>,
    /// Authoritative-sample flags.
    pub valid_mask: Vec<bool>,
}

impl Provenance {
    /// Create provenance data for a chunk.
    pub fn new(scene: impl Into<String>, origin_index: Vec<u32>, valid_mask: Vec<bool>) -> Self {
        assert_eq!(origin_index.len(), valid_mask.len());
        Self {
            scene: scene.into(),
            origin_index,
            valid_mask,
        }
    }

    /// Get the sample count K.
    pub fn k(&self) -> usize {
        self.origin_index.len()
    }

    /// Count the authoritative samples.
    pub fn valid_count(&self) -> usize {
        self.valid_mask.iter().filter(|m| **m).count()
    }
}

/// A chunk together with its provenance.
///
/// This is what the sampler produces and what eval-side consumers
/// (aggregation) require; the train cache stores only the [`Chunk`] part.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneChunk {
    /// The model-facing arrays.
    pub chunk: Chunk,
    /// The scene/index bookkeeping.
    pub provenance: Provenance,
}

impl SceneChunk {
    /// Pair a chunk with its provenance.
    pub fn new(chunk: Chunk, provenance: Provenance) -> Self {
        assert_eq!(chunk.k(), provenance.k());
        Self { chunk, provenance }
    }

    /// Get the chunk size K.
    pub fn k(&self) -> usize {
        self.chunk.k()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_chunk(k: usize) -> Chunk {
        Chunk::with_labels(
            vec![Point3::splat(0.0); k],
            vec![[255, 0, 0]; k],
            vec![Point3::new(0.0, 0.0, 1.0); k],
            vec![1; k],
            vec![1.0; k],
        )
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = small_chunk(4);
        assert_eq!(chunk.k(), 4);
        assert!(chunk.has_labels());
    }

    #[test]
    fn test_provenance_valid_count() {
        let prov = Provenance::new("scene0", vec![0, 1, 2, 2], vec![true, true, true, false]);
        assert_eq!(prov.k(), 4);
        assert_eq!(prov.valid_count(), 3);
    }

    #[test]
    fn test_scene_chunk_pairing() {
        let chunk = small_chunk(2);
        let prov = Provenance::new("scene0", vec![5, 7], vec![true, false]);
        let sc = SceneChunk::new(chunk, prov);
        assert_eq!(sc.k(), 2);
        assert_eq!(sc.provenance.scene, "scene0");
    }

    #[test]
    #[should_panic]
    fn test_scene_chunk_size_mismatch() {
        let chunk = small_chunk(3);
        let prov = Provenance::new("scene0", vec![0, 1], vec![true, true]);
        let _ = SceneChunk::new(chunk, prov);
    }
}
