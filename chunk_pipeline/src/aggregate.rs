//! Scene reconstruction from per-chunk predictions.
//!
//! Evaluation chunks overlap and carry padding, so per-chunk model outputs
//! cannot be compared against scene ground truth directly. The
//! [`PredictionAggregator`] consumes chunk predictions in stream order,
//! scatters the masked entries back onto scene point indices, and emits
//! one [`RestoredScene`] per scene once the stream moves on.

use std::collections::HashSet;

use chunk_core::{Provenance, UNANNOTATED};

use crate::config::{AggregatorConfig, DuplicatePolicy};
use crate::error::{PipelineError, Result};

/// Model output for one chunk, tied back to its source scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPrediction {
    /// Scene the chunk was cut from.
    pub scene: String,
    /// Predicted label id per chunk point.
    pub predicted: Vec<i32>,
    /// Scene point index of each chunk point.
    pub origin_index: Vec<u32>,
    /// True for the points this chunk is authoritative for.
    pub valid_mask: Vec<bool>,
}

impl ChunkPrediction {
    /// Creates a prediction, checking that all three arrays line up.
    pub fn new(
        scene: impl Into<String>,
        predicted: Vec<i32>,
        origin_index: Vec<u32>,
        valid_mask: Vec<bool>,
    ) -> Result<Self> {
        let k = predicted.len();
        if origin_index.len() != k {
            return Err(PipelineError::MismatchedLengths {
                context: "origin_index vs predicted".to_string(),
                expected: k,
                got: origin_index.len(),
            });
        }
        if valid_mask.len() != k {
            return Err(PipelineError::MismatchedLengths {
                context: "valid_mask vs predicted".to_string(),
                expected: k,
                got: valid_mask.len(),
            });
        }
        Ok(Self {
            scene: scene.into(),
            predicted,
            origin_index,
            valid_mask,
        })
    }

    /// Pairs a prediction vector with the provenance of the chunk it was
    /// computed from.
    pub fn from_provenance(provenance: &Provenance, predicted: Vec<i32>) -> Result<Self> {
        Self::new(
            provenance.scene.clone(),
            predicted,
            provenance.origin_index.clone(),
            provenance.valid_mask.clone(),
        )
    }

    /// Number of chunk points.
    pub fn k(&self) -> usize {
        self.predicted.len()
    }
}

/// A scene's labels reconstructed from all of its chunk predictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredScene {
    /// Scene name.
    pub scene: String,
    /// One label per covered scene point, indexed by origin index.
    pub labels: Vec<i32>,
}

/// Accumulates chunk predictions and rebuilds scenes on scene change.
///
/// Predictions must arrive scene-contiguously, as the eval streams deliver
/// them. A scene is flushed when a chunk for a different scene arrives or
/// when [`finish`](Self::finish) is called; a chunk for an already-flushed
/// scene is an error.
#[derive(Debug)]
pub struct PredictionAggregator {
    config: AggregatorConfig,
    current: Option<SceneBuffer>,
    flushed: HashSet<String>,
}

impl PredictionAggregator {
    /// Creates an aggregator.
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            current: None,
            flushed: HashSet::new(),
        }
    }

    /// Feeds one chunk prediction.
    ///
    /// Returns the previous scene's reconstruction when `prediction` opens
    /// a new scene, `None` otherwise.
    ///
    /// # Errors
    /// Returns [`OutOfOrderScene`](PipelineError::OutOfOrderScene) when a
    /// scene reappears after being flushed, plus any scatter failure from
    /// the flush itself.
    pub fn push(&mut self, prediction: ChunkPrediction) -> Result<Option<RestoredScene>> {
        if self.flushed.contains(&prediction.scene) {
            return Err(PipelineError::OutOfOrderScene {
                scene: prediction.scene,
            });
        }

        let same_scene = self
            .current
            .as_ref()
            .is_some_and(|buffer| buffer.scene == prediction.scene);
        if same_scene {
            if let Some(buffer) = &mut self.current {
                buffer.absorb(prediction);
            }
            return Ok(None);
        }

        let finished = self.flush_current()?;
        self.current = Some(SceneBuffer::start(prediction));
        Ok(finished)
    }

    /// Flushes the scene still buffered, if any. Call once after the last
    /// push; without it the final scene is lost.
    pub fn finish(&mut self) -> Result<Option<RestoredScene>> {
        self.flush_current()
    }

    /// Names of scenes already reconstructed.
    pub fn flushed_scenes(&self) -> impl Iterator<Item = &str> {
        self.flushed.iter().map(String::as_str)
    }

    fn flush_current(&mut self) -> Result<Option<RestoredScene>> {
        let buffer = match self.current.take() {
            Some(buffer) => buffer,
            None => return Ok(None),
        };
        let chunk_count = buffer.chunks;

        let restored = buffer.restore(&self.config)?;
        log::info!(
            "scene {}: restored {} points from {} chunks",
            restored.scene,
            restored.labels.len(),
            chunk_count
        );
        self.flushed.insert(restored.scene.clone());
        Ok(Some(restored))
    }
}

/// Flattened predictions of the scene currently being collected.
#[derive(Debug)]
struct SceneBuffer {
    scene: String,
    predicted: Vec<i32>,
    origin_index: Vec<u32>,
    valid_mask: Vec<bool>,
    chunks: usize,
}

impl SceneBuffer {
    fn start(p: ChunkPrediction) -> Self {
        Self {
            scene: p.scene,
            predicted: p.predicted,
            origin_index: p.origin_index,
            valid_mask: p.valid_mask,
            chunks: 1,
        }
    }

    fn absorb(&mut self, p: ChunkPrediction) {
        self.predicted.extend(p.predicted);
        self.origin_index.extend(p.origin_index);
        self.valid_mask.extend(p.valid_mask);
        self.chunks += 1;
    }

    /// Scatters masked predictions onto scene point indices.
    ///
    /// The output length is the number of distinct origin indices seen,
    /// masked or not; exhaustive sampling makes that the scene's point
    /// count. Unwritten points keep [`UNANNOTATED`] before the remap.
    fn restore(self, config: &AggregatorConfig) -> Result<RestoredScene> {
        let covered: HashSet<u32> = self.origin_index.iter().copied().collect();
        let m = covered.len();

        let mut labels = vec![UNANNOTATED; m];
        let mut written = match config.duplicate_policy {
            DuplicatePolicy::Reject => Some(vec![false; m]),
            DuplicatePolicy::LastWriteWins => None,
        };

        for ((&idx, &masked), &label) in self
            .origin_index
            .iter()
            .zip(&self.valid_mask)
            .zip(&self.predicted)
        {
            if !masked {
                continue;
            }
            let i = idx as usize;
            if i >= m {
                return Err(PipelineError::ScatterOutOfRange {
                    scene: self.scene.clone(),
                    index: idx,
                    len: m,
                });
            }
            if let Some(written) = &mut written {
                if written[i] {
                    return Err(PipelineError::DuplicateScatter {
                        scene: self.scene.clone(),
                        index: idx,
                    });
                }
                written[i] = true;
            }
            labels[i] = label;
        }

        if let Some(remap) = &config.remap {
            remap.apply_all(&mut labels);
        }
        Ok(RestoredScene {
            scene: self.scene,
            labels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_core::LabelRemap;

    fn prediction(scene: &str, predicted: Vec<i32>, origins: Vec<u32>, mask: Vec<bool>) -> ChunkPrediction {
        ChunkPrediction::new(scene, predicted, origins, mask).unwrap()
    }

    #[test]
    fn test_two_disjoint_chunks_reconstruct_scene() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        let a = prediction("s", vec![10, 11, 12, 13, 14], vec![0, 1, 2, 3, 4], vec![true; 5]);
        let b = prediction("s", vec![15, 16, 17, 18, 19], vec![5, 6, 7, 8, 9], vec![true; 5]);

        assert!(agg.push(a).unwrap().is_none());
        assert!(agg.push(b).unwrap().is_none());

        let restored = agg.finish().unwrap().unwrap();
        assert_eq!(restored.scene, "s");
        assert_eq!(restored.labels, (10..20).collect::<Vec<i32>>());
        assert!(agg.finish().unwrap().is_none());
    }

    #[test]
    fn test_padding_entries_are_ignored() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        // The last entry repeats point 0 as padding; its prediction must
        // not land anywhere.
        let p = prediction(
            "s",
            vec![5, 6, 7, 99],
            vec![0, 1, 2, 0],
            vec![true, true, true, false],
        );
        agg.push(p).unwrap();

        let restored = agg.finish().unwrap().unwrap();
        assert_eq!(restored.labels, vec![5, 6, 7]);
    }

    #[test]
    fn test_overlap_last_writer_wins() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        let a = prediction("s", vec![1, 2], vec![0, 1], vec![true, true]);
        let b = prediction("s", vec![3, 4], vec![1, 2], vec![true, true]);
        agg.push(a).unwrap();
        agg.push(b).unwrap();

        let restored = agg.finish().unwrap().unwrap();
        assert_eq!(restored.labels, vec![1, 3, 4]);
    }

    #[test]
    fn test_overlap_rejected_when_configured() {
        let config = AggregatorConfig::new().with_duplicate_policy(DuplicatePolicy::Reject);
        let mut agg = PredictionAggregator::new(config);

        let a = prediction("s", vec![1, 2], vec![0, 1], vec![true, true]);
        let b = prediction("s", vec![3, 4], vec![1, 2], vec![true, true]);
        agg.push(a).unwrap();
        agg.push(b).unwrap();

        let result = agg.finish();
        assert!(matches!(
            result,
            Err(PipelineError::DuplicateScatter { index: 1, .. })
        ));
    }

    #[test]
    fn test_scene_change_flushes_previous() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        agg.push(prediction("a", vec![1], vec![0], vec![true])).unwrap();
        let flushed = agg
            .push(prediction("b", vec![2], vec![0], vec![true]))
            .unwrap()
            .unwrap();

        assert_eq!(flushed.scene, "a");
        assert_eq!(flushed.labels, vec![1]);

        let last = agg.finish().unwrap().unwrap();
        assert_eq!(last.scene, "b");
    }

    #[test]
    fn test_flushed_scene_cannot_reappear() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        agg.push(prediction("a", vec![1], vec![0], vec![true])).unwrap();
        agg.push(prediction("b", vec![2], vec![0], vec![true])).unwrap();

        let result = agg.push(prediction("a", vec![3], vec![0], vec![true]));
        assert!(matches!(result, Err(PipelineError::OutOfOrderScene { .. })));
    }

    #[test]
    fn test_remap_applied_after_scatter() {
        let config = AggregatorConfig::new().with_remap(LabelRemap::nyu40());
        let mut agg = PredictionAggregator::new(config);

        // Point 1 is only ever padding, so it scatters as unannotated and
        // the remap sends it to the fallback class.
        let p = prediction("s", vec![13, 7], vec![0, 1], vec![true, false]);
        agg.push(p).unwrap();

        let restored = agg.finish().unwrap().unwrap();
        assert_eq!(restored.labels, vec![14, 1]);
    }

    #[test]
    fn test_sparse_coverage_detected() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());

        // Origin 5 with only 2 distinct indices cannot be scattered.
        let p = prediction("s", vec![1, 2], vec![0, 5], vec![true, true]);
        agg.push(p).unwrap();

        let result = agg.finish();
        assert!(matches!(
            result,
            Err(PipelineError::ScatterOutOfRange { index: 5, len: 2, .. })
        ));
    }

    #[test]
    fn test_prediction_length_checks() {
        assert!(ChunkPrediction::new("s", vec![1, 2], vec![0], vec![true, true]).is_err());
        assert!(ChunkPrediction::new("s", vec![1, 2], vec![0, 1], vec![true]).is_err());
        assert!(ChunkPrediction::new("s", vec![1, 2], vec![0, 1], vec![true, true]).is_ok());
    }

    #[test]
    fn test_from_provenance() {
        let provenance = Provenance::new("room", vec![4, 2], vec![true, false]);
        let p = ChunkPrediction::from_provenance(&provenance, vec![8, 9]).unwrap();

        assert_eq!(p.scene, "room");
        assert_eq!(p.origin_index, vec![4, 2]);
        assert_eq!(p.valid_mask, vec![true, false]);
        assert_eq!(p.k(), 2);
    }

    #[test]
    fn test_finish_with_no_data() {
        let mut agg = PredictionAggregator::new(AggregatorConfig::new());
        assert!(agg.finish().unwrap().is_none());
    }
}
