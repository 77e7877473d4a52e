//! Configuration types for sampling, streaming and aggregation.

use chunk_core::{LabelRemap, Point3};

use crate::error::{PipelineError, Result};

/// Controls how chunks are cropped and drawn from a scene.
///
/// The defaults match the indoor-scan setup this pipeline was built for:
/// 1.5 m square crops over the full room height, 8192 points per chunk.
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Number of points drawn per chunk.
    pub chunk_size: usize,
    /// Half extents of the core crop box around the anchor point.
    pub half_extents: Point3,
    /// Padding added to the core box when collecting context points.
    pub crop_margin: f32,
    /// Tolerance when testing whether a point lies in the core box.
    pub mask_margin: f32,
    /// Minimum fraction of annotated core points for a crop to be accepted
    /// without retrying.
    pub min_annotated_fraction: f32,
    /// Anchor attempts before settling for the best crop seen.
    pub max_retries: u32,
    /// Per-class sample weights indexed by label. `None` weights every
    /// annotated point 1.0.
    pub class_weights: Option<Vec<f32>>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            half_extents: Point3::new(0.75, 0.75, 1.5),
            crop_margin: 0.2,
            mask_margin: 0.01,
            min_annotated_fraction: 0.7,
            max_retries: 10,
            class_weights: None,
        }
    }
}

impl SamplerConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of points per chunk.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Sets the half extents of the core crop box.
    pub fn with_half_extents(mut self, half_extents: Point3) -> Self {
        self.half_extents = half_extents;
        self
    }

    /// Sets the context padding around the core box.
    pub fn with_crop_margin(mut self, crop_margin: f32) -> Self {
        self.crop_margin = crop_margin;
        self
    }

    /// Sets the in-core test tolerance.
    pub fn with_mask_margin(mut self, mask_margin: f32) -> Self {
        self.mask_margin = mask_margin;
        self
    }

    /// Sets the annotated-fraction acceptance threshold.
    pub fn with_min_annotated_fraction(mut self, fraction: f32) -> Self {
        self.min_annotated_fraction = fraction;
        self
    }

    /// Sets the number of anchor attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets per-class sample weights.
    pub fn with_class_weights(mut self, weights: Vec<f32>) -> Self {
        self.class_weights = Some(weights);
        self
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "chunk_size must be at least 1".to_string(),
            });
        }
        let he = self.half_extents;
        if !(he.x > 0.0 && he.y > 0.0 && he.z > 0.0) || !he.is_finite() {
            return Err(PipelineError::InvalidConfig {
                message: format!("half_extents must be positive and finite, got {:?}", he),
            });
        }
        if !(self.crop_margin >= 0.0 && self.crop_margin.is_finite()) {
            return Err(PipelineError::InvalidConfig {
                message: format!("crop_margin must be non-negative, got {}", self.crop_margin),
            });
        }
        if !(self.mask_margin >= 0.0 && self.mask_margin.is_finite()) {
            return Err(PipelineError::InvalidConfig {
                message: format!("mask_margin must be non-negative, got {}", self.mask_margin),
            });
        }
        if !(0.0..=1.0).contains(&self.min_annotated_fraction) {
            return Err(PipelineError::InvalidConfig {
                message: format!(
                    "min_annotated_fraction must be in [0, 1], got {}",
                    self.min_annotated_fraction
                ),
            });
        }
        if self.max_retries == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "max_retries must be at least 1".to_string(),
            });
        }
        if let Some(weights) = &self.class_weights {
            if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
                return Err(PipelineError::InvalidConfig {
                    message: "class_weights must be non-negative and finite".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Controls a cache precompute run.
#[derive(Debug, Clone)]
pub struct PrecomputeConfig {
    /// Number of epochs to generate.
    pub epochs: usize,
    /// Chunks generated per epoch.
    pub elements_per_epoch: usize,
    /// Outer index of the first generated epoch; lets a later run extend
    /// an existing cache instead of colliding with it.
    pub start_epoch: u32,
    /// Seed that, together with each element's key, determines its RNG.
    pub base_seed: u64,
}

impl PrecomputeConfig {
    /// Creates a config generating `epochs` × `elements_per_epoch` chunks.
    pub fn new(epochs: usize, elements_per_epoch: usize) -> Self {
        Self {
            epochs,
            elements_per_epoch,
            start_epoch: 0,
            base_seed: 0,
        }
    }

    /// Sets the outer index of the first epoch.
    pub fn with_start_epoch(mut self, start_epoch: u32) -> Self {
        self.start_epoch = start_epoch;
        self
    }

    /// Sets the base seed.
    pub fn with_base_seed(mut self, base_seed: u64) -> Self {
        self.base_seed = base_seed;
        self
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 || self.elements_per_epoch == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "epochs and elements_per_epoch must be at least 1".to_string(),
            });
        }
        let last_epoch = self.start_epoch as u64 + self.epochs as u64;
        if last_epoch > u32::MAX as u64 {
            return Err(PipelineError::InvalidConfig {
                message: format!(
                    "epoch range {}..{} does not fit a cache key",
                    self.start_epoch, last_epoch
                ),
            });
        }
        if self.elements_per_epoch as u64 > u32::MAX as u64 {
            return Err(PipelineError::InvalidConfig {
                message: "elements_per_epoch does not fit a cache key".to_string(),
            });
        }
        Ok(())
    }
}

/// Controls chunk stream delivery.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Chunks decoded ahead of the consumer. Train loops typically use 2,
    /// eval loops 4.
    pub prefetch_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { prefetch_depth: 2 }
    }
}

impl StreamConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the prefetch depth.
    pub fn with_prefetch_depth(mut self, depth: usize) -> Self {
        self.prefetch_depth = depth;
        self
    }

    /// Checks that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if self.prefetch_depth == 0 {
            return Err(PipelineError::InvalidConfig {
                message: "prefetch_depth must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// What to do when two masked predictions land on the same scene point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The later chunk overwrites the earlier prediction.
    #[default]
    LastWriteWins,
    /// Aggregation fails on the first duplicate.
    Reject,
}

/// Controls prediction aggregation and label output.
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    /// Remap applied to reconstructed labels before they leave the
    /// aggregator. `None` keeps model label ids as-is.
    pub remap: Option<LabelRemap>,
    /// Duplicate handling for overlapping chunks.
    pub duplicate_policy: DuplicatePolicy,
}

impl AggregatorConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output label remap.
    pub fn with_remap(mut self, remap: LabelRemap) -> Self {
        self.remap = Some(remap);
        self
    }

    /// Sets the duplicate handling policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sampler_config_is_valid() {
        assert!(SamplerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_sampler_config_rejects_bad_values() {
        assert!(SamplerConfig::new()
            .with_chunk_size(0)
            .validate()
            .is_err());
        assert!(SamplerConfig::new()
            .with_half_extents(Point3::new(0.0, 1.0, 1.0))
            .validate()
            .is_err());
        assert!(SamplerConfig::new()
            .with_crop_margin(-0.1)
            .validate()
            .is_err());
        assert!(SamplerConfig::new()
            .with_min_annotated_fraction(1.5)
            .validate()
            .is_err());
        assert!(SamplerConfig::new().with_max_retries(0).validate().is_err());
        assert!(SamplerConfig::new()
            .with_class_weights(vec![1.0, f32::NAN])
            .validate()
            .is_err());
    }

    #[test]
    fn test_precompute_config_epoch_range() {
        assert!(PrecomputeConfig::new(4, 100).validate().is_ok());
        assert!(PrecomputeConfig::new(0, 100).validate().is_err());
        assert!(PrecomputeConfig::new(4, 0).validate().is_err());
        assert!(PrecomputeConfig::new(2, 10)
            .with_start_epoch(u32::MAX)
            .validate()
            .is_err());
    }

    #[test]
    fn test_stream_config() {
        assert_eq!(StreamConfig::default().prefetch_depth, 2);
        assert!(StreamConfig::new().with_prefetch_depth(0).validate().is_err());
        assert!(StreamConfig::new().with_prefetch_depth(4).validate().is_ok());
    }

    #[test]
    fn test_duplicate_policy_default() {
        assert_eq!(
            AggregatorConfig::default().duplicate_policy,
            DuplicatePolicy::LastWriteWins
        );
    }
}
