//! Label space and class-id remapping.
//!
//! Scenes and chunks carry internal class ids in `0..NUM_CLASSES`, with
//! [`UNANNOTATED`] as the sentinel for points without a meaningful label.
//! [`LabelRemap`] converts internal ids to the external benchmark ids
//! expected by downstream scoring.

use serde::{Deserialize, Serialize};

/// Internal class id for points without a meaningful label.
pub const UNANNOTATED: i32 = 0;

/// Number of internal classes, including the unannotated sentinel.
pub const NUM_CLASSES: usize = 21;

/// Human-readable names for the internal classes, indexed by class id.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "unannotated",
    "wall",
    "floor",
    "chair",
    "table",
    "desk",
    "bed",
    "bookshelf",
    "sofa",
    "sink",
    "bathtub",
    "toilet",
    "curtain",
    "counter",
    "door",
    "window",
    "shower curtain",
    "refridgerator",
    "picture",
    "cabinet",
    "otherfurniture",
];

/// A fixed internal-to-external class id table.
///
/// `table[id]` gives the external id for internal ids inside the table;
/// anything outside maps to `fallback`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRemap {
    /// External id per internal id.
    pub table: Vec<i32>,
    /// External id for internal ids outside the table.
    pub fallback: i32,
}

impl LabelRemap {
    /// Create a remap from an explicit table and fallback.
    pub fn new(table: Vec<i32>, fallback: i32) -> Self {
        Self { table, fallback }
    }

    /// The NYU40 benchmark mapping for the 21-class internal label space.
    ///
    /// Unannotated (and any out-of-range id) maps to external class 1.
    pub fn nyu40() -> Self {
        Self {
            table: vec![
                1, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 14, 16, 24, 28, 33, 34, 36, 39,
            ],
            fallback: 1,
        }
    }

    /// Identity mapping over `num_classes` ids; out-of-range ids map to 0.
    pub fn identity(num_classes: usize) -> Self {
        Self {
            table: (0..num_classes as i32).collect(),
            fallback: 0,
        }
    }

    /// Map one internal id to its external id.
    #[inline]
    pub fn apply(&self, label: i32) -> i32 {
        usize::try_from(label)
            .ok()
            .and_then(|i| self.table.get(i))
            .copied()
            .unwrap_or(self.fallback)
    }

    /// Map a whole label array in place.
    pub fn apply_all(&self, labels: &mut [i32]) {
        for label in labels.iter_mut() {
            *label = self.apply(*label);
        }
    }
}

/// Uniform per-class loss weights with the unannotated class masked out.
pub fn default_class_weights() -> Vec<f32> {
    let mut weights = vec![1.0; NUM_CLASSES];
    weights[UNANNOTATED as usize] = 0.0;
    weights
}

/// Inverse-log-frequency class weights from per-class point counts.
///
/// `w[c] = 1 / ln(1.2 + count[c] / total)`; the unannotated class always
/// gets weight 0. Classes absent from the counts get the maximum weight.
pub fn frequency_class_weights(counts: &[u64; NUM_CLASSES]) -> Vec<f32> {
    let total: u64 = counts.iter().sum();
    let total = total.max(1) as f64;

    let mut weights: Vec<f32> = counts
        .iter()
        .map(|&c| (1.0 / (1.2 + c as f64 / total).ln()) as f32)
        .collect();
    weights[UNANNOTATED as usize] = 0.0;
    weights
}
