//! Full-scene point cloud data.

use crate::types::{Aabb, Point3};

/// A full 3D scene: per-point positions, colors, normals, and optional labels.
///
/// All arrays have the same length N. Labels, when present, are internal class
/// ids in `0..NUM_CLASSES` with 0 meaning unannotated.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    /// Scene identifier, also used as the on-disk file stem.
    pub name: String,
    /// Point positions.
    pub points: Vec<Point3>,
    /// Point colors (RGB).
    pub colors: Vec<[u8; 3]>,
    /// Point normals.
    pub normals: Vec<Point3>,
    /// Optional per-point class labels.
    pub labels: Option<Vec<i32>>,
}

impl Scene {
    /// Create an unlabeled scene.
    pub fn new(
        name: impl Into<String>,
        points: Vec<Point3>,
        colors: Vec<[u8; 3]>,
        normals: Vec<Point3>,
    ) -> Self {
        assert_eq!(points.len(), colors.len());
        assert_eq!(points.len(), normals.len());
        Self {
            name: name.into(),
            points,
            colors,
            normals,
            labels: None,
        }
    }

    /// Create a labeled scene.
    pub fn with_labels(
        name: impl Into<String>,
        points: Vec<Point3>,
        colors: Vec<[u8; 3]>,
        normals: Vec<Point3>,
        labels: Vec<i32>,
    ) -> Self {
        assert_eq!(points.len(), labels.len());
        let mut scene = Self::new(name, points, colors, normals);
        scene.labels = Some(labels);
        scene
    }

    /// Get the number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the scene has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check if the scene carries labels.
    pub fn has_labels(&self) -> bool {
        self.labels.is_some()
    }

    /// Compute the bounding box. Returns `None` for an empty scene.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.points)
    }

    /// Get the label of a point, if the scene is labeled.
    #[inline]
    pub fn label(&self, index: usize) -> Option<i32> {
        self.labels.as_ref().map(|l| l[index])
    }
}
