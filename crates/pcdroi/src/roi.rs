use glam::Vec3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::PcdError;

/// Decides whether a point belongs to a region.
pub trait PointClassifier {
    /// Returns true if the point is inside the region.
    fn classify(&self, point: [f32; 3]) -> bool;
}

/// Produces synthetic regions of interest.
pub trait RoiGenerator {
    /// Generate `count` regions within the given bounds.
    fn generate(&mut self, count: usize, bounds: &RoiBounds) -> Vec<Roi>;
}

/// An axis-aligned box used to classify and highlight points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    /// Center of the box.
    pub center: [f32; 3],
    /// Full extent of the box along each axis.
    pub size: [f32; 3],
}

impl Roi {
    /// Create a box from its center and full size.
    pub fn from_center_and_size(center: [f32; 3], size: [f32; 3]) -> Self {
        Self { center, size }
    }

    /// Create a box from two opposite corners.
    pub fn from_corners(a: [f32; 3], b: [f32; 3]) -> Self {
        let (a, b) = (Vec3::from_array(a), Vec3::from_array(b));
        let (min, max) = (a.min(b), a.max(b));
        Self {
            center: ((min + max) * 0.5).to_array(),
            size: (max - min).to_array(),
        }
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        Vec3::from_array(self.center) - Vec3::from_array(self.size).abs() * 0.5
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        Vec3::from_array(self.center) + Vec3::from_array(self.size).abs() * 0.5
    }

    /// Returns true if the point lies within the closed box on all three axes.
    #[inline]
    pub fn contains(&self, point: [f32; 3]) -> bool {
        let p = Vec3::from_array(point);
        let (min, max) = (self.min(), self.max());
        p.cmpge(min).all() && p.cmple(max).all()
    }

    /// The eight corners of the box.
    ///
    /// Bit 0 of the index selects max x, bit 1 max y and bit 2 max z.
    pub fn corners(&self) -> [Vec3; 8] {
        let (min, max) = (self.min(), self.max());
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            )
        })
    }
}

impl PointClassifier for Roi {
    fn classify(&self, point: [f32; 3]) -> bool {
        self.contains(point)
    }
}

/// A collection of regions. A point is inside the set if any region holds it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoiSet {
    rois: Vec<Roi>,
}

impl RoiSet {
    /// Create a set from a list of regions.
    pub fn new(rois: Vec<Roi>) -> Self {
        Self { rois }
    }

    /// The regions in evaluation order.
    pub fn rois(&self) -> &[Roi] {
        &self.rois
    }

    /// Number of regions.
    #[inline]
    pub fn len(&self) -> usize {
        self.rois.len()
    }

    /// Check if the set holds no regions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rois.is_empty()
    }

    /// Index of the first region holding the point.
    pub fn first_containing(&self, point: [f32; 3]) -> Option<usize> {
        self.rois.iter().position(|roi| roi.contains(point))
    }

    /// Returns true if at least one region holds the point.
    #[inline]
    pub fn contains_any(&self, point: [f32; 3]) -> bool {
        self.rois.iter().any(|roi| roi.contains(point))
    }
}

impl PointClassifier for RoiSet {
    fn classify(&self, point: [f32; 3]) -> bool {
        self.contains_any(point)
    }
}

impl From<Vec<Roi>> for RoiSet {
    fn from(rois: Vec<Roi>) -> Self {
        Self::new(rois)
    }
}

/// Sampling ranges for synthetic regions, as `[min, max]` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiBounds {
    /// Range of the box center on each axis.
    pub center: [[f32; 2]; 3],
    /// Range of the box size on each axis.
    pub size: [[f32; 2]; 3],
}

impl Default for RoiBounds {
    fn default() -> Self {
        Self {
            center: [[-50.0, 50.0], [-50.0, 50.0], [0.0, 0.0]],
            size: [[30.0, 50.0], [30.0, 50.0], [30.0, 30.0]],
        }
    }
}

impl RoiBounds {
    /// Check that every range is finite and ordered, and sizes are non-negative.
    pub fn validate(&self) -> Result<(), PcdError> {
        let mut ranges = self.center.iter().chain(self.size.iter());
        if ranges.any(|[lo, hi]| !(hi - lo).is_finite()) {
            return Err(PcdError::InvalidConfig(
                "ROI bounds must be finite with a finite span".to_string(),
            ));
        }
        let mut ranges = self.center.iter().chain(self.size.iter());
        if ranges.any(|[lo, hi]| lo > hi) {
            return Err(PcdError::InvalidConfig(
                "ROI bounds must satisfy min <= max".to_string(),
            ));
        }
        if self.size.iter().any(|[lo, _]| *lo < 0.0) {
            return Err(PcdError::InvalidConfig(
                "ROI sizes must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Generates boxes with uniformly sampled centers and sizes.
#[derive(Debug, Clone)]
pub struct RandomRoiGenerator {
    rng: StdRng,
}

impl RandomRoiGenerator {
    /// Create a generator. A fixed seed makes the output reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng }
    }

    fn sample(&mut self, [lo, hi]: [f32; 2]) -> f32 {
        if lo < hi {
            self.rng.random_range(lo..=hi)
        } else {
            lo
        }
    }
}

impl RoiGenerator for RandomRoiGenerator {
    fn generate(&mut self, count: usize, bounds: &RoiBounds) -> Vec<Roi> {
        (0..count)
            .map(|_| {
                let center = bounds.center.map(|range| self.sample(range));
                let size = bounds.size.map(|range| self.sample(range));
                Roi::from_center_and_size(center, size)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_center_and_faces() {
        let roi = Roi::from_center_and_size([1.0, 2.0, 3.0], [2.0, 4.0, 6.0]);
        assert!(roi.contains([1.0, 2.0, 3.0]));
        // closed extents
        assert!(roi.contains([0.0, 0.0, 0.0]));
        assert!(roi.contains([2.0, 4.0, 6.0]));
        assert!(!roi.contains([2.1, 2.0, 3.0]));
        assert!(!roi.contains([1.0, -0.1, 3.0]));
        assert!(!roi.contains([1.0, 2.0, 6.5]));
    }

    #[test]
    fn rejects_points_far_outside() {
        let roi = Roi::from_center_and_size([0.0; 3], [10.0, 10.0, 10.0]);
        for p in [[6.0, 6.0, 6.0], [-6.0, -6.0, -6.0], [100.0, 0.0, 0.0]] {
            assert!(!roi.contains(p));
        }
    }

    #[test]
    fn corners_span_the_box() {
        let roi = Roi::from_corners([1.0, 1.0, 1.0], [-1.0, -2.0, -3.0]);
        assert_eq!(roi.center, [0.0, -0.5, -1.0]);
        assert_eq!(roi.size, [2.0, 3.0, 4.0]);

        let corners = roi.corners();
        assert_eq!(corners[0], Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(corners[7], Vec3::new(1.0, 1.0, 1.0));
        assert!(corners.iter().all(|c| roi.contains(c.to_array())));
    }

    #[test]
    fn set_matches_any_region() {
        let set = RoiSet::new(vec![
            Roi::from_center_and_size([0.0; 3], [2.0; 3]),
            Roi::from_center_and_size([10.0, 0.0, 0.0], [2.0; 3]),
        ]);
        assert!(set.classify([0.5, 0.5, 0.5]));
        assert!(set.classify([10.5, 0.0, 0.0]));
        assert!(!set.classify([5.0, 0.0, 0.0]));
        assert_eq!(set.first_containing([10.0, 0.0, 0.0]), Some(1));
        assert!(!RoiSet::default().classify([0.0; 3]));
    }

    #[test]
    fn generator_respects_bounds() {
        let bounds = RoiBounds::default();
        let rois = RandomRoiGenerator::new(Some(7)).generate(16, &bounds);
        assert_eq!(rois.len(), 16);
        for roi in rois {
            assert!((-50.0..=50.0).contains(&roi.center[0]));
            assert!((-50.0..=50.0).contains(&roi.center[1]));
            assert_eq!(roi.center[2], 0.0);
            assert!((30.0..=50.0).contains(&roi.size[0]));
            assert!((30.0..=50.0).contains(&roi.size[1]));
            assert_eq!(roi.size[2], 30.0);
        }
    }

    #[test]
    fn seeded_generator_is_reproducible() {
        let bounds = RoiBounds::default();
        let a = RandomRoiGenerator::new(Some(42)).generate(2, &bounds);
        let b = RandomRoiGenerator::new(Some(42)).generate(2, &bounds);
        assert_eq!(a, b);
    }

    #[test]
    fn validates_bounds() {
        assert!(RoiBounds::default().validate().is_ok());

        let inverted = RoiBounds {
            center: [[1.0, -1.0], [0.0, 0.0], [0.0, 0.0]],
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(PcdError::InvalidConfig(_))));

        let wide = RoiBounds {
            center: [[-3.4e38, 3.4e38], [0.0, 0.0], [0.0, 0.0]],
            ..Default::default()
        };
        assert!(matches!(wide.validate(), Err(PcdError::InvalidConfig(_))));

        let infinite = RoiBounds {
            size: [[1.0, f32::INFINITY], [1.0, 1.0], [1.0, 1.0]],
            ..Default::default()
        };
        assert!(infinite.validate().is_err());

        let nan = RoiBounds {
            center: [[f32::NAN, 1.0], [0.0, 0.0], [0.0, 0.0]],
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let negative = RoiBounds {
            size: [[-1.0, 1.0], [1.0, 1.0], [1.0, 1.0]],
            ..Default::default()
        };
        assert!(matches!(negative.validate(), Err(PcdError::InvalidConfig(_))));
    }
}
