use glam::Vec3;
use serde::Serialize;

use crate::config::DecoderConfig;
use crate::io::pcd::{DecodedPoints, HeightRange};
use crate::roi::{Roi, RoiSet};

/// Corner index pairs of the twelve box edges, see [`Roi::corners`].
pub const BOX_EDGES: [[usize; 2]; 12] = [
    // bottom face
    [0, 1],
    [1, 3],
    [3, 2],
    [2, 0],
    // top face
    [4, 5],
    [5, 7],
    [7, 6],
    [6, 4],
    // verticals
    [0, 4],
    [1, 5],
    [2, 6],
    [3, 7],
];

/// Sphere enclosing the axis-aligned extents of a point set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingSphere {
    /// Center of the extents.
    pub center: [f32; 3],
    /// Half of the extents diagonal.
    pub radius: f32,
}

impl BoundingSphere {
    /// Compute the sphere of an interleaved xyz buffer.
    ///
    /// An empty buffer yields a zero radius sphere at the origin.
    pub fn from_positions(positions: &[f32]) -> Self {
        let mut points = positions
            .chunks_exact(3)
            .map(|p| Vec3::new(p[0], p[1], p[2]));

        let Some(first) = points.next() else {
            return Self {
                center: [0.0; 3],
                radius: 0.0,
            };
        };

        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Self {
            center: ((min + max) * 0.5).to_array(),
            radius: (max - min).length() * 0.5,
        }
    }
}

/// Wireframe of a region of interest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoiOutline {
    /// The outlined region.
    pub roi: Roi,
    /// The eight box corners.
    pub corners: [[f32; 3]; 8],
    /// The twelve edges as pairs of endpoints.
    pub segments: [[[f32; 3]; 2]; 12],
    /// Line color.
    pub color: [f32; 3],
}

impl RoiOutline {
    /// Build the outline of a region.
    pub fn new(roi: Roi, color: [f32; 3]) -> Self {
        let corners = roi.corners().map(|c| c.to_array());
        let segments = BOX_EDGES.map(|[a, b]| [corners[a], corners[b]]);
        Self {
            roi,
            corners,
            segments,
            color,
        }
    }

    /// Segment endpoints flattened into a line-list position buffer.
    pub fn line_positions(&self) -> Vec<f32> {
        self.segments.iter().flatten().flatten().copied().collect()
    }
}

/// Everything a renderer needs to draw a decoded cloud and its regions.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeResult {
    /// Interleaved x, y, z per point.
    pub positions: Vec<f32>,
    /// Interleaved r, g, b in [0, 1] per point.
    pub colors: Vec<f32>,
    /// Number of points in the buffers.
    pub point_count: usize,
    /// Records kept by the downsampling stride.
    pub points_scanned: usize,
    /// Rendering hint passed through from the caller.
    pub point_size: f32,
    /// Sphere used to frame a camera on the cloud.
    pub bounding_sphere: BoundingSphere,
    /// Observed z range.
    pub height_range: HeightRange,
    /// True if the fallback height was used.
    pub degenerate_height: bool,
    /// One outline per region of interest.
    pub roi_outlines: Vec<RoiOutline>,
}

impl DecodeResult {
    /// Iterate positions as xyz triples.
    pub fn points(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]])
    }

    /// Iterate colors as rgb triples.
    pub fn point_colors(&self) -> impl Iterator<Item = [f32; 3]> + '_ {
        self.colors.chunks_exact(3).map(|c| [c[0], c[1], c[2]])
    }
}

/// Package decoded points and regions into a [`DecodeResult`].
///
/// The bounding sphere only depends on the positions, never on the regions.
pub fn assemble(
    points: DecodedPoints,
    rois: &RoiSet,
    config: &DecoderConfig,
    point_size: f32,
) -> DecodeResult {
    let roi_outlines = if config.show_outlines {
        rois.rois()
            .iter()
            .map(|roi| RoiOutline::new(*roi, config.outline_color))
            .collect()
    } else {
        Vec::new()
    };

    DecodeResult {
        point_count: points.len(),
        bounding_sphere: BoundingSphere::from_positions(&points.positions),
        positions: points.positions,
        colors: points.colors,
        points_scanned: points.points_scanned,
        point_size,
        height_range: points.height_range,
        degenerate_height: points.degenerate_height,
        roi_outlines,
    }
}
