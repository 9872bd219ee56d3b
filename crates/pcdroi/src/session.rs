use serde::Serialize;

use crate::error::PcdError;
use crate::geometry::{BoundingSphere, DecodeResult};
use crate::loader::{ByteSource, PcdLoader};

/// Zoom numerator used when framing a cloud: `zoom = FRAMING_SCALE / radius`.
pub const FRAMING_SCALE: f32 = 250.0;

/// Factor applied by [`ViewerSession::grow_point_size`].
pub const POINT_SIZE_GROW: f32 = 1.2;

/// Factor applied by [`ViewerSession::shrink_point_size`].
pub const POINT_SIZE_SHRINK: f32 = 0.8;

/// Camera placement that frames a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraFrame {
    /// Point the camera orbits around.
    pub target: [f32; 3],
    /// Orthographic zoom factor.
    pub zoom: f32,
}

impl CameraFrame {
    /// Frame a bounding sphere. Returns `None` for a sphere without extent.
    pub fn from_sphere(sphere: &BoundingSphere) -> Option<Self> {
        (sphere.radius > 0.0 && sphere.radius.is_finite()).then(|| Self {
            target: sphere.center,
            zoom: FRAMING_SCALE / sphere.radius,
        })
    }
}

/// Per-viewer state carried across successive loads.
#[derive(Debug, Clone)]
pub struct ViewerSession {
    frame_id: u64,
    source: Option<String>,
    point_size: f32,
    camera: Option<CameraFrame>,
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self {
            frame_id: 0,
            source: None,
            point_size: 1.0,
            camera: None,
        }
    }
}

impl ViewerSession {
    /// Create a session that loads `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Default::default()
        }
    }

    /// Set the initial point size.
    pub fn with_point_size(mut self, point_size: f32) -> Self {
        self.point_size = point_size;
        self
    }

    /// Number of successful loads so far.
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    /// Location loaded by [`ViewerSession::load_next`].
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Change the location for the next loads.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    /// Current point size.
    pub fn point_size(&self) -> f32 {
        self.point_size
    }

    /// Camera framing set by the first successful load.
    pub fn camera(&self) -> Option<CameraFrame> {
        self.camera
    }

    /// Multiply the point size by `factor` and return the new size.
    pub fn scale_point_size(&mut self, factor: f32) -> Result<f32, PcdError> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(PcdError::InvalidConfig(format!(
                "point size factor must be positive, got {factor}"
            )));
        }
        self.point_size *= factor;
        log::debug!("new point size {}", self.point_size);
        Ok(self.point_size)
    }

    /// Make points larger.
    pub fn grow_point_size(&mut self) -> f32 {
        self.point_size *= POINT_SIZE_GROW;
        self.point_size
    }

    /// Make points smaller.
    pub fn shrink_point_size(&mut self) -> f32 {
        self.point_size *= POINT_SIZE_SHRINK;
        self.point_size
    }

    /// Load the session source with the current point size.
    ///
    /// The first successful load frames the camera on the cloud's bounding sphere.
    pub async fn load_next<S: ByteSource>(
        &mut self,
        loader: &PcdLoader<S>,
    ) -> Result<DecodeResult, PcdError> {
        let source = self
            .source
            .as_deref()
            .ok_or_else(|| PcdError::InvalidConfig("viewer session has no source".into()))?;

        let result = loader.load(source, self.point_size).await?;

        self.frame_id += 1;
        if self.frame_id == 1 {
            self.camera = CameraFrame::from_sphere(&result.bounding_sphere);
        }
        Ok(result)
    }
}
