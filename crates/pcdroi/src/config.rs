use serde::{Deserialize, Serialize};

use crate::color::{Palette, DEFAULT_LUT_STOPS};
use crate::error::PcdError;
use crate::roi::{Roi, RoiBounds, RoiSet};

/// Parameters controlling how a PCD body is decoded and colored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Keep one record out of `stride`, counted by raw line (ASCII) or row (binary) index.
    pub stride: usize,
    /// Color ramp used for height coloring.
    pub palette: Palette,
    /// Number of samples in the color table.
    pub lut_stops: usize,
    /// Color points by normalized height. When false points are white.
    pub color_by_height: bool,
    /// Paint points inside any ROI with `highlight_color`.
    pub highlight_rois: bool,
    /// Color of highlighted points.
    pub highlight_color: [f32; 3],
    /// Emit an outline for every ROI.
    pub show_outlines: bool,
    /// Color of the ROI outlines.
    pub outline_color: [f32; 3],
    /// Seed the running z range at 0 instead of the first observed value.
    pub seed_height_at_zero: bool,
    /// Normalized height used when the z range is empty.
    pub degenerate_height: f32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            stride: 3,
            palette: Palette::Rainbow,
            lut_stops: DEFAULT_LUT_STOPS,
            color_by_height: true,
            highlight_rois: false,
            highlight_color: [1.0, 0.0, 0.0],
            show_outlines: true,
            outline_color: [1.0, 1.0, 0.0],
            seed_height_at_zero: true,
            degenerate_height: 0.0,
        }
    }
}

impl DecoderConfig {
    /// Set the downsampling stride.
    pub fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Set the color palette.
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Set the number of samples of the color table.
    pub fn with_lut_stops(mut self, stops: usize) -> Self {
        self.lut_stops = stops;
        self
    }

    /// Enable or disable height coloring.
    pub fn with_color_by_height(mut self, enabled: bool) -> Self {
        self.color_by_height = enabled;
        self
    }

    /// Enable or disable ROI highlighting.
    pub fn with_highlight(mut self, enabled: bool) -> Self {
        self.highlight_rois = enabled;
        self
    }

    /// Set the highlight color.
    pub fn with_highlight_color(mut self, color: [f32; 3]) -> Self {
        self.highlight_color = color;
        self
    }

    /// Enable or disable ROI outlines.
    pub fn with_outlines(mut self, enabled: bool) -> Self {
        self.show_outlines = enabled;
        self
    }

    /// Choose how the running z range is seeded.
    pub fn with_seed_height_at_zero(mut self, enabled: bool) -> Self {
        self.seed_height_at_zero = enabled;
        self
    }

    /// Set the normalized height used for a degenerate z range.
    pub fn with_degenerate_height(mut self, height: f32) -> Self {
        self.degenerate_height = height;
        self
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<(), PcdError> {
        if self.stride == 0 {
            return Err(PcdError::InvalidConfig("stride must be at least 1".into()));
        }
        if self.lut_stops < 2 {
            return Err(PcdError::InvalidConfig(format!(
                "lut_stops must be at least 2, got {}",
                self.lut_stops
            )));
        }
        if !(0.0..=1.0).contains(&self.degenerate_height) {
            return Err(PcdError::InvalidConfig(format!(
                "degenerate_height must be in [0, 1], got {}",
                self.degenerate_height
            )));
        }
        for (name, color) in [
            ("highlight_color", self.highlight_color),
            ("outline_color", self.outline_color),
        ] {
            if color.iter().any(|c| !(0.0..=1.0).contains(c)) {
                return Err(PcdError::InvalidConfig(format!(
                    "{name} channels must be in [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Settings for synthesizing ROIs when none are supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiGenerationConfig {
    /// Number of boxes to generate per load.
    pub count: usize,
    /// Sampling ranges for centers and sizes.
    pub bounds: RoiBounds,
    /// Fixed seed for reproducible boxes.
    pub seed: Option<u64>,
}

impl Default for RoiGenerationConfig {
    fn default() -> Self {
        Self {
            count: 2,
            bounds: RoiBounds::default(),
            seed: None,
        }
    }
}

/// Full configuration of a [`crate::loader::PcdLoader`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Decoding parameters.
    #[serde(flatten)]
    pub decoder: DecoderConfig,
    /// Explicit regions of interest.
    pub rois: RoiSet,
    /// Generate ROIs for every load when `rois` is empty.
    pub generate_rois: Option<RoiGenerationConfig>,
}

impl LoaderConfig {
    /// Set the decoding parameters.
    pub fn with_decoder(mut self, decoder: DecoderConfig) -> Self {
        self.decoder = decoder;
        self
    }

    /// Set explicit regions of interest.
    pub fn with_rois(mut self, rois: Vec<Roi>) -> Self {
        self.rois = RoiSet::new(rois);
        self
    }

    /// Enable ROI generation.
    pub fn with_generated_rois(mut self, generation: RoiGenerationConfig) -> Self {
        self.generate_rois = Some(generation);
        self
    }

    /// Parse a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, PcdError> {
        serde_json::from_str(text).map_err(|e| PcdError::InvalidConfig(e.to_string()))
    }

    /// Check the decoder parameters and generation bounds.
    pub fn validate(&self) -> Result<(), PcdError> {
        self.decoder.validate()?;
        if let Some(generation) = &self.generate_rois {
            generation.bounds.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = DecoderConfig::default();
        assert_eq!(config.stride, 3);
        assert_eq!(config.lut_stops, 512);
        assert!(config.seed_height_at_zero);
        assert!(!config.highlight_rois);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let zero_stride = DecoderConfig::default().with_stride(0);
        assert!(matches!(zero_stride.validate(), Err(PcdError::InvalidConfig(_))));

        let height = DecoderConfig::default().with_degenerate_height(f32::NAN);
        assert!(height.validate().is_err());

        let color = DecoderConfig::default().with_highlight_color([2.0, 0.0, 0.0]);
        assert!(color.validate().is_err());
    }

    #[test]
    fn parses_json() -> Result<(), PcdError> {
        let config = LoaderConfig::from_json(
            r#"{
                "stride": 1,
                "palette": "grayscale",
                "highlight_rois": true,
                "rois": [{ "center": [0, 0, 0], "size": [2, 2, 2] }],
                "generate_rois": { "count": 4, "seed": 9 }
            }"#,
        )?;
        assert_eq!(config.decoder.stride, 1);
        assert_eq!(config.decoder.palette, Palette::Grayscale);
        assert!(config.decoder.highlight_rois);
        assert_eq!(config.decoder.lut_stops, 512);
        assert_eq!(config.rois.len(), 1);

        let generation = config.generate_rois.clone().unwrap_or_default();
        assert_eq!(generation.count, 4);
        assert_eq!(generation.seed, Some(9));
        assert_eq!(generation.bounds, RoiBounds::default());
        config.validate()
    }

    #[test]
    fn rejects_bad_json() {
        assert!(matches!(
            LoaderConfig::from_json(r#"{ "palette": "viridis" }"#),
            Err(PcdError::InvalidConfig(_))
        ));
    }
}
