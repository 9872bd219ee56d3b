use serde::{Deserialize, Serialize};

use crate::error::PcdError;

/// Number of samples used by [`ColorLut::default`].
pub const DEFAULT_LUT_STOPS: usize = 512;

/// A control point of a palette: position in [0, 1] and a 24-bit RGB color.
type ColorStop = (f32, u32);

const RAINBOW: &[ColorStop] = &[
    (0.0, 0x0000FF),
    (0.2, 0x00FFFF),
    (0.5, 0x00FF00),
    (0.8, 0xFFFF00),
    (1.0, 0xFF0000),
];

const COOL_TO_WARM: &[ColorStop] = &[
    (0.0, 0x3C4EC2),
    (0.2, 0x9BBCFF),
    (0.5, 0xDCDCDC),
    (0.8, 0xF6A385),
    (1.0, 0xB40426),
];

const BLACKBODY: &[ColorStop] = &[
    (0.0, 0x000000),
    (0.2, 0x780000),
    (0.5, 0xE63200),
    (0.8, 0xFFFF00),
    (1.0, 0xFFFFFF),
];

const GRAYSCALE: &[ColorStop] = &[
    (0.0, 0x000000),
    (0.2, 0x404040),
    (0.5, 0x7F7F80),
    (0.8, 0xBFBFBF),
    (1.0, 0xFFFFFF),
];

/// Named color ramps available to the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Blue, cyan, green, yellow, red.
    #[default]
    Rainbow,
    /// Diverging blue to red through light gray.
    CoolToWarm,
    /// Black, red, orange, yellow, white.
    Blackbody,
    /// Black to white.
    Grayscale,
}

impl Palette {
    /// Resolve a palette by its name, ignoring case.
    pub fn from_name(name: &str) -> Result<Self, PcdError> {
        match name.to_ascii_lowercase().as_str() {
            "rainbow" => Ok(Palette::Rainbow),
            "cooltowarm" => Ok(Palette::CoolToWarm),
            "blackbody" => Ok(Palette::Blackbody),
            "grayscale" => Ok(Palette::Grayscale),
            _ => Err(PcdError::UnknownPalette(name.to_string())),
        }
    }

    fn stops(&self) -> &'static [ColorStop] {
        match self {
            Palette::Rainbow => RAINBOW,
            Palette::CoolToWarm => COOL_TO_WARM,
            Palette::Blackbody => BLACKBODY,
            Palette::Grayscale => GRAYSCALE,
        }
    }

    /// Interpolate the palette control points at `t` in [0, 1].
    fn sample(&self, t: f32) -> [f32; 3] {
        let stops = self.stops();
        let t = t.clamp(0.0, 1.0);

        // find the segment containing t, the last one also holds t == 1
        let segment = stops
            .windows(2)
            .find(|w| t < w[1].0)
            .unwrap_or(&stops[stops.len() - 2..]);
        let (t0, c0) = segment[0];
        let (t1, c1) = segment[1];
        let alpha = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);

        let (a, b) = (hex_to_rgb(c0), hex_to_rgb(c1));
        [
            a[0] + (b[0] - a[0]) * alpha,
            a[1] + (b[1] - a[1]) * alpha,
            a[2] + (b[2] - a[2]) * alpha,
        ]
    }
}

impl std::str::FromStr for Palette {
    type Err = PcdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Palette::from_name(s)
    }
}

fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xFF) as f32 / 255.0,
        ((hex >> 8) & 0xFF) as f32 / 255.0,
        (hex & 0xFF) as f32 / 255.0,
    ]
}

/// A discretized color ramp indexed by a normalized scalar.
///
/// The table holds `stops` samples evenly spaced over [0, 1], so the first and
/// last entries are exactly the palette end colors.
#[derive(Debug, Clone)]
pub struct ColorLut {
    palette: Palette,
    table: Vec<[f32; 3]>,
}

impl ColorLut {
    /// Build a lookup table for a palette.
    ///
    /// # Arguments
    ///
    /// * `palette` - The color ramp to sample.
    /// * `stops` - Number of samples in the table, at least 2.
    pub fn new(palette: Palette, stops: usize) -> Result<Self, PcdError> {
        if stops < 2 {
            return Err(PcdError::InvalidConfig(format!(
                "color table needs at least 2 stops, got {stops}"
            )));
        }

        Ok(Self::build(palette, stops))
    }

    fn build(palette: Palette, stops: usize) -> Self {
        let last = (stops - 1) as f32;
        let table = (0..stops)
            .map(|i| palette.sample(i as f32 / last))
            .collect();
        Self { palette, table }
    }

    /// Build a lookup table for a palette given by name.
    pub fn from_name(name: &str, stops: usize) -> Result<Self, PcdError> {
        Self::new(Palette::from_name(name)?, stops)
    }

    /// The palette the table was built from.
    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Number of samples in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Always false, a table holds at least two samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Map `t` to a color. Values outside [0, 1] are clamped and NaN maps to 0.
    #[inline]
    pub fn lookup(&self, t: f32) -> [f32; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let index = (t * (self.table.len() - 1) as f32).round() as usize;
        self.table[index.min(self.table.len() - 1)]
    }
}

impl Default for ColorLut {
    fn default() -> Self {
        Self::build(Palette::default(), DEFAULT_LUT_STOPS)
    }
}
