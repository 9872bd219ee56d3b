use serde::Serialize;

use super::header::{parse_header, DataEncoding, PcdField, PcdHeader};
use crate::color::ColorLut;
use crate::config::DecoderConfig;
use crate::error::PcdError;
use crate::roi::PointClassifier;

/// Running minimum and maximum of the z coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HeightRange {
    /// Smallest z seen, or the seed.
    pub min: f32,
    /// Largest z seen, or the seed.
    pub max: f32,
}

impl HeightRange {
    /// Start a range at zero, or empty so the first value sets both ends.
    pub fn seeded(at_zero: bool) -> Self {
        if at_zero {
            Self { min: 0.0, max: 0.0 }
        } else {
            Self {
                min: f32::INFINITY,
                max: f32::NEG_INFINITY,
            }
        }
    }

    /// Extend the range with a value.
    #[inline]
    pub fn update(&mut self, z: f32) {
        if z < self.min {
            self.min = z;
        }
        if z > self.max {
            self.max = z;
        }
    }

    /// True if the range has no positive finite extent.
    pub fn is_degenerate(&self) -> bool {
        let span = self.max - self.min;
        !(span.is_finite() && span > 0.0)
    }

    /// Map `z` into [0, 1] relative to the range, or `fallback` when degenerate.
    #[inline]
    pub fn normalize(&self, z: f32, fallback: f32) -> f32 {
        if self.is_degenerate() {
            fallback
        } else {
            (z - self.min) / (self.max - self.min)
        }
    }
}

/// Points decoded from a PCD body, with their colors.
#[derive(Debug, Clone)]
pub struct DecodedPoints {
    /// Interleaved x, y, z of every emitted point.
    pub positions: Vec<f32>,
    /// Interleaved r, g, b in [0, 1] of every emitted point.
    pub colors: Vec<f32>,
    /// Records kept by the stride, including those without usable coordinates.
    pub points_scanned: usize,
    /// Observed z range.
    pub height_range: HeightRange,
    /// True if the z range was empty and the fallback height was used.
    pub degenerate_height: bool,
}

impl DecodedPoints {
    /// Number of emitted points.
    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len() / 3
    }

    /// Check if no point was emitted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Raw coordinates collected during the scan pass.
struct Scan {
    points: Vec<[f32; 3]>,
    scanned: usize,
    range: HeightRange,
}

impl Scan {
    fn new(capacity: usize, seed_at_zero: bool) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            scanned: 0,
            range: HeightRange::seeded(seed_at_zero),
        }
    }

    #[inline]
    fn push(&mut self, point: [f32; 3]) {
        // non-finite coordinates (e.g. NaN of organized clouds) carry no geometry
        if point.iter().all(|v| v.is_finite()) {
            self.range.update(point[2]);
            self.points.push(point);
        }
    }
}

fn xyz_fields(header: &PcdHeader) -> Option<[&PcdField; 3]> {
    match (header.field("x"), header.field("y"), header.field("z")) {
        (Some(x), Some(y), Some(z)) => Some([x, y, z]),
        _ => None,
    }
}

fn scan_ascii(body: &[u8], header: &PcdHeader, config: &DecoderConfig) -> Scan {
    let text = String::from_utf8_lossy(body);
    let columns = xyz_fields(header).map(|f| f.map(|field| field.offset));

    // a record takes at least two bytes, do not trust POINTS for the allocation
    let capacity = (header.points / config.stride + 1).min(body.len() / 2 + 1);
    let mut scan = Scan::new(capacity, config.seed_height_at_zero);
    let mut tokens: Vec<&str> = Vec::new();

    // NOTE: the stride counts raw lines, blank ones included. Only empty lines
    // are skipped, a whitespace-only line is scanned and yields no point.
    for (i, line) in text.split('\n').enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() || i % config.stride != 0 {
            continue;
        }
        scan.scanned += 1;

        let Some([cx, cy, cz]) = columns else {
            continue;
        };
        tokens.clear();
        tokens.extend(line.split_whitespace());

        let value = |col: usize| tokens.get(col).and_then(|v| v.parse::<f32>().ok());
        if let (Some(x), Some(y), Some(z)) = (value(cx), value(cy), value(cz)) {
            scan.push([x, y, z]);
        }
    }

    scan
}

fn is_supported_scalar(field: &PcdField) -> bool {
    matches!(
        (field.kind, field.size),
        ('F', 4 | 8) | ('U' | 'I', 1 | 2 | 4 | 8)
    )
}

/// Read a little-endian scalar of the field's type at the field's offset.
#[inline]
fn read_scalar(row: &[u8], field: &PcdField) -> Option<f32> {
    let bytes = row.get(field.offset..field.offset + field.size)?;
    let value = match (field.kind, field.size) {
        ('F', 4) => f32::from_le_bytes(bytes.try_into().ok()?),
        ('F', 8) => f64::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('U', 1) => bytes[0] as f32,
        ('I', 1) => bytes[0] as i8 as f32,
        ('U', 2) => u16::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('I', 2) => i16::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('U', 4) => u32::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('I', 4) => i32::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('U', 8) => u64::from_le_bytes(bytes.try_into().ok()?) as f32,
        ('I', 8) => i64::from_le_bytes(bytes.try_into().ok()?) as f32,
        _ => return None,
    };
    Some(value)
}

fn scan_binary(body: &[u8], header: &PcdHeader, config: &DecoderConfig) -> Result<Scan, PcdError> {
    let fields = xyz_fields(header);
    if let Some(f) = fields.iter().flatten().find(|f| !is_supported_scalar(f)) {
        return Err(PcdError::malformed(format!(
            "field '{}' has unsupported type {}{}",
            f.name, f.kind, f.size
        )));
    }

    let expected = header
        .points
        .checked_mul(header.row_size)
        .ok_or_else(|| PcdError::malformed("POINTS * record size overflows"))?;
    if body.len() < expected {
        return Err(PcdError::TruncatedData {
            expected,
            actual: body.len(),
        });
    }

    let mut scan = Scan::new(header.points / config.stride + 1, config.seed_height_at_zero);

    for (i, row) in body[..expected].chunks_exact(header.row_size).enumerate() {
        if i % config.stride != 0 {
            continue;
        }
        scan.scanned += 1;

        let Some([fx, fy, fz]) = fields else {
            continue;
        };
        if let (Some(x), Some(y), Some(z)) =
            (read_scalar(row, fx), read_scalar(row, fy), read_scalar(row, fz))
        {
            scan.push([x, y, z]);
        }
    }

    Ok(scan)
}

/// Decode the records that follow a parsed header.
///
/// Records are downsampled by `config.stride`. Every kept point is colored by
/// its normalized height, then painted with the highlight color if `rois`
/// classifies it as inside and highlighting is enabled.
///
/// # Arguments
///
/// * `data` - The complete file contents, header included.
/// * `header` - The header parsed from `data`.
/// * `config` - Decoding parameters.
/// * `lut` - Color table used for height coloring.
/// * `rois` - Classifier used for highlighting.
///
/// # Returns
///
/// The decoded points, or [`PcdError::UnsupportedEncoding`] for compressed data.
pub fn decode_body<C: PointClassifier + ?Sized>(
    data: &[u8],
    header: &PcdHeader,
    config: &DecoderConfig,
    lut: &ColorLut,
    rois: &C,
) -> Result<DecodedPoints, PcdError> {
    config.validate()?;

    let body = data.get(header.header_len..).unwrap_or_default();
    let scan = match header.encoding {
        DataEncoding::Ascii => scan_ascii(body, header, config),
        DataEncoding::Binary => scan_binary(body, header, config)?,
        DataEncoding::BinaryCompressed => {
            return Err(PcdError::UnsupportedEncoding(
                "binary_compressed PCD files are not supported".to_string(),
            ))
        }
    };

    let Scan {
        points,
        scanned,
        range,
    } = scan;

    let degenerate_height = !points.is_empty() && range.is_degenerate();
    if degenerate_height && config.color_by_height {
        log::warn!(
            "z range [{}, {}] is empty, using normalized height {}",
            range.min,
            range.max,
            config.degenerate_height
        );
    }

    let mut positions = Vec::with_capacity(points.len() * 3);
    let mut colors = Vec::with_capacity(points.len() * 3);

    for point in points.iter() {
        let mut color = if config.color_by_height {
            lut.lookup(range.normalize(point[2], config.degenerate_height))
        } else {
            [1.0, 1.0, 1.0]
        };
        if config.highlight_rois && rois.classify(*point) {
            color = config.highlight_color;
        }
        positions.extend_from_slice(point);
        colors.extend_from_slice(&color);
    }

    log::debug!(
        "decoded {} of {} scanned records, z in [{}, {}]",
        points.len(),
        scanned,
        range.min,
        range.max
    );

    Ok(DecodedPoints {
        positions,
        colors,
        points_scanned: scanned,
        height_range: range,
        degenerate_height,
    })
}

/// Parse the header and decode the body of a PCD file in one call.
pub fn decode_pcd<C: PointClassifier + ?Sized>(
    data: &[u8],
    config: &DecoderConfig,
    rois: &C,
) -> Result<(PcdHeader, DecodedPoints), PcdError> {
    let header = parse_header(data)?;
    let lut = ColorLut::new(config.palette, config.lut_stops)?;
    let points = decode_body(data, &header, config, &lut, rois)?;
    Ok((header, points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roi::{Roi, RoiSet};
    use approx::assert_relative_eq;

    const SCENARIO: &str = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nCOUNT 1 1 1\nWIDTH 3\nHEIGHT 1\nDATA ascii\n0 0 0\n1 1 5\n2 2 10";

    fn stride_one() -> DecoderConfig {
        DecoderConfig::default().with_stride(1)
    }

    #[test]
    fn decodes_scenario_heights() -> Result<(), PcdError> {
        let (_, decoded) = decode_pcd(SCENARIO.as_bytes(), &stride_one(), &RoiSet::default())?;
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.points_scanned, 3);
        assert_eq!(decoded.height_range, HeightRange { min: 0.0, max: 10.0 });
        assert!(!decoded.degenerate_height);

        let heights: Vec<f32> = decoded
            .positions
            .chunks_exact(3)
            .map(|p| decoded.height_range.normalize(p[2], 0.0))
            .collect();
        assert_eq!(heights, vec![0.0, 0.5, 1.0]);

        let lut = ColorLut::default();
        assert_eq!(&decoded.colors[0..3], &lut.lookup(0.0));
        assert_eq!(&decoded.colors[3..6], &lut.lookup(0.5));
        assert_eq!(&decoded.colors[6..9], &lut.lookup(1.0));
        assert_eq!(decoded.positions, vec![0.0, 0.0, 0.0, 1.0, 1.0, 5.0, 2.0, 2.0, 10.0]);
        Ok(())
    }

    #[test]
    fn stride_keeps_every_nth_line() -> Result<(), PcdError> {
        let mut text = String::from("FIELDS x y z\nDATA ascii\n");
        for i in 0..10 {
            text.push_str(&format!("{i} 0 {i}\n"));
        }
        let config = DecoderConfig::default().with_stride(3);
        let (_, decoded) = decode_pcd(text.as_bytes(), &config, &RoiSet::default())?;
        // lines 0, 3, 6, 9
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded.positions[9], 9.0);
        Ok(())
    }

    #[test]
    fn blank_lines_consume_stride_slots() -> Result<(), PcdError> {
        let text = "FIELDS x y z\nDATA ascii\n1 1 1\n\n2 2 2\n3 3 3\n";
        let config = DecoderConfig::default().with_stride(2);
        let (_, decoded) = decode_pcd(text.as_bytes(), &config, &RoiSet::default())?;
        // index 0 kept, index 2 kept, index 1 is blank
        assert_eq!(decoded.positions, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn whitespace_line_is_scanned_without_point() -> Result<(), PcdError> {
        let text = "FIELDS x y z\r\nDATA ascii\r\n1 1 1\r\n\r\n  \t\r\n2 2 2\r\n";
        let (_, decoded) = decode_pcd(text.as_bytes(), &stride_one(), &RoiSet::default())?;
        assert_eq!(decoded.points_scanned, 3);
        assert_eq!(decoded.positions, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        Ok(())
    }

    #[test]
    fn missing_xyz_counts_but_emits_nothing() -> Result<(), PcdError> {
        let text = "FIELDS intensity\nDATA ascii\n1\n2\n3\n";
        let (_, decoded) = decode_pcd(text.as_bytes(), &stride_one(), &RoiSet::default())?;
        assert_eq!(decoded.points_scanned, 3);
        assert!(decoded.is_empty());

        let partial = "FIELDS x y z\nDATA ascii\n1 2\n1 2 3\nfoo 1 1\n";
        let (_, decoded) = decode_pcd(partial.as_bytes(), &stride_one(), &RoiSet::default())?;
        assert_eq!(decoded.points_scanned, 3);
        assert_eq!(decoded.len(), 1);
        Ok(())
    }

    #[test]
    fn flat_cloud_uses_fallback_height() -> Result<(), PcdError> {
        let text = "FIELDS x y z\nDATA ascii\n0 0 0\n1 0 0\n2 0 0\n";
        let config = stride_one().with_degenerate_height(0.5);
        let (_, decoded) = decode_pcd(text.as_bytes(), &config, &RoiSet::default())?;
        assert!(decoded.degenerate_height);
        assert!(decoded.colors.iter().all(|c| c.is_finite()));

        let mid = ColorLut::default().lookup(0.5);
        for color in decoded.colors.chunks_exact(3) {
            assert_eq!(color, &mid);
        }
        Ok(())
    }

    #[test]
    fn seed_at_zero_clamps_positive_range() -> Result<(), PcdError> {
        let text = "FIELDS x y z\nDATA ascii\n0 0 4\n0 0 8\n";
        let (_, seeded) = decode_pcd(text.as_bytes(), &stride_one(), &RoiSet::default())?;
        assert_eq!(seeded.height_range, HeightRange { min: 0.0, max: 8.0 });

        let config = stride_one().with_seed_height_at_zero(false);
        let (_, observed) = decode_pcd(text.as_bytes(), &config, &RoiSet::default())?;
        assert_eq!(observed.height_range, HeightRange { min: 4.0, max: 8.0 });
        assert_eq!(&observed.colors[0..3], &ColorLut::default().lookup(0.0));
        Ok(())
    }

    #[test]
    fn highlights_points_in_rois() -> Result<(), PcdError> {
        let rois = RoiSet::new(vec![Roi::from_center_and_size([1.0, 1.0, 5.0], [1.0; 3])]);
        let config = stride_one().with_highlight(true);
        let (_, decoded) = decode_pcd(SCENARIO.as_bytes(), &config, &rois)?;
        assert_eq!(&decoded.colors[3..6], &[1.0, 0.0, 0.0]);
        assert_ne!(&decoded.colors[0..3], &[1.0, 0.0, 0.0]);

        let plain = stride_one().with_color_by_height(false);
        let (_, decoded) = decode_pcd(SCENARIO.as_bytes(), &plain, &rois)?;
        assert!(decoded.colors.iter().all(|&c| c == 1.0));
        Ok(())
    }

    #[test]
    fn rejects_binary_compressed() {
        let data = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 1\nDATA binary_compressed\n\x00\x00\x00\x00";
        let res = decode_pcd(data, &stride_one(), &RoiSet::default());
        assert!(matches!(res, Err(PcdError::UnsupportedEncoding(_))));
    }

    #[test]
    fn decodes_binary_records() -> Result<(), PcdError> {
        let mut data = b"FIELDS x y z intensity\nSIZE 4 4 4 2\nTYPE F F F U\nPOINTS 3\nDATA binary\n".to_vec();
        for p in [[0.0f32, 0.0, 0.0], [1.0, 1.0, 5.0], [2.0, 2.0, 10.0]] {
            for v in p {
                data.extend_from_slice(&v.to_le_bytes());
            }
            data.extend_from_slice(&7u16.to_le_bytes());
        }

        let (header, decoded) = decode_pcd(&data, &stride_one(), &RoiSet::default())?;
        assert_eq!(header.row_size, 14);
        assert_eq!(decoded.positions, vec![0.0, 0.0, 0.0, 1.0, 1.0, 5.0, 2.0, 2.0, 10.0]);
        assert_relative_eq!(decoded.height_range.max, 10.0);
        Ok(())
    }

    #[test]
    fn reads_binary_integer_and_double_fields() -> Result<(), PcdError> {
        let mut data = b"FIELDS x y z\nSIZE 8 2 1\nTYPE F I U\nPOINTS 1\nDATA binary\n".to_vec();
        data.extend_from_slice(&1.5f64.to_le_bytes());
        data.extend_from_slice(&(-3i16).to_le_bytes());
        data.push(200);

        let (_, decoded) = decode_pcd(&data, &stride_one(), &RoiSet::default())?;
        assert_eq!(decoded.positions, vec![1.5, -3.0, 200.0]);
        Ok(())
    }

    #[test]
    fn decodes_padded_binary_rows() -> Result<(), PcdError> {
        let mut data = b"FIELDS x y z _ rgb _\nSIZE 4 4 4 1 4 1\nTYPE F F F U U U\nCOUNT 1 1 1 4 1 12\nWIDTH 1\nHEIGHT 1\nDATA binary\n".to_vec();
        for v in [1.0f32, 2.0, 3.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        data.extend_from_slice(&[0u8; 4]);
        data.extend_from_slice(&0x00FF0000u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 12]);

        let (header, decoded) = decode_pcd(&data, &stride_one(), &RoiSet::default())?;
        assert_eq!(header.row_size, 32);
        assert_eq!(decoded.positions, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn rejects_truncated_binary() {
        let mut data = b"FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nPOINTS 2\nDATA binary\n".to_vec();
        data.extend_from_slice(&[0u8; 12]);
        let res = decode_pcd(&data, &stride_one(), &RoiSet::default());
        assert!(matches!(
            res,
            Err(PcdError::TruncatedData {
                expected: 24,
                actual: 12
            })
        ));
    }

    #[test]
    fn rejects_invalid_stride() {
        let config = DecoderConfig::default().with_stride(0);
        let res = decode_pcd(SCENARIO.as_bytes(), &config, &RoiSet::default());
        assert!(matches!(res, Err(PcdError::InvalidConfig(_))));
    }
}
