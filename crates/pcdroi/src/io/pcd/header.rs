use std::str::FromStr;

use crate::error::PcdError;

/// Upper bound for the size of one binary record.
const MAX_ROW_SIZE: usize = 1024;

/// Name PCL gives to padding fields, which may repeat.
const PADDING_FIELD: &str = "_";

/// Encoding of the records that follow the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataEncoding {
    /// Whitespace separated text records, one per line.
    Ascii,
    /// Fixed-size little-endian records.
    Binary,
    /// LZF compressed column-major records. Recognized but never decoded.
    BinaryCompressed,
}

impl DataEncoding {
    /// Parse the token that follows `DATA` in the header.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "ascii" => Some(DataEncoding::Ascii),
            "binary" => Some(DataEncoding::Binary),
            "binary_compressed" => Some(DataEncoding::BinaryCompressed),
            _ => None,
        }
    }

    /// The canonical header token of the encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataEncoding::Ascii => "ascii",
            DataEncoding::Binary => "binary",
            DataEncoding::BinaryCompressed => "binary_compressed",
        }
    }
}

impl std::fmt::Display for DataEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes a single field in a PCD point record.
#[derive(Debug, Clone, PartialEq)]
pub struct PcdField {
    /// Field name as listed by `FIELDS`.
    pub name: String,
    /// Size of one element in bytes.
    pub size: usize,
    /// PCD type code: 'F' = float, 'U' = unsigned int, 'I' = signed int.
    pub kind: char,
    /// Number of elements.
    pub count: usize,
    /// Column index for ASCII data, byte offset within a row otherwise.
    pub offset: usize,
}

/// Sensor acquisition viewpoint: translation followed by a (w, x, y, z) quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewpoint {
    /// Translation (tx, ty, tz).
    pub translation: [f32; 3],
    /// Orientation quaternion (qw, qx, qy, qz).
    pub orientation: [f32; 4],
}

impl Default for Viewpoint {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            orientation: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Metadata parsed from the textual preamble of a PCD file.
///
/// The per-field sequences (`SIZE`, `TYPE`, `COUNT`) are stored together in
/// [`PcdField`] so they always have the same length as `FIELDS`.
#[derive(Debug, Clone)]
pub struct PcdHeader {
    /// File format version, if declared.
    pub version: Option<f32>,
    /// Fields in declaration order.
    pub fields: Vec<PcdField>,
    /// Declared width of the cloud.
    pub width: usize,
    /// Declared height of the cloud.
    pub height: usize,
    /// Acquisition viewpoint, if declared.
    pub viewpoint: Option<Viewpoint>,
    /// Explicit `POINTS` value, else `width * height`.
    pub points: usize,
    /// Encoding of the body.
    pub encoding: DataEncoding,
    /// Bytes per record. Zero for ASCII data.
    pub row_size: usize,
    /// Number of bytes up to and including the `DATA` line.
    pub header_len: usize,
}

impl PcdHeader {
    /// Look up a field by name. The first field wins when a name repeats.
    pub fn field(&self, name: &str) -> Option<&PcdField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Column index (ASCII) or byte offset (binary) of a field.
    pub fn offset(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.offset)
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Header lines with comments stripped, plus what was learned from the `DATA` line.
struct RawHeader {
    lines: Vec<String>,
    encoding_token: String,
    header_len: usize,
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn split_header(data: &[u8]) -> Result<RawHeader, PcdError> {
    let mut lines = Vec::new();
    let mut start = 0usize;

    while start < data.len() {
        let end = data[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |pos| start + pos + 1);

        let line = String::from_utf8_lossy(&data[start..end]);
        let content = strip_comment(&line).trim();

        let mut tokens = content.split_whitespace();
        if tokens
            .next()
            .is_some_and(|key| key.eq_ignore_ascii_case("DATA"))
        {
            let token = tokens
                .next()
                .ok_or_else(|| PcdError::malformed("DATA line has no encoding"))?;
            return Ok(RawHeader {
                lines,
                encoding_token: token.to_string(),
                header_len: end,
            });
        }

        if !content.is_empty() {
            lines.push(content.to_string());
        }
        start = end;
    }

    Err(PcdError::malformed("missing DATA line"))
}

fn has_fields(lines: &[String]) -> bool {
    lines.iter().any(|line| {
        let mut it = line.split_whitespace();
        it.next().is_some_and(|key| key.eq_ignore_ascii_case("FIELDS")) && it.next().is_some()
    })
}

fn parse_scalar<T: FromStr>(key: &str, values: &[&str]) -> Result<T, PcdError> {
    let token = values
        .first()
        .ok_or_else(|| PcdError::malformed(format!("{key} has no value")))?;
    token
        .parse::<T>()
        .map_err(|_| PcdError::malformed(format!("{key} value '{token}' is not a number")))
}

fn parse_list<T: FromStr>(key: &str, values: &[&str]) -> Result<Vec<T>, PcdError> {
    values
        .iter()
        .map(|v| {
            v.parse::<T>()
                .map_err(|_| PcdError::malformed(format!("{key} value '{v}' is not a number")))
        })
        .collect()
}

fn parse_type(value: &str) -> Result<char, PcdError> {
    let mut chars = value.chars();
    match (chars.next().map(|c| c.to_ascii_uppercase()), chars.next()) {
        (Some(kind @ ('F' | 'I' | 'U')), None) => Ok(kind),
        _ => Err(PcdError::malformed(format!("unknown TYPE '{value}'"))),
    }
}

fn parse_viewpoint(values: &[&str]) -> Result<Viewpoint, PcdError> {
    let v: Vec<f32> = parse_list("VIEWPOINT", values)?;
    if v.len() != 7 {
        return Err(PcdError::malformed(format!(
            "VIEWPOINT expects 7 values, got {}",
            v.len()
        )));
    }
    Ok(Viewpoint {
        translation: [v[0], v[1], v[2]],
        orientation: [v[3], v[4], v[5], v[6]],
    })
}

/// Parse the header of a PCD file.
///
/// The header ends with the first `DATA <encoding>` line. Keys are matched
/// case-insensitively at the start of each line and `#` comments are ignored.
/// When a key is repeated, its first occurrence wins.
///
/// # Arguments
///
/// * `data` - The raw file contents. Only the header part is inspected.
///
/// # Returns
///
/// The parsed header, or [`PcdError::MalformedHeader`] when the `DATA` line or
/// the `FIELDS` line is missing, or when a value cannot be parsed.
/// `binary_compressed` data is [`PcdError::UnsupportedEncoding`].
pub fn parse_header(data: &[u8]) -> Result<PcdHeader, PcdError> {
    let raw = split_header(data)?;

    let encoding = DataEncoding::from_token(&raw.encoding_token).ok_or_else(|| {
        PcdError::malformed(format!("unknown DATA encoding '{}'", raw.encoding_token))
    })?;

    // compressed bodies are refused whatever the rest of the layout says
    if encoding == DataEncoding::BinaryCompressed {
        return Err(if has_fields(&raw.lines) {
            PcdError::UnsupportedEncoding("binary_compressed PCD files are not supported".into())
        } else {
            PcdError::malformed("missing FIELDS")
        });
    }

    let mut version = None;
    let mut names: Option<Vec<String>> = None;
    let mut sizes: Option<Vec<usize>> = None;
    let mut types: Option<Vec<char>> = None;
    let mut counts: Option<Vec<usize>> = None;
    let mut width = None;
    let mut height = None;
    let mut viewpoint = None;
    let mut points = None;

    for line in raw.lines.iter() {
        let mut it = line.split_whitespace();
        let Some(key) = it.next() else {
            continue;
        };
        let values: Vec<&str> = it.collect();

        match key.to_ascii_uppercase().as_str() {
            "VERSION" if version.is_none() => {
                version = Some(parse_scalar::<f32>("VERSION", &values)?);
            }
            "FIELDS" if names.is_none() => {
                names = Some(values.iter().map(|v| v.to_string()).collect());
            }
            "SIZE" if sizes.is_none() => sizes = Some(parse_list("SIZE", &values)?),
            "TYPE" if types.is_none() => {
                types = Some(
                    values
                        .iter()
                        .map(|v| parse_type(v))
                        .collect::<Result<Vec<_>, _>>()?,
                );
            }
            "COUNT" if counts.is_none() => counts = Some(parse_list("COUNT", &values)?),
            "WIDTH" if width.is_none() => width = Some(parse_scalar::<usize>("WIDTH", &values)?),
            "HEIGHT" if height.is_none() => {
                height = Some(parse_scalar::<usize>("HEIGHT", &values)?)
            }
            "VIEWPOINT" if viewpoint.is_none() => viewpoint = Some(parse_viewpoint(&values)?),
            "POINTS" if points.is_none() => {
                points = Some(parse_scalar::<usize>("POINTS", &values)?)
            }
            _ => {}
        }
    }

    let names = names
        .filter(|n| !n.is_empty())
        .ok_or_else(|| PcdError::malformed("missing FIELDS"))?;
    let num_fields = names.len();

    let (sizes, types) = match (sizes, types) {
        (Some(sizes), Some(types)) => (sizes, types),
        (sizes, types) if encoding == DataEncoding::Ascii => (
            sizes.unwrap_or_else(|| vec![4; num_fields]),
            types.unwrap_or_else(|| vec!['F'; num_fields]),
        ),
        _ => {
            return Err(PcdError::malformed(format!(
                "{encoding} data requires SIZE and TYPE"
            )))
        }
    };
    // If COUNT is omitted, every field holds a single element
    let counts = counts.unwrap_or_else(|| vec![1; num_fields]);

    for (key, len) in [
        ("SIZE", sizes.len()),
        ("TYPE", types.len()),
        ("COUNT", counts.len()),
    ] {
        if len != num_fields {
            return Err(PcdError::malformed(format!(
                "{key} has {len} entries but FIELDS has {num_fields}"
            )));
        }
    }

    let mut offset = 0usize;
    let mut fields: Vec<PcdField> = Vec::with_capacity(num_fields);

    for (((name, size), kind), count) in names.into_iter().zip(sizes).zip(types).zip(counts) {
        if count == 0 {
            return Err(PcdError::malformed(format!("field '{name}' has COUNT 0")));
        }
        // PCL pads records with repeated `_` fields
        if name != PADDING_FIELD && fields.iter().any(|f| f.name == name) {
            return Err(PcdError::malformed(format!("duplicate field '{name}'")));
        }

        // ASCII offsets count columns, binary offsets count bytes
        let span = match encoding {
            DataEncoding::Ascii => count,
            DataEncoding::Binary | DataEncoding::BinaryCompressed => {
                if size == 0 {
                    return Err(PcdError::malformed(format!("field '{name}' has SIZE 0")));
                }
                size
                    .checked_mul(count)
                    .ok_or_else(|| PcdError::malformed("record size overflow"))?
            }
        };

        fields.push(PcdField {
            name,
            size,
            kind,
            count,
            offset,
        });

        offset = offset
            .checked_add(span)
            .ok_or_else(|| PcdError::malformed("record size overflow"))?;
    }

    let row_size = match encoding {
        DataEncoding::Ascii => 0,
        _ => offset,
    };
    if row_size > MAX_ROW_SIZE {
        return Err(PcdError::malformed(format!(
            "record size {row_size} exceeds {MAX_ROW_SIZE} bytes"
        )));
    }

    let width = width.unwrap_or(0);
    let height = height.unwrap_or(0);
    let points = match points {
        Some(points) => points,
        None => width
            .checked_mul(height)
            .ok_or_else(|| PcdError::malformed("WIDTH * HEIGHT overflows"))?,
    };

    Ok(PcdHeader {
        version,
        fields,
        width,
        height,
        viewpoint,
        points,
        encoding,
        row_size,
        header_len: raw.header_len,
    })
}
