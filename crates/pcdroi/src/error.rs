/// Error types for loading and decoding PCD files.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PcdError {
    /// The byte source could not deliver the file.
    #[error("Failed to fetch PCD file from {location}. {source}")]
    FetchFailure {
        /// Location handed to the byte source.
        location: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Required header tokens are missing or could not be parsed.
    #[error("Malformed PCD header: {0}")]
    MalformedHeader(String),

    /// The data encoding is recognized but cannot be decoded.
    #[error("Unsupported PCD data encoding: {0}")]
    UnsupportedEncoding(String),

    /// The binary body is shorter than the header announces.
    #[error("PCD body is truncated. Expected {expected} bytes, got {actual}")]
    TruncatedData {
        /// Number of bytes the header requires.
        expected: usize,
        /// Number of bytes available after the header.
        actual: usize,
    },

    /// The requested color palette does not exist.
    #[error("Unknown color palette: {0}")]
    UnknownPalette(String),

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PcdError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        PcdError::MalformedHeader(reason.into())
    }
}
