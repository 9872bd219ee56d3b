#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Color lookup tables for height coloring.
pub mod color;

/// Decoder and loader configuration.
pub mod config;

/// Error types for loading and decoding.
pub mod error;

/// Output buffers, ROI outlines and bounding spheres.
pub mod geometry;

/// I/O utilities for reading point cloud files.
pub mod io;

/// Fetching and decoding of PCD files.
pub mod loader;

/// Regions of interest and their classification.
pub mod roi;

/// Viewer state carried across loads.
pub mod session;

pub use error::PcdError;
