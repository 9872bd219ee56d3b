mod decoder;
mod header;

pub use decoder::*;
pub use header::*;
