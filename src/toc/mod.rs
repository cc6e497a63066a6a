//! Table-of-contents types and the decoder seam.

mod decoder;
mod types;

pub use decoder::*;
pub use types::*;
