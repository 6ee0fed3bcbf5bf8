//! Decoder-side configuration, errors and the still-image codec seam.

mod config;
mod error;
mod limits;
mod still;

pub use config::DecodeConfig;
pub use error::DecodeError;
pub use limits::Limits;
pub use still::{ColorInfo, PngStillDecoder, SourceColorType, StillDecoder};
