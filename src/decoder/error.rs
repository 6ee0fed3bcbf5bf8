use thiserror::Error;

use super::still::ColorInfo;
use crate::composite::PixelFormat;

/// Errors that can occur while demuxing, decoding or compositing an APNG.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The 8-byte PNG signature was not found.
    #[error("Invalid PNG signature")]
    InvalidSignature,

    /// A fixed-size structure ended before all of its fields were read.
    #[error("Unexpected end of data")]
    Truncated,

    /// A required chunk was missing.
    #[error("Missing {0} chunk")]
    ChunkMissing(&'static str),

    /// A chunk had an invalid size or contents.
    #[error("Invalid chunk: {0:x?}")]
    InvalidChunk([u8; 4]),

    /// A frame control chunk carried an illegal value.
    #[error("Invalid frame control: {0}")]
    InvalidFrameControl(String),

    /// A frame rectangle does not fit the canvas.
    #[error(
        "Frame at ({x}, {y}) size {width}x{height} exceeds canvas {canvas_width}x{canvas_height}"
    )]
    FrameOutsideCanvas {
        /// Frame x offset.
        x: u32,
        /// Frame y offset.
        y: u32,
        /// Frame width.
        width: u32,
        /// Frame height.
        height: u32,
        /// Canvas width.
        canvas_width: u32,
        /// Canvas height.
        canvas_height: u32,
    },

    /// Decoded pixels do not have the extent declared by their frame control.
    #[error("Decoded {found_width}x{found_height} pixels, expected {width}x{height}")]
    InconsistentImageSizes {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Decoded width.
        found_width: u32,
        /// Decoded height.
        found_height: u32,
    },

    /// A frame's color type or bit depth differs from the default image.
    #[error("Frame format {found:?} does not match default image format {expected:?}")]
    FormatMismatch {
        /// Format of the default image.
        expected: ColorInfo,
        /// Format of the offending frame.
        found: ColorInfo,
    },

    /// Canvas and frame pixels use different channel layouts.
    #[error("Pixel layout {frame:?} cannot be composited onto {canvas:?}")]
    LayoutMismatch {
        /// Canvas format.
        canvas: PixelFormat,
        /// Frame format.
        frame: PixelFormat,
    },

    /// The underlying PNG codec rejected a sub-stream.
    #[error("PNG decoding error: {0}")]
    Png(#[from] png::DecodingError),

    /// The stream is valid but uses something this crate does not handle.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A frame index past the frames available so far.
    #[error("Frame {index} out of bounds (available: {available})")]
    FrameOutOfBounds {
        /// The requested frame index.
        index: usize,
        /// The number of frames demuxed so far.
        available: usize,
    },

    /// A configured [`Limits`](crate::Limits) value was exceeded.
    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    /// The memory limit was exceeded.
    #[error("Memory limit exceeded")]
    MemoryLimitExceeded,
}
