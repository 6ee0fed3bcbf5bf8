//! Splitting an APNG stream into self-contained PNG sub-streams.
//!
//! [`extract_header`] copies the preamble every frame needs, and
//! [`demux_next_image`] cuts one image at a time from a chunk cursor.
//! Control chunks are parsed in [`control`](self) types.

mod control;
mod demuxer;

pub use control::{
    AnimationControl, BlendMode, DisposeMethod, FrameControl, FrameInfo, ImageHeader, LoopCount,
    Rect,
};
pub use demuxer::{
    demux_next_image, extract_header, resolve_required_frame, DemuxStep, DemuxedImage,
    StreamHeader,
};
