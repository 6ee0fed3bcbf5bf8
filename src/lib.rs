//! Demuxing and compositing of animated PNG (APNG) images
//!
//! This crate splits an APNG stream into self-contained PNG sub-streams, one
//! per frame, decodes them with the [`png`] crate and composites them onto a
//! full-size canvas following the frame's blend and disposal rules.
//!
//! # Decoding
//!
//! Use [`AnimationSession`] for a complete buffer:
//!
//! ```rust,no_run
//! use zenapng::{AnimationSession, DecodeConfig};
//!
//! let apng: &[u8] = &[]; // your APNG data
//! let mut session = AnimationSession::from_bytes(apng, DecodeConfig::default())?;
//! let frames = session.frame_count();
//! let last = session.get_frame(frames.saturating_sub(1))?;
//! assert_eq!(Some((last.width, last.height)), session.canvas_size());
//! # Ok::<(), zenapng::DecodeError>(())
//! ```
//!
//! Or feed bytes as they arrive. The frame count grows as complete frames
//! become available:
//!
//! ```rust,no_run
//! use zenapng::{AnimationSession, DecodeConfig};
//!
//! let mut session = AnimationSession::new(DecodeConfig::default());
//! # let packets: Vec<Vec<u8>> = Vec::new();
//! for packet in packets {
//!     session.append(&packet)?;
//!     println!("{} frames so far", session.frame_count());
//! }
//! session.finish();
//! # Ok::<(), zenapng::DecodeError>(())
//! ```
//!
//! Frames may be requested in any order. Composited canvases are cached per
//! frame; [`AnimationSession::clear_cache_except_frame`] releases memory
//! without affecting the pixels later calls produce.
//!
//! # Still images
//!
//! A PNG without a valid `acTL` chunk decodes through the same pipeline as a
//! single frame without [`FrameInfo`] that plays once.
//!
//! # Safety
//!
//! This crate uses `#![forbid(unsafe_code)]`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chunk;
pub mod composite;
pub mod decoder;
pub mod demux;
pub mod registry;
pub mod session;

// Slice reader utility (used by control chunk parsing)
mod slice_reader;

pub use composite::{AlphaType, Canvas, CanvasState, FramePixels, PixelFormat, PixelLayout};
pub use decoder::{
    ColorInfo, DecodeConfig, DecodeError, Limits, PngStillDecoder, SourceColorType, StillDecoder,
};
pub use demux::{
    AnimationControl, BlendMode, DisposeMethod, FrameControl, FrameInfo, ImageHeader, LoopCount,
    Rect,
};
pub use registry::{DecoderFactory, DecoderRegistry, FrameSource};
pub use session::{AnimationSession, SessionState};
