//! Resource limits for untrusted APNG input.
//!
//! An APNG stream can declare a huge canvas, carry thousands of frames and
//! keep growing while it streams in, and a session caches one composited
//! canvas per frame on top of the decoded frame pixels. [`Limits`] bounds
//! each of these:
//!
//! | Limit | Checked when |
//! |---|---|
//! | `max_width`, `max_height`, `max_total_pixels` | the `IHDR` is parsed |
//! | `max_input_size` | bytes are appended |
//! | `max_frame_count` | a frame is demuxed |
//! | `max_memory` | the `IHDR` is parsed, and after every cache insertion |
//!
//! `max_memory` is a budget for the whole pixel cache of a session, not for a
//! single allocation: once it is exceeded the session evicts cached state it
//! can rebuild later.

use super::error::DecodeError;

fn within(what: &str, value: u64, max: Option<u64>) -> Result<(), DecodeError> {
    match max {
        Some(max) if value > max => Err(DecodeError::LimitExceeded(format!(
            "{} {} exceeds limit {}",
            what, value, max
        ))),
        _ => Ok(()),
    }
}

/// Bounds on what one session may demux, decode and cache.
///
/// `None` disables a bound.
///
/// ```rust
/// use zenapng::Limits;
///
/// // A thumbnailer: small canvases, a short prefix of the animation and a
/// // cache of at most 16 MiB.
/// let limits = Limits::default()
///     .max_dimensions(1024, 1024)
///     .max_frame_count(50)
///     .max_memory(16 << 20);
/// assert!(limits.check_dimensions(1024, 768).is_ok());
/// assert_eq!(limits.memory_excess(20 << 20), 4 << 20);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Limits {
    /// Widest accepted canvas.
    pub max_width: Option<u32>,
    /// Tallest accepted canvas.
    pub max_height: Option<u32>,
    /// Largest accepted canvas area, for odd aspect ratios.
    pub max_total_pixels: Option<u64>,
    /// Frames demuxed before the stream is treated as ended.
    pub max_frame_count: Option<u64>,
    /// Total bytes accepted by [`append`](crate::AnimationSession::append).
    pub max_input_size: Option<u64>,
    /// Bytes of cached canvases plus decoded frame pixels.
    pub max_memory: Option<u64>,
}

impl Default for Limits {
    /// Bounds for untrusted input: 16384 x 16384 and 100 megapixels per
    /// canvas, 10,000 frames, 100 MiB of input and a 1 GiB pixel cache.
    fn default() -> Self {
        Self {
            max_width: Some(16384),
            max_height: Some(16384),
            max_total_pixels: Some(100_000_000),
            max_frame_count: Some(10_000),
            max_input_size: Some(100 << 20),
            max_memory: Some(1 << 30),
        }
    }
}

impl Limits {
    /// No bounds at all. Only for trusted input.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_width: None,
            max_height: None,
            max_total_pixels: None,
            max_frame_count: None,
            max_input_size: None,
            max_memory: None,
        }
    }

    /// Bound the canvas extent.
    #[must_use]
    pub fn max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    /// Bound the canvas area.
    #[must_use]
    pub fn max_total_pixels(mut self, pixels: u64) -> Self {
        self.max_total_pixels = Some(pixels);
        self
    }

    /// Stop demuxing after `count` frames.
    #[must_use]
    pub fn max_frame_count(mut self, count: u64) -> Self {
        self.max_frame_count = Some(count);
        self
    }

    /// Bound the total input size.
    #[must_use]
    pub fn max_input_size(mut self, bytes: u64) -> Self {
        self.max_input_size = Some(bytes);
        self
    }

    /// Bound the pixel cache of a session.
    #[must_use]
    pub fn max_memory(mut self, bytes: u64) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Check the canvas extent declared by `IHDR`.
    pub fn check_dimensions(&self, width: u32, height: u32) -> Result<(), DecodeError> {
        within("canvas width", u64::from(width), self.max_width.map(u64::from))?;
        within("canvas height", u64::from(height), self.max_height.map(u64::from))?;
        within(
            "canvas area",
            u64::from(width) * u64::from(height),
            self.max_total_pixels,
        )
    }

    /// Check whether frame number `demuxed` (zero-based, so `demuxed` frames
    /// exist already) may be added.
    ///
    /// Besides `max_frame_count`, a stream never yields more frames than its
    /// `acTL` declares; frame controls past that count are not part of the
    /// animation.
    pub fn check_frame_count(&self, demuxed: usize, declared: Option<u32>) -> Result<(), DecodeError> {
        let demuxed = demuxed as u64;
        if let Some(declared) = declared {
            if demuxed >= u64::from(declared) {
                return Err(DecodeError::LimitExceeded(format!(
                    "frame {} is past the {} frames declared by acTL",
                    demuxed, declared
                )));
            }
        }
        within("frame count", demuxed.saturating_add(1), self.max_frame_count)
    }

    /// Check the input size after an append.
    pub fn check_input_size(&self, size: u64) -> Result<(), DecodeError> {
        within("input size", size, self.max_input_size)
    }

    /// Check that one canvas of `bytes` fits the cache budget at all.
    pub fn check_memory(&self, bytes: usize) -> Result<(), DecodeError> {
        match self.max_memory {
            Some(max) if bytes as u64 > max => Err(DecodeError::MemoryLimitExceeded),
            _ => Ok(()),
        }
    }

    /// How many bytes a cache holding `cached` bytes must release to fit the
    /// budget. Zero when it fits or the budget is unbounded.
    pub fn memory_excess(&self, cached: usize) -> usize {
        self.max_memory.map_or(0, |max| {
            (cached as u64).saturating_sub(max).try_into().unwrap_or(usize::MAX)
        })
    }
}
