//! Parsing of the fixed-layout control chunks: `IHDR`, `acTL` and `fcTL`.

use core::num::NonZeroU32;

use byteorder_lite::{BigEndian, ByteOrder};

use crate::decoder::{ColorInfo, DecodeError, SourceColorType};
use crate::slice_reader::SliceReader;

const IHDR_SIZE: usize = 13;
const ACTL_SIZE: usize = 8;
const FCTL_SIZE: usize = 26;

/// Contents of an `IHDR` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHeader {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bits per sample.
    pub bit_depth: u8,
    /// Color type.
    pub color_type: SourceColorType,
    /// Compression method (always 0).
    pub compression: u8,
    /// Filter method (always 0).
    pub filter: u8,
    /// Interlace method (0 = none, 1 = Adam7).
    pub interlace: u8,
}

impl ImageHeader {
    /// Parse and validate `IHDR` data.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = SliceReader::new(data);
        if r.remaining() != IHDR_SIZE {
            return Err(DecodeError::InvalidChunk(*b"IHDR"));
        }
        let width = r.read_u32_be()?;
        let height = r.read_u32_be()?;
        let bit_depth = r.read_u8()?;
        let color_code = r.read_u8()?;
        let compression = r.read_u8()?;
        let filter = r.read_u8()?;
        let interlace = r.read_u8()?;

        let color_type =
            SourceColorType::from_code(color_code).ok_or(DecodeError::InvalidChunk(*b"IHDR"))?;
        if width == 0
            || height == 0
            || width > i32::MAX as u32
            || height > i32::MAX as u32
            || !color_type.allows_bit_depth(bit_depth)
            || compression != 0
            || filter != 0
            || interlace > 1
        {
            return Err(DecodeError::InvalidChunk(*b"IHDR"));
        }

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            compression,
            filter,
            interlace,
        })
    }

    /// Serialize back to the 13 `IHDR` data bytes.
    pub fn to_bytes(&self) -> [u8; IHDR_SIZE] {
        let mut out = [0u8; IHDR_SIZE];
        BigEndian::write_u32(&mut out[0..4], self.width);
        BigEndian::write_u32(&mut out[4..8], self.height);
        out[8] = self.bit_depth;
        out[9] = self.color_type.code();
        out[10] = self.compression;
        out[11] = self.filter;
        out[12] = self.interlace;
        out
    }

    /// The same header with a different extent, as used for frame sub-streams.
    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Color type and bit depth.
    pub fn color_info(&self) -> ColorInfo {
        ColorInfo {
            color_type: self.color_type,
            bit_depth: self.bit_depth,
        }
    }
}

/// Contents of an `acTL` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationControl {
    /// Number of frames the stream declares.
    pub num_frames: u32,
    /// Number of plays; 0 means loop forever.
    pub num_plays: u32,
}

impl AnimationControl {
    /// Parse `acTL` data.
    pub fn parse(data: &[u8]) -> Result<Self, DecodeError> {
        let mut r = SliceReader::new(data);
        if r.remaining() != ACTL_SIZE {
            return Err(DecodeError::InvalidChunk(*b"acTL"));
        }
        Ok(Self {
            num_frames: r.read_u32_be()?,
            num_plays: r.read_u32_be()?,
        })
    }

    /// Play count as a [`LoopCount`].
    pub fn loop_count(&self) -> LoopCount {
        LoopCount::from(self.num_plays)
    }
}

/// Number of times that an animation plays.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LoopCount {
    /// The animation loops forever.
    Forever,
    /// The animation plays the specified number of times.
    Times(NonZeroU32),
}

impl LoopCount {
    /// A single play, used for still images.
    pub const ONCE: Self = match NonZeroU32::new(1) {
        Some(n) => Self::Times(n),
        None => Self::Forever,
    };
}

impl core::fmt::Display for LoopCount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            LoopCount::Forever => f.write_str("infinite"),
            LoopCount::Times(n) => write!(f, "{} time{}", n, if n.get() == 1 { "" } else { "s" }),
        }
    }
}

impl From<u32> for LoopCount {
    fn from(n: u32) -> Self {
        match NonZeroU32::new(n) {
            None => LoopCount::Forever,
            Some(n) => LoopCount::Times(n),
        }
    }
}

/// How the frame area is treated before the next frame is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisposeMethod {
    /// Leave the canvas as it is.
    Keep,
    /// Clear the frame rectangle to transparent black.
    RestoreBackground,
    /// Revert the canvas to its state before this frame was drawn.
    RestorePrevious,
}

impl DisposeMethod {
    fn from_op(op: u8) -> Option<Self> {
        match op {
            0 => Some(Self::Keep),
            1 => Some(Self::RestoreBackground),
            2 => Some(Self::RestorePrevious),
            _ => None,
        }
    }
}

/// How the frame is combined with the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Overwrite the frame rectangle.
    Source,
    /// Alpha-composite the frame over the canvas.
    SourceOver,
}

impl BlendMode {
    fn from_op(op: u8) -> Option<Self> {
        match op {
            0 => Some(Self::Source),
            1 => Some(Self::SourceOver),
            _ => None,
        }
    }
}

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Build a rectangle.
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// The part of this rectangle inside a `width` x `height` canvas.
    pub fn clip_to(&self, width: u32, height: u32) -> Rect {
        let x0 = self.x.min(width);
        let y0 = self.y.min(height);
        let x1 = self.x.saturating_add(self.width).min(width);
        let y1 = self.y.saturating_add(self.height).min(height);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Contents of an `fcTL` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameControl {
    /// Position in the `fcTL`/`fdAT` sequence.
    pub sequence_number: u32,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frame x offset on the canvas.
    pub x_offset: u32,
    /// Frame y offset on the canvas.
    pub y_offset: u32,
    /// Frame delay numerator.
    pub delay_num: u16,
    /// Frame delay denominator; 0 means 100.
    pub delay_den: u16,
    /// Disposal applied after this frame.
    pub dispose: DisposeMethod,
    /// Blending used for this frame.
    pub blend: BlendMode,
}

impl FrameControl {
    /// Parse `fcTL` data and check the frame fits a `canvas_width` x
    /// `canvas_height` canvas.
    pub fn parse(data: &[u8], canvas_width: u32, canvas_height: u32) -> Result<Self, DecodeError> {
        let mut r = SliceReader::new(data);
        if r.remaining() != FCTL_SIZE {
            return Err(DecodeError::InvalidChunk(*b"fcTL"));
        }
        let sequence_number = r.read_u32_be()?;
        let width = r.read_u32_be()?;
        let height = r.read_u32_be()?;
        let x_offset = r.read_u32_be()?;
        let y_offset = r.read_u32_be()?;
        let delay_num = r.read_u16_be()?;
        let delay_den = r.read_u16_be()?;
        let dispose_op = r.read_u8()?;
        let blend_op = r.read_u8()?;

        let dispose = DisposeMethod::from_op(dispose_op).ok_or_else(|| {
            DecodeError::InvalidFrameControl(format!("dispose_op {}", dispose_op))
        })?;
        let blend = BlendMode::from_op(blend_op).ok_or_else(|| {
            DecodeError::InvalidFrameControl(format!("blend_op {}", blend_op))
        })?;
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidFrameControl(format!(
                "empty frame {}x{}",
                width,
                height
            )));
        }
        let fits = x_offset
            .checked_add(width)
            .is_some_and(|right| right <= canvas_width)
            && y_offset
                .checked_add(height)
                .is_some_and(|bottom| bottom <= canvas_height);
        if !fits {
            return Err(DecodeError::FrameOutsideCanvas {
                x: x_offset,
                y: y_offset,
                width,
                height,
                canvas_width,
                canvas_height,
            });
        }

        Ok(Self {
            sequence_number,
            width,
            height,
            x_offset,
            y_offset,
            delay_num,
            delay_den,
            dispose,
            blend,
        })
    }

    /// Frame duration in milliseconds.
    pub fn duration_ms(&self) -> u32 {
        let den = if self.delay_den == 0 {
            100
        } else {
            u32::from(self.delay_den)
        };
        u32::from(self.delay_num) * 1000 / den
    }

    /// Frame rectangle on the canvas.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x_offset, self.y_offset, self.width, self.height)
    }

    /// Serialize back to the 26 `fcTL` data bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; FCTL_SIZE];
        BigEndian::write_u32(&mut out[0..4], self.sequence_number);
        BigEndian::write_u32(&mut out[4..8], self.width);
        BigEndian::write_u32(&mut out[8..12], self.height);
        BigEndian::write_u32(&mut out[12..16], self.x_offset);
        BigEndian::write_u32(&mut out[16..20], self.y_offset);
        BigEndian::write_u16(&mut out[20..22], self.delay_num);
        BigEndian::write_u16(&mut out[22..24], self.delay_den);
        out[24] = match self.dispose {
            DisposeMethod::Keep => 0,
            DisposeMethod::RestoreBackground => 1,
            DisposeMethod::RestorePrevious => 2,
        };
        out[25] = match self.blend {
            BlendMode::Source => 0,
            BlendMode::SourceOver => 1,
        };
        out
    }
}

/// Metadata for one animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Frame whose composited canvas this frame is drawn onto, if any.
    pub required_frame: Option<usize>,
    /// Display duration in milliseconds.
    pub duration_ms: u32,
    /// Disposal applied before the next frame.
    pub disposal_method: DisposeMethod,
    /// Area cleared before the next frame; only set for
    /// [`DisposeMethod::RestoreBackground`].
    pub disposal_rect: Option<Rect>,
    /// Blending used for this frame.
    pub blend_mode: BlendMode,
    /// Frame x offset on the canvas.
    pub x_offset: u32,
    /// Frame y offset on the canvas.
    pub y_offset: u32,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
}

impl FrameInfo {
    /// Frame metadata from a frame control chunk. `required_frame` is left
    /// unresolved.
    pub fn from_control(fc: &FrameControl) -> Self {
        Self {
            required_frame: None,
            duration_ms: fc.duration_ms(),
            disposal_method: fc.dispose,
            disposal_rect: (fc.dispose == DisposeMethod::RestoreBackground).then(|| fc.rect()),
            blend_mode: fc.blend,
            x_offset: fc.x_offset,
            y_offset: fc.y_offset,
            width: fc.width,
            height: fc.height,
        }
    }

    /// Frame rectangle on the canvas.
    pub fn rect(&self) -> Rect {
        Rect::new(self.x_offset, self.y_offset, self.width, self.height)
    }
}
