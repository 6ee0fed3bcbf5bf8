//! Single-image decoding of spliced sub-streams.
//!
//! The demuxer turns every animation frame into a standalone PNG stream. A
//! [`StillDecoder`] is bound to one such stream: constructing it parses only
//! the header, and [`StillDecoder::decode`] produces straight-alpha RGBA8
//! pixels. [`PngStillDecoder`] implements the trait with the `png` crate.

use std::io::Cursor;

use super::error::DecodeError;
use crate::chunk::{first_chunk, ChunkKind};
use crate::composite::{FramePixels, PixelFormat};
use crate::demux::ImageHeader;

/// PNG color type as declared in `IHDR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceColorType {
    /// Color type 0.
    Grayscale,
    /// Color type 2.
    Rgb,
    /// Color type 3.
    Indexed,
    /// Color type 4.
    GrayscaleAlpha,
    /// Color type 6.
    Rgba,
}

impl SourceColorType {
    /// Map an `IHDR` color type byte.
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Grayscale),
            2 => Some(Self::Rgb),
            3 => Some(Self::Indexed),
            4 => Some(Self::GrayscaleAlpha),
            6 => Some(Self::Rgba),
            _ => None,
        }
    }

    /// The `IHDR` color type byte.
    pub const fn code(self) -> u8 {
        match self {
            Self::Grayscale => 0,
            Self::Rgb => 2,
            Self::Indexed => 3,
            Self::GrayscaleAlpha => 4,
            Self::Rgba => 6,
        }
    }

    /// Bit depths PNG allows for this color type.
    pub const fn allows_bit_depth(self, bit_depth: u8) -> bool {
        match self {
            Self::Grayscale => matches!(bit_depth, 1 | 2 | 4 | 8 | 16),
            Self::Indexed => matches!(bit_depth, 1 | 2 | 4 | 8),
            Self::Rgb | Self::GrayscaleAlpha | Self::Rgba => matches!(bit_depth, 8 | 16),
        }
    }
}

/// Color format of an encoded image, available without decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorInfo {
    /// Declared color type.
    pub color_type: SourceColorType,
    /// Declared bits per sample.
    pub bit_depth: u8,
}

/// A decoder for one self-contained still image.
pub trait StillDecoder: Sized {
    /// Bind a decoder to `data`, parsing the header only.
    fn new(data: Vec<u8>) -> Result<Self, DecodeError>;

    /// Color format from the header.
    fn color_info(&self) -> ColorInfo;

    /// Width and height from the header.
    fn dimensions(&self) -> (u32, u32);

    /// Decode all pixels to straight-alpha RGBA8.
    fn decode(&self) -> Result<FramePixels, DecodeError>;
}

/// [`StillDecoder`] backed by the `png` crate.
#[derive(Debug, Clone)]
pub struct PngStillDecoder {
    data: Vec<u8>,
    header: ImageHeader,
}

impl PngStillDecoder {
    /// The encoded stream this decoder is bound to.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl StillDecoder for PngStillDecoder {
    fn new(data: Vec<u8>) -> Result<Self, DecodeError> {
        let ihdr = first_chunk(&data).ok_or(DecodeError::InvalidSignature)?;
        if ihdr.kind() != ChunkKind::Ihdr {
            return Err(DecodeError::ChunkMissing("IHDR"));
        }
        let header = ImageHeader::parse(ihdr.data(&data))?;
        Ok(Self { data, header })
    }

    fn color_info(&self) -> ColorInfo {
        self.header.color_info()
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.header.width, self.header.height)
    }

    fn decode(&self) -> Result<FramePixels, DecodeError> {
        let mut decoder = png::Decoder::new(Cursor::new(&self.data[..]));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder.read_info()?;

        let mut buf = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        buf.truncate(info.buffer_size());

        let rgba = match info.color_type {
            png::ColorType::Rgba => buf,
            png::ColorType::Rgb => buf
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            png::ColorType::GrayscaleAlpha => buf
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
            png::ColorType::Indexed => {
                return Err(DecodeError::UnsupportedFormat(
                    "indexed output after palette expansion".into(),
                ))
            }
        };

        Ok(FramePixels {
            width: info.width,
            height: info.height,
            format: PixelFormat::default(),
            data: rgba,
        })
    }
}
