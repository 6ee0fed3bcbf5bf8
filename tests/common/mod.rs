//! In-memory APNG fixtures for the integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

pub const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

pub const RED: [u8; 4] = [255, 0, 0, 255];
pub const GREEN: [u8; 4] = [0, 255, 0, 255];
pub const BLUE: [u8; 4] = [0, 0, 255, 255];
pub const WHITE: [u8; 4] = [255, 255, 255, 255];
pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

/// A deflate stream whose first block uses the reserved block type.
const BROKEN_ZLIB: [u8; 6] = [0x78, 0x9C, 0xFF, 0xFF, 0xFF, 0xFF];

/// Append a chunk record with a valid CRC.
pub fn chunk(out: &mut Vec<u8>, fourcc: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(fourcc);
    out.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(fourcc);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Solid-color RGBA8 pixels.
pub fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
    px.repeat((width * height) as usize)
}

/// Zlib-compressed scanlines (filter type 0) of RGBA8 pixels.
pub fn compress_rgba(width: u32, rgba: &[u8]) -> Vec<u8> {
    let mut raw = Vec::new();
    for row in rgba.chunks_exact(width as usize * 4) {
        raw.push(0);
        raw.extend_from_slice(row);
    }
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).unwrap();
    encoder.finish().unwrap()
}

fn ihdr(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}

/// One animation frame.
#[derive(Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub delay_num: u16,
    pub delay_den: u16,
    pub dispose: u8,
    pub blend: u8,
    pub rgba: Vec<u8>,
    pub corrupt: bool,
}

impl Frame {
    /// A `width` x `height` frame at `(x, y)` in one color.
    pub fn at(x: u32, y: u32, width: u32, height: u32, px: [u8; 4]) -> Self {
        Self::pixels(x, y, width, height, solid(width, height, px))
    }

    /// A frame with explicit pixels.
    pub fn pixels(x: u32, y: u32, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        assert_eq!(rgba.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            x,
            y,
            delay_num: 1,
            delay_den: 10,
            dispose: 0,
            blend: 0,
            rgba,
            corrupt: false,
        }
    }

    pub fn dispose(mut self, op: u8) -> Self {
        self.dispose = op;
        self
    }

    pub fn blend(mut self, op: u8) -> Self {
        self.blend = op;
        self
    }

    pub fn delay(mut self, num: u16, den: u16) -> Self {
        self.delay_num = num;
        self.delay_den = den;
        self
    }

    /// Replace the image data with an undecodable deflate stream.
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    fn fctl(&self, sequence: u32) -> Vec<u8> {
        let mut data = Vec::new();
        for v in [sequence, self.width, self.height, self.x, self.y] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&self.delay_num.to_be_bytes());
        data.extend_from_slice(&self.delay_den.to_be_bytes());
        data.push(self.dispose);
        data.push(self.blend);
        data
    }

    fn image_data(&self) -> Vec<u8> {
        if self.corrupt {
            BROKEN_ZLIB.to_vec()
        } else {
            compress_rgba(self.width, &self.rgba)
        }
    }
}

/// Builds APNG streams with RGBA8 frames.
pub struct ApngBuilder {
    width: u32,
    height: u32,
    num_plays: u32,
    hidden_default: Option<Vec<u8>>,
    frames: Vec<Frame>,
    split_data: bool,
    declared_frames: Option<u32>,
}

impl ApngBuilder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            num_plays: 0,
            hidden_default: None,
            frames: Vec::new(),
            split_data: false,
            declared_frames: None,
        }
    }

    pub fn plays(mut self, num_plays: u32) -> Self {
        self.num_plays = num_plays;
        self
    }

    /// A full-canvas `IDAT` image without frame control.
    pub fn hidden_default(mut self, px: [u8; 4]) -> Self {
        self.hidden_default = Some(solid(self.width, self.height, px));
        self
    }

    /// Split each frame's data over two data chunks.
    pub fn split_data(mut self) -> Self {
        self.split_data = true;
        self
    }

    /// Write `count` into `acTL` instead of the number of frames.
    pub fn declare_frames(mut self, count: u32) -> Self {
        self.declared_frames = Some(count);
        self
    }

    pub fn frame(mut self, frame: Frame) -> Self {
        self.frames.push(frame);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = SIGNATURE.to_vec();
        chunk(&mut out, b"IHDR", &ihdr(self.width, self.height));
        let mut actl = Vec::new();
        let num_frames = self.declared_frames.unwrap_or(self.frames.len() as u32);
        actl.extend_from_slice(&num_frames.to_be_bytes());
        actl.extend_from_slice(&self.num_plays.to_be_bytes());
        chunk(&mut out, b"acTL", &actl);
        chunk(&mut out, b"tEXt", b"Comment\0fixture");

        if let Some(rgba) = &self.hidden_default {
            chunk(&mut out, b"IDAT", &compress_rgba(self.width, rgba));
        }

        let mut sequence = 0u32;
        for (i, frame) in self.frames.iter().enumerate() {
            chunk(&mut out, b"fcTL", &frame.fctl(sequence));
            sequence += 1;

            let data = frame.image_data();
            let parts: Vec<&[u8]> = if self.split_data && data.len() > 1 {
                let (a, b) = data.split_at(data.len() / 2);
                vec![a, b]
            } else {
                vec![&data[..]]
            };
            for part in parts {
                if i == 0 && self.hidden_default.is_none() {
                    chunk(&mut out, b"IDAT", part);
                } else {
                    let mut fdat = sequence.to_be_bytes().to_vec();
                    fdat.extend_from_slice(part);
                    chunk(&mut out, b"fdAT", &fdat);
                    sequence += 1;
                }
            }
        }
        chunk(&mut out, b"IEND", &[]);
        out
    }
}

/// A plain PNG, optionally carrying an `acTL` chunk but no frame control.
pub fn still_png(width: u32, height: u32, px: [u8; 4], stray_actl: Option<(u32, u32)>) -> Vec<u8> {
    let mut out = SIGNATURE.to_vec();
    chunk(&mut out, b"IHDR", &ihdr(width, height));
    if let Some((num_frames, num_plays)) = stray_actl {
        let mut actl = Vec::new();
        actl.extend_from_slice(&num_frames.to_be_bytes());
        actl.extend_from_slice(&num_plays.to_be_bytes());
        chunk(&mut out, b"acTL", &actl);
    }
    chunk(&mut out, b"IDAT", &compress_rgba(width, &solid(width, height, px)));
    chunk(&mut out, b"IEND", &[]);
    out
}

/// A six-frame animation mixing every disposal and blend mode with
/// semi-transparent pixels.
pub fn mixed_animation() -> Vec<u8> {
    let gradient: Vec<u8> = (0..16u8)
        .flat_map(|i| [i * 16, 255 - i * 16, i * 8, 64 + i * 12])
        .collect();
    ApngBuilder::new(4, 4)
        .plays(2)
        .frame(Frame::pixels(0, 0, 4, 4, gradient).dispose(0).blend(0))
        .frame(Frame::at(1, 1, 2, 2, [200, 10, 10, 128]).dispose(2).blend(1))
        .frame(Frame::at(0, 2, 3, 2, [10, 200, 10, 200]).dispose(1).blend(1))
        .frame(Frame::at(2, 0, 2, 3, [10, 10, 200, 90]).dispose(0).blend(1))
        .frame(Frame::at(0, 0, 1, 4, [250, 250, 0, 255]).dispose(2).blend(0))
        .frame(Frame::at(1, 0, 3, 1, [0, 250, 250, 40]).dispose(0).blend(1))
        .build()
}
