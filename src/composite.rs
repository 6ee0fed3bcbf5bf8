//! Drawing decoded frames onto the animation canvas.
//!
//! Every frame is composited onto a full-size canvas: the canvas of the
//! frame's required frame, or a transparent one. [`composite`] applies the
//! pending background disposal of the previous frame, blends the new frame
//! into its rectangle, and records its own disposal for the next call.
//!
//! Pixels are always four 8-bit channels with alpha last. RGBA and BGRA only
//! differ in where red and blue live, so blending treats both as [`Rgba`]
//! slots and only the alpha convention needs converting.

use rgb::{AsPixels, Rgba};

use crate::decoder::DecodeError;
use crate::demux::{BlendMode, DisposeMethod, Rect};

/// Channel order of a 4-byte pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelLayout {
    /// Red, green, blue, alpha.
    #[default]
    Rgba8,
    /// Blue, green, red, alpha.
    Bgra8,
}

/// Whether color channels are stored multiplied by alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaType {
    /// Color channels are scaled by alpha.
    Premultiplied,
    /// Color channels are independent of alpha.
    #[default]
    Unpremultiplied,
}

/// Layout plus alpha convention of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelFormat {
    /// Channel order.
    pub layout: PixelLayout,
    /// Alpha convention.
    pub alpha: AlphaType,
}

impl PixelFormat {
    /// Build a format.
    pub const fn new(layout: PixelLayout, alpha: AlphaType) -> Self {
        Self { layout, alpha }
    }
}

/// A tightly packed 4-bytes-per-pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePixels {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format of `data`.
    pub format: PixelFormat,
    /// `width * height * 4` bytes, rows top to bottom.
    pub data: Vec<u8>,
}

/// A composited full-canvas frame as handed to callers.
pub type Canvas = FramePixels;

impl FramePixels {
    /// A fully transparent buffer.
    pub fn transparent(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// The 4 bytes of pixel `(x, y)` in this buffer's layout.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let start = y as usize * self.stride() + x as usize * 4;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.data[start..start + 4]);
        px
    }

    /// Swap the color channels into `layout`, keeping the alpha convention.
    pub fn convert_layout(&mut self, layout: PixelLayout) {
        if self.format.layout != layout {
            for px in self.data.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            self.format.layout = layout;
        }
    }

    /// Rewrite the pixels into `alpha`, keeping the layout.
    pub fn convert_alpha(&mut self, alpha: AlphaType) {
        let from = self.format.alpha;
        if from != alpha {
            let pixels: &mut [Rgba<u8>] = self.data.as_pixels_mut();
            for px in pixels {
                *px = convert_alpha(*px, from, alpha);
            }
            self.format.alpha = alpha;
        }
    }

    fn clear_rect(&mut self, rect: Rect) {
        let rect = rect.clip_to(self.width, self.height);
        if rect.is_empty() {
            return;
        }
        let stride = self.stride();
        for y in rect.y..rect.y + rect.height {
            let start = y as usize * stride + rect.x as usize * 4;
            self.data[start..start + rect.width as usize * 4].fill(0);
        }
    }
}

/// A canvas together with the bookkeeping needed to draw the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasState {
    pub(crate) canvas: FramePixels,
    pub(crate) restore_rect: Option<Rect>,
}

impl CanvasState {
    /// A transparent canvas with nothing drawn yet.
    pub fn blank(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            canvas: FramePixels::transparent(width, height, format),
            restore_rect: None,
        }
    }

    /// The composited pixels.
    pub fn canvas(&self) -> &FramePixels {
        &self.canvas
    }

    /// Rectangle to clear before the next frame is drawn.
    pub fn restore_rect(&self) -> Option<Rect> {
        self.restore_rect
    }

    /// Take the composited pixels.
    pub fn into_canvas(self) -> FramePixels {
        self.canvas
    }
}

/// What [`composite`] needs to know about the frame being drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeOp {
    /// How the frame combines with the canvas.
    pub blend: BlendMode,
    /// Disposal applied before the next frame.
    pub disposal: DisposeMethod,
    /// Rectangle cleared before the next frame, for `RestoreBackground`.
    pub disposal_rect: Option<Rect>,
    /// Frame x offset on the canvas.
    pub x: u32,
    /// Frame y offset on the canvas.
    pub y: u32,
}

/// Draw `frame` onto `state`.
///
/// Fails without touching the canvas if the channel layouts differ or the
/// frame does not fit. `RestorePrevious` is not handled here: the caller
/// composites the next frame onto an older [`CanvasState`] instead.
pub fn composite(
    state: &mut CanvasState,
    frame: &FramePixels,
    op: &CompositeOp,
) -> Result<(), DecodeError> {
    let canvas = &mut state.canvas;
    if canvas.format.layout != frame.format.layout {
        return Err(DecodeError::LayoutMismatch {
            canvas: canvas.format,
            frame: frame.format,
        });
    }
    let fits = op
        .x
        .checked_add(frame.width)
        .is_some_and(|right| right <= canvas.width)
        && op
            .y
            .checked_add(frame.height)
            .is_some_and(|bottom| bottom <= canvas.height);
    if !fits {
        return Err(DecodeError::FrameOutsideCanvas {
            x: op.x,
            y: op.y,
            width: frame.width,
            height: frame.height,
            canvas_width: canvas.width,
            canvas_height: canvas.height,
        });
    }

    if let Some(rect) = state.restore_rect.take() {
        canvas.clear_rect(rect);
    }

    let row_bytes = frame.stride();
    let canvas_stride = canvas.stride();
    let src_alpha = frame.format.alpha;
    let dst_alpha = canvas.format.alpha;
    for (row, src_row) in frame.data.chunks_exact(row_bytes).enumerate() {
        let start = (op.y as usize + row) * canvas_stride + op.x as usize * 4;
        let dst_row = &mut canvas.data[start..start + row_bytes];
        match op.blend {
            BlendMode::Source if src_alpha == dst_alpha => dst_row.copy_from_slice(src_row),
            BlendMode::Source => {
                let dst: &mut [Rgba<u8>] = dst_row.as_pixels_mut();
                let src: &[Rgba<u8>] = src_row.as_pixels();
                for (d, s) in dst.iter_mut().zip(src) {
                    *d = convert_alpha(*s, src_alpha, dst_alpha);
                }
            }
            BlendMode::SourceOver => {
                let dst: &mut [Rgba<u8>] = dst_row.as_pixels_mut();
                let src: &[Rgba<u8>] = src_row.as_pixels();
                match dst_alpha {
                    AlphaType::Premultiplied => {
                        for (d, s) in dst.iter_mut().zip(src) {
                            *d = over(to_premultiplied(*s, src_alpha), *d);
                        }
                    }
                    AlphaType::Unpremultiplied => {
                        for (d, s) in dst.iter_mut().zip(src) {
                            let s = convert_alpha(*s, src_alpha, AlphaType::Unpremultiplied);
                            *d = over_straight(s, *d);
                        }
                    }
                }
            }
        }
    }

    state.restore_rect = match op.disposal {
        DisposeMethod::RestoreBackground => op.disposal_rect,
        DisposeMethod::Keep | DisposeMethod::RestorePrevious => None,
    };
    Ok(())
}

#[inline]
fn mul_div_255(a: u8, b: u8) -> u8 {
    ((u32::from(a) * u32::from(b) + 127) / 255) as u8
}

/// Scale the color channels by alpha.
#[inline]
pub fn premultiply(px: Rgba<u8>) -> Rgba<u8> {
    Rgba::new(
        mul_div_255(px.r, px.a),
        mul_div_255(px.g, px.a),
        mul_div_255(px.b, px.a),
        px.a,
    )
}

/// Undo [`premultiply`]. Fully transparent pixels become transparent black.
#[inline]
pub fn unpremultiply(px: Rgba<u8>) -> Rgba<u8> {
    if px.a == 0 {
        return Rgba::new(0, 0, 0, 0);
    }
    let a = u32::from(px.a);
    let div = |c: u8| ((u32::from(c) * 255 + a / 2) / a).min(255) as u8;
    Rgba::new(div(px.r), div(px.g), div(px.b), px.a)
}

/// Porter-Duff source-over on straight-alpha pixels.
///
/// Transparent sources leave `dst` untouched and opaque ones replace it, so
/// pixels outside the drawn shape keep their exact values. Partial coverage
/// is computed in 32 bits with alpha scaled by 255 and rounded once.
#[inline]
pub fn over_straight(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    match src.a {
        0 => return dst,
        255 => return src,
        _ => {}
    }
    let sa = u32::from(src.a) * 255;
    let da = u32::from(dst.a) * u32::from(255 - src.a);
    let alpha = sa + da;
    let mix = |s: u8, d: u8| ((u32::from(s) * sa + u32::from(d) * da + alpha / 2) / alpha) as u8;
    Rgba::new(
        mix(src.r, dst.r),
        mix(src.g, dst.g),
        mix(src.b, dst.b),
        ((alpha + 127) / 255) as u8,
    )
}

/// Porter-Duff source-over on premultiplied pixels:
/// `dst = src + dst * (1 - src.alpha)` for every channel including alpha.
#[inline]
pub fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let inv = 255 - src.a;
    let add = |s: u8, d: u8| s.saturating_add(mul_div_255(d, inv));
    Rgba::new(
        add(src.r, dst.r),
        add(src.g, dst.g),
        add(src.b, dst.b),
        add(src.a, dst.a),
    )
}

#[inline]
fn to_premultiplied(px: Rgba<u8>, alpha: AlphaType) -> Rgba<u8> {
    match alpha {
        AlphaType::Premultiplied => px,
        AlphaType::Unpremultiplied => premultiply(px),
    }
}

#[inline]
fn from_premultiplied(px: Rgba<u8>, alpha: AlphaType) -> Rgba<u8> {
    match alpha {
        AlphaType::Premultiplied => px,
        AlphaType::Unpremultiplied => unpremultiply(px),
    }
}

#[inline]
fn convert_alpha(px: Rgba<u8>, from: AlphaType, to: AlphaType) -> Rgba<u8> {
    if from == to {
        px
    } else {
        from_premultiplied(to_premultiplied(px, from), to)
    }
}
