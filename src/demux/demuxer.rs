
use log::trace;

use super::control::{
    AnimationControl, DisposeMethod, FrameControl, FrameInfo, ImageHeader,
};
use crate::chunk::{
    chunks, next_chunk, rewrite_frame_data_as_image_data, validate_signature, write_chunk,
    ChunkKind, ChunkRef, CHUNK_CRC_SIZE, CHUNK_HEADER_SIZE, IEND_CHUNK, PNG_SIGNATURE,
};
use crate::composite::FramePixels;
use crate::decoder::StillDecoder;

/// Offset of the `IHDR` record in a header, right after the signature.
const IHDR_RECORD_START: usize = PNG_SIGNATURE.len();
const IHDR_RECORD_END: usize = IHDR_RECORD_START + CHUNK_HEADER_SIZE + 13 + CHUNK_CRC_SIZE;

/// Everything in front of the first image: signature, `IHDR` and the
/// preamble chunks every frame sub-stream needs (`PLTE`, `tRNS`, ...).
#[derive(Debug, Clone)]
pub struct StreamHeader {
    bytes: Vec<u8>,
    image_header: ImageHeader,
    animation: Option<AnimationControl>,
    first_image_chunk: ChunkRef,
}

impl StreamHeader {
    /// Signature plus preamble chunks, without `acTL`.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Parsed `IHDR` of the stream; its extent is the canvas size.
    pub fn image_header(&self) -> &ImageHeader {
        &self.image_header
    }

    /// Parsed `acTL`, if the stream is animated.
    pub fn animation(&self) -> Option<&AnimationControl> {
        self.animation.as_ref()
    }

    /// Whether frame control chunks are honored.
    pub fn is_animated(&self) -> bool {
        self.animation.is_some()
    }

    /// The `fcTL` or `IDAT` chunk that starts the default image.
    pub fn first_image_chunk(&self) -> ChunkRef {
        self.first_image_chunk
    }

    /// Whether the default image has its own frame control, making it the
    /// first animation frame.
    pub fn default_image_is_frame(&self) -> bool {
        self.is_animated() && self.first_image_chunk.kind() == ChunkKind::Fctl
    }

    /// Header bytes with `IHDR` resized to `width` x `height`.
    fn resized_bytes(&self, width: u32, height: u32) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.bytes.len());
        out.extend_from_slice(&self.bytes[..IHDR_RECORD_START]);
        let ihdr = self.image_header.with_dimensions(width, height).to_bytes();
        write_chunk(&mut out, *b"IHDR", &ihdr);
        out.extend_from_slice(&self.bytes[IHDR_RECORD_END..]);
        out
    }
}

/// Copy the signature and all preamble chunks up to the first `fcTL` or
/// `IDAT`.
///
/// `acTL` is parsed but left out of the copy, so sub-streams look like plain
/// PNGs. Returns `None` if the first chunk is not a valid `IHDR` or the
/// buffer ends before a boundary chunk.
pub fn extract_header(buf: &[u8]) -> Option<StreamHeader> {
    if !validate_signature(buf) {
        return None;
    }
    let mut bytes = PNG_SIGNATURE.to_vec();
    let mut image_header = None;
    let mut animation = None;

    for chunk in chunks(buf) {
        match chunk.kind() {
            ChunkKind::Ihdr if image_header.is_none() => {
                image_header = Some(ImageHeader::parse(chunk.data(buf)).ok()?);
                bytes.extend_from_slice(chunk.record(buf));
            }
            _ if image_header.is_none() => return None,
            ChunkKind::Actl => {
                // A zero frame count is invalid; such streams are shown as stills.
                animation = AnimationControl::parse(chunk.data(buf))
                    .ok()
                    .filter(|actl| actl.num_frames > 0);
            }
            ChunkKind::Fctl | ChunkKind::Idat => {
                let image_header = image_header?;
                return Some(StreamHeader {
                    bytes,
                    image_header,
                    animation,
                    first_image_chunk: chunk,
                });
            }
            ChunkKind::Fdat | ChunkKind::Iend | ChunkKind::Ihdr => return None,
            ChunkKind::Other(fourcc) => {
                trace!("preamble chunk {:?}", core::str::from_utf8(&fourcc));
                bytes.extend_from_slice(chunk.record(buf));
            }
        }
    }
    None
}

/// One image split out of the stream.
#[derive(Debug)]
pub struct DemuxedImage<D> {
    pub(crate) decoder: D,
    pub(crate) frame_info: Option<FrameInfo>,
    pub(crate) x_offset: u32,
    pub(crate) y_offset: u32,
    pub(crate) pixels: Option<FramePixels>,
}

impl<D: StillDecoder> DemuxedImage<D> {
    /// The still-image decoder bound to this image's sub-stream.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Frame metadata; `None` for a default image without frame control.
    pub fn frame_info(&self) -> Option<&FrameInfo> {
        self.frame_info.as_ref()
    }

    /// Position of the image on the canvas.
    pub fn offset(&self) -> (u32, u32) {
        (self.x_offset, self.y_offset)
    }

    /// Whether decoded pixels are currently held.
    pub fn has_pixels(&self) -> bool {
        self.pixels.is_some()
    }
}

/// Result of [`demux_next_image`].
#[derive(Debug)]
pub struct DemuxStep<D> {
    /// The demuxed image.
    pub image: DemuxedImage<D>,
    /// The `fcTL` that starts the next image, or `None` at `IEND`.
    pub next: Option<ChunkRef>,
}

/// Gather the chunks of one image starting at `chunk` (an `fcTL` or the
/// first `IDAT`) and splice them into a self-contained PNG stream.
///
/// `fdAT` chunks are rewritten to `IDAT`. Collection ends at the next `fcTL`
/// or at `IEND`; running out of valid chunks first yields `None`, as do a
/// malformed frame control, mixed `IDAT`/`fdAT` data, or a sub-stream the
/// still decoder rejects.
pub fn demux_next_image<D: StillDecoder>(
    buf: &[u8],
    header: &StreamHeader,
    chunk: ChunkRef,
) -> Option<DemuxStep<D>> {
    let canvas = header.image_header();
    let mut cur = chunk;
    let mut frame_control = None;

    if cur.kind() == ChunkKind::Fctl {
        if header.is_animated() {
            match FrameControl::parse(cur.data(buf), canvas.width, canvas.height) {
                Ok(fc) => frame_control = Some(fc),
                Err(e) => {
                    trace!("rejecting fcTL at {}: {}", cur.offset(), e);
                    return None;
                }
            }
        }
        cur = next_chunk(buf, &cur)?;
    }

    let mut data_kind = None;
    let mut body = Vec::new();
    let next = loop {
        match cur.kind() {
            ChunkKind::Idat | ChunkKind::Fdat => {
                if *data_kind.get_or_insert(cur.kind()) != cur.kind() {
                    return None;
                }
                if cur.kind() == ChunkKind::Fdat {
                    body.extend_from_slice(&rewrite_frame_data_as_image_data(cur.record(buf))?);
                } else {
                    body.extend_from_slice(cur.record(buf));
                }
            }
            ChunkKind::Fctl => {
                if data_kind.is_none() {
                    return None;
                }
                break Some(cur);
            }
            ChunkKind::Iend => break None,
            ChunkKind::Ihdr | ChunkKind::Actl => return None,
            ChunkKind::Other(_) => {
                trace!("skipping chunk {:?} at {}", cur.fourcc(), cur.offset());
            }
        }
        cur = next_chunk(buf, &cur)?;
    };

    data_kind?;
    let (x_offset, y_offset, width, height) = match &frame_control {
        Some(fc) => (fc.x_offset, fc.y_offset, fc.width, fc.height),
        None => (0, 0, canvas.width, canvas.height),
    };

    let mut bytes = if (width, height) == (canvas.width, canvas.height) {
        header.bytes().to_vec()
    } else {
        header.resized_bytes(width, height)
    };
    bytes.extend_from_slice(&body);
    bytes.extend_from_slice(&IEND_CHUNK);

    let decoder = D::new(bytes).ok()?;
    Some(DemuxStep {
        image: DemuxedImage {
            decoder,
            frame_info: frame_control.as_ref().map(FrameInfo::from_control),
            x_offset,
            y_offset,
            pixels: None,
        },
        next,
    })
}

/// Pick the frame that `new_index` must be composited onto, looking only at
/// the immediately preceding frame.
///
/// `Keep` or `RestoreBackground` on the previous frame makes it the
/// required frame. `RestorePrevious` reaches one step further back, provided
/// at least two frames precede the new one. Two consecutive
/// `RestorePrevious` frames are not followed further.
pub fn resolve_required_frame(previous: Option<&FrameInfo>, new_index: usize) -> Option<usize> {
    let previous = previous?;
    match previous.disposal_method {
        DisposeMethod::Keep | DisposeMethod::RestoreBackground => Some(new_index - 1),
        DisposeMethod::RestorePrevious if new_index >= 2 => Some(new_index - 2),
        DisposeMethod::RestorePrevious => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demux::{BlendMode, Rect};

    fn info(disposal_method: DisposeMethod) -> FrameInfo {
        FrameInfo {
            required_frame: None,
            duration_ms: 0,
            disposal_method,
            disposal_rect: None,
            blend_mode: BlendMode::Source,
            x_offset: 0,
            y_offset: 0,
            width: 1,
            height: 1,
        }
    }

    #[test]
    fn required_frame_follows_previous_disposal() {
        let keep = info(DisposeMethod::Keep);
        let background = FrameInfo {
            disposal_rect: Some(Rect::new(0, 0, 1, 1)),
            ..info(DisposeMethod::RestoreBackground)
        };
        let previous = info(DisposeMethod::RestorePrevious);

        assert_eq!(resolve_required_frame(None, 0), None);
        assert_eq!(resolve_required_frame(Some(&keep), 1), Some(0));
        assert_eq!(resolve_required_frame(Some(&background), 4), Some(3));
        assert_eq!(resolve_required_frame(Some(&previous), 1), None);
        assert_eq!(resolve_required_frame(Some(&previous), 2), Some(0));
        assert_eq!(resolve_required_frame(Some(&previous), 5), Some(3));
    }

    #[test]
    fn header_requires_leading_ihdr() {
        let mut buf = PNG_SIGNATURE.to_vec();
        write_chunk(&mut buf, *b"tEXt", b"k\0v");
        write_chunk(&mut buf, *b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 6, 0, 0, 0]);
        write_chunk(&mut buf, *b"IDAT", &[]);
        assert!(extract_header(&buf).is_none());
    }

    #[test]
    fn header_stops_before_first_image_and_drops_actl() {
        let mut buf = PNG_SIGNATURE.to_vec();
        write_chunk(&mut buf, *b"IHDR", &[0, 0, 0, 2, 0, 0, 0, 2, 8, 6, 0, 0, 0]);
        write_chunk(&mut buf, *b"acTL", &[0, 0, 0, 1, 0, 0, 0, 3]);
        write_chunk(&mut buf, *b"gAMA", &[0, 0, 0xB1, 0x8F]);
        let boundary = buf.len();
        write_chunk(&mut buf, *b"IDAT", &[1, 2, 3]);

        let header = extract_header(&buf).unwrap();
        assert_eq!(header.first_image_chunk().offset(), boundary);
        assert_eq!(header.first_image_chunk().kind(), ChunkKind::Idat);
        assert_eq!(header.animation().unwrap().num_plays, 3);
        assert!(!header.default_image_is_frame());
        // Signature + IHDR (25) + gAMA (16).
        assert_eq!(header.bytes().len(), 8 + 25 + 16);
        assert!(!header.bytes().windows(4).any(|w| w == b"acTL"));

        // Without the boundary chunk there is no header yet.
        assert!(extract_header(&buf[..boundary + 5]).is_none());
    }

    #[test]
    fn zero_frame_actl_is_not_animated() {
        let mut buf = PNG_SIGNATURE.to_vec();
        write_chunk(&mut buf, *b"IHDR", &[0, 0, 0, 2, 0, 0, 0, 2, 8, 6, 0, 0, 0]);
        write_chunk(&mut buf, *b"acTL", &[0, 0, 0, 0, 0, 0, 0, 0]);
        write_chunk(&mut buf, *b"IDAT", &[]);
        assert!(!extract_header(&buf).unwrap().is_animated());
    }

    #[test]
    fn resized_header_keeps_preamble() {
        let mut buf = PNG_SIGNATURE.to_vec();
        write_chunk(&mut buf, *b"IHDR", &[0, 0, 0, 8, 0, 0, 0, 8, 8, 6, 0, 0, 0]);
        write_chunk(&mut buf, *b"sRGB", &[0]);
        write_chunk(&mut buf, *b"IDAT", &[]);
        let header = extract_header(&buf).unwrap();

        let resized = header.resized_bytes(3, 5);
        assert_eq!(resized.len(), header.bytes().len());
        let ihdr = crate::chunk::first_chunk(&resized).unwrap();
        assert!(ihdr.crc_matches(&resized));
        let parsed = ImageHeader::parse(ihdr.data(&resized)).unwrap();
        assert_eq!((parsed.width, parsed.height), (3, 5));
        assert_eq!(&resized[IHDR_RECORD_END..], &header.bytes()[IHDR_RECORD_END..]);
    }
}
