//! Stateful, progressive decoding of one animated image.
//!
//! An [`AnimationSession`] owns the input bytes, demuxes images on demand and
//! caches one composited [`CanvasState`] per frame. Frames can be requested
//! in any order; a frame is built by walking its `required_frame` chain back
//! to the nearest cached canvas (or a blank one) and compositing forward, so
//! random access, reverse access and access after a cache clear all produce
//! the same pixels as a plain forward decode.
//!
//! ```rust,no_run
//! use zenapng::{AnimationSession, DecodeConfig};
//!
//! let apng: &[u8] = &[]; // your APNG data
//! let mut session = AnimationSession::from_bytes(apng, DecodeConfig::default())?;
//! for index in 0..session.frame_count() {
//!     let canvas = session.get_frame(index)?;
//!     let delay = session.frame_info(index).map_or(0, |info| info.duration_ms);
//!     println!("{}x{} for {} ms", canvas.width, canvas.height, delay);
//! }
//! # Ok::<(), zenapng::DecodeError>(())
//! ```

use hashbrown::HashMap;
use log::{debug, trace, warn};

use crate::chunk::{validate_signature, ChunkRef, PNG_SIGNATURE};
use crate::composite::{composite, Canvas, CanvasState, CompositeOp, FramePixels};
use crate::decoder::{DecodeConfig, DecodeError, PngStillDecoder, StillDecoder};
use crate::demux::{
    demux_next_image, extract_header, resolve_required_frame, BlendMode, DemuxedImage,
    DisposeMethod, FrameInfo, ImageHeader, LoopCount, StreamHeader,
};

/// Demux progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The default image has not been demuxed yet.
    Initial,
    /// Header and default image are demuxed.
    HeaderParsed,
    /// At least one image after the default image is demuxed; more may follow.
    Demuxing,
    /// No more images will be demuxed; the frame count is final.
    Exhausted,
}

/// Decoder state for one animated (or still) PNG stream.
///
/// Not thread-safe for concurrent use; decode independent images with
/// separate sessions.
#[derive(Debug)]
pub struct AnimationSession<D = PngStillDecoder> {
    config: DecodeConfig,
    data: Vec<u8>,
    finished: bool,
    state: SessionState,
    header: Option<StreamHeader>,
    cursor: Option<ChunkRef>,
    images: Vec<DemuxedImage<D>>,
    /// 1 while the default image is hidden (animated, no frame control).
    first_frame_index: usize,
    canvases: HashMap<usize, CanvasState>,
}

impl AnimationSession {
    /// An empty session that decodes with [`PngStillDecoder`]. Feed it with
    /// [`append`](Self::append).
    pub fn new(config: DecodeConfig) -> Self {
        Self::with_config(config)
    }

    /// A session over a complete buffer. The bytes are copied.
    pub fn from_bytes(data: &[u8], config: DecodeConfig) -> Result<Self, DecodeError> {
        let mut session = Self::new(config);
        session.append(data)?;
        session.finish();
        Ok(session)
    }

    /// Cheap probe on the leading bytes of a buffer.
    pub fn can_decode(prefix: &[u8]) -> bool {
        validate_signature(prefix)
    }
}

impl<D: StillDecoder> AnimationSession<D> {
    /// An empty session with a custom still-image decoder.
    pub fn with_config(config: DecodeConfig) -> Self {
        Self {
            config,
            data: Vec::new(),
            finished: false,
            state: SessionState::Initial,
            header: None,
            cursor: None,
            images: Vec::new(),
            first_frame_index: 0,
            canvases: HashMap::new(),
        }
    }

    /// Add more input bytes.
    ///
    /// Chunks that were incomplete before may now be demuxed. Fails if the
    /// total input would exceed [`Limits::max_input_size`](crate::Limits).
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        let total = self.data.len() as u64 + bytes.len() as u64;
        self.config.limits.check_input_size(total)?;
        self.data.extend_from_slice(bytes);
        trace!("appended {} bytes, {} total", bytes.len(), self.data.len());
        Ok(())
    }

    /// Mark the input as complete. From now on a chunk that cannot be demuxed
    /// ends the stream instead of waiting for more bytes.
    pub fn finish(&mut self) {
        self.finished = true;
    }

    /// Whether [`finish`](Self::finish) was called.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Current demux state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Demux everything currently available and return the number of frames
    /// so far. May grow after more bytes are appended.
    pub fn frame_count(&mut self) -> usize {
        while self.demux_next() {}
        self.demuxed_frame_count()
    }

    /// Frame count declared by `acTL`, if the stream is animated.
    pub fn declared_frame_count(&self) -> Option<u32> {
        self.header
            .as_ref()
            .and_then(StreamHeader::animation)
            .map(|actl| actl.num_frames)
    }

    /// Metadata of an already demuxed frame. `None` for frames not demuxed
    /// yet and for the single frame of a still image.
    pub fn frame_info(&self, index: usize) -> Option<FrameInfo> {
        let image = self.images.get(index.checked_add(self.first_frame_index)?)?;
        image.frame_info
    }

    /// Canvas width and height, once the header is parsed.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.header
            .as_ref()
            .map(|header| (header.image_header().width, header.image_header().height))
    }

    /// Parsed `IHDR`, once the header is parsed.
    pub fn image_header(&self) -> Option<&ImageHeader> {
        self.header.as_ref().map(StreamHeader::image_header)
    }

    /// How often the animation plays. Streams with fewer than two frames
    /// demuxed so far play once, whatever `acTL` says.
    pub fn play_count(&self) -> LoopCount {
        match self.header.as_ref().and_then(StreamHeader::animation) {
            Some(actl) if self.demuxed_frame_count() > 1 => actl.loop_count(),
            _ => LoopCount::ONCE,
        }
    }

    /// Demux until frame `index` exists. Returns `false` if the available
    /// input ends first.
    pub fn demux_to_index(&mut self, index: usize) -> bool {
        while self.demuxed_frame_count() <= index {
            if !self.demux_next() {
                return self.demuxed_frame_count() > index;
            }
        }
        true
    }

    /// The composited canvas of frame `index`.
    ///
    /// If any frame of the dependency chain fails to decode or composite, the
    /// default image drawn on a blank canvas is returned instead; that
    /// fallback is not cached. Errors are only returned for indices that
    /// cannot be demuxed or when the default image itself is undecodable.
    pub fn get_frame(&mut self, index: usize) -> Result<Canvas, DecodeError> {
        if !self.demux_to_index(index) {
            return Err(DecodeError::FrameOutOfBounds {
                index,
                available: self.demuxed_frame_count(),
            });
        }
        match self.composite_to(index) {
            Ok(canvas) => Ok(canvas),
            Err(e) => {
                warn!("frame {} failed ({}), showing the default image", index, e);
                self.render_default_image()
            }
        }
    }

    /// Whether frame `index` has a cached canvas.
    pub fn is_cached(&self, index: usize) -> bool {
        self.canvases.contains_key(&index)
    }

    /// Drop cached canvases and decoded pixels of every frame except `keep`.
    /// `None` clears everything. Evicted frames are rebuilt on demand.
    pub fn clear_cache_except_frame(&mut self, keep: Option<usize>) {
        self.canvases.retain(|&index, _| Some(index) == keep);
        let keep_image = keep.map(|index| index + self.first_frame_index);
        for (i, image) in self.images.iter_mut().enumerate() {
            if Some(i) != keep_image {
                image.pixels = None;
            }
        }
        trace!("cache cleared except {:?}", keep);
    }

    /// Bytes held by cached canvases and decoded frame pixels. Stays within
    /// [`Limits::max_memory`](crate::Limits) after every call that
    /// composites.
    pub fn cached_bytes(&self) -> usize {
        let canvases: usize = self.canvases.values().map(|s| s.canvas.data.len()).sum();
        let pixels: usize = self
            .images
            .iter()
            .filter_map(|image| image.pixels.as_ref())
            .map(|pixels| pixels.data.len())
            .sum();
        canvases + pixels
    }

    /// Evict until the cache fits the memory budget, keeping the canvas of
    /// frame `keep`. Decoded pixels go first, then canvases farthest from
    /// `keep`.
    fn trim_cache(&mut self, keep: Option<usize>) {
        let mut excess = self.config.limits.memory_excess(self.cached_bytes());
        if excess == 0 {
            return;
        }
        trace!("cache over budget by {} bytes", excess);
        for image in &mut self.images {
            if excess == 0 {
                return;
            }
            if let Some(pixels) = image.pixels.take() {
                excess = excess.saturating_sub(pixels.data.len());
            }
        }
        let mut victims: Vec<usize> = self
            .canvases
            .keys()
            .copied()
            .filter(|&i| Some(i) != keep)
            .collect();
        victims.sort_unstable_by_key(|&i| core::cmp::Reverse(keep.map_or(i, |k| i.abs_diff(k))));
        for i in victims {
            if excess == 0 {
                break;
            }
            if let Some(state) = self.canvases.remove(&i) {
                excess = excess.saturating_sub(state.canvas.data.len());
                trace!("evicted canvas {}", i);
            }
        }
    }

    fn demuxed_frame_count(&self) -> usize {
        self.images.len().saturating_sub(self.first_frame_index)
    }

    fn canvas_dimensions(&self) -> Result<(u32, u32), DecodeError> {
        self.canvas_size().ok_or(DecodeError::ChunkMissing("IHDR"))
    }

    /// Demux one more image. Returns whether an image was added.
    fn demux_next(&mut self) -> bool {
        match self.state {
            SessionState::Exhausted => false,
            SessionState::Initial => self.demux_default_image(),
            SessionState::HeaderParsed | SessionState::Demuxing => self.demux_frame(),
        }
    }

    fn demux_default_image(&mut self) -> bool {
        if self.data.len() >= PNG_SIGNATURE.len() && !validate_signature(&self.data) {
            warn!("input does not start with a PNG signature");
            self.exhaust();
            return false;
        }
        if self.header.is_none() {
            let Some(header) = extract_header(&self.data) else {
                return self.stall();
            };
            let ihdr = header.image_header();
            if let Err(e) = self.check_canvas(ihdr) {
                warn!("canvas {}x{} rejected: {}", ihdr.width, ihdr.height, e);
                self.exhaust();
                return false;
            }
            debug!(
                "header parsed: {}x{}, animated: {}",
                ihdr.width,
                ihdr.height,
                header.is_animated()
            );
            self.header = Some(header);
        }
        let Some(header) = self.header.as_ref() else {
            return false;
        };

        let Some(step) = demux_next_image::<D>(&self.data, header, header.first_image_chunk())
        else {
            return self.stall();
        };
        let animated = header.is_animated();
        self.first_frame_index = usize::from(animated && !header.default_image_is_frame());

        if !self.push_image(step.image) {
            return false;
        }
        self.state = SessionState::HeaderParsed;
        self.cursor = step.next;
        if !animated || self.cursor.is_none() {
            self.exhaust();
        }
        true
    }

    fn demux_frame(&mut self) -> bool {
        let Some(cursor) = self.cursor else {
            self.exhaust();
            return false;
        };
        let Some(header) = self.header.as_ref() else {
            return false;
        };
        let Some(step) = demux_next_image::<D>(&self.data, header, cursor) else {
            return self.stall();
        };
        if !self.push_image(step.image) {
            return false;
        }
        self.state = SessionState::Demuxing;
        self.cursor = step.next;
        if self.cursor.is_none() {
            self.exhaust();
        }
        true
    }

    fn check_canvas(&self, ihdr: &ImageHeader) -> Result<(), DecodeError> {
        let limits = &self.config.limits;
        limits.check_dimensions(ihdr.width, ihdr.height)?;
        limits.check_memory(
            (ihdr.width as usize)
                .saturating_mul(ihdr.height as usize)
                .saturating_mul(4),
        )
    }

    /// Resolve frame metadata and append. Returns `false` if a limit ended
    /// the stream instead.
    fn push_image(&mut self, mut image: DemuxedImage<D>) -> bool {
        if self.images.len() < self.first_frame_index {
            debug!("demuxed default image without frame control");
            self.images.push(image);
            return true;
        }

        let frame_index = self.images.len() - self.first_frame_index;
        let declared = self.declared_frame_count();
        if let Err(e) = self.config.limits.check_frame_count(frame_index, declared) {
            warn!("stopping demux: {}", e);
            self.exhaust();
            return false;
        }
        if let Some(info) = image.frame_info.as_mut() {
            if frame_index == 0 && info.disposal_method == DisposeMethod::RestorePrevious {
                info.disposal_method = DisposeMethod::RestoreBackground;
                info.disposal_rect = Some(info.rect());
            }
            let previous = frame_index.checked_sub(1).and_then(|i| self.frame_info(i));
            info.required_frame = resolve_required_frame(previous.as_ref(), frame_index);
        }
        debug!(
            "demuxed frame {} (requires {:?})",
            frame_index,
            image.frame_info.and_then(|info| info.required_frame)
        );
        self.images.push(image);
        true
    }

    /// No image could be demuxed right now.
    fn stall(&mut self) -> bool {
        if self.finished {
            self.exhaust();
        }
        false
    }

    fn exhaust(&mut self) {
        if self.state == SessionState::Exhausted {
            return;
        }
        if self.first_frame_index == 1 && self.images.len() == 1 {
            debug!("no animation frames, showing the default image as a still");
            self.first_frame_index = 0;
        }
        self.state = SessionState::Exhausted;
        self.cursor = None;
        debug!(
            "stream exhausted with {} frame(s)",
            self.demuxed_frame_count()
        );
    }

    /// Composite the chain of frames `index` depends on, starting from the
    /// nearest cached canvas, and return the canvas of `index`.
    fn composite_to(&mut self, index: usize) -> Result<Canvas, DecodeError> {
        let mut chain = Vec::new();
        let mut next = Some(index);
        while let Some(i) = next {
            if self.canvases.contains_key(&i) {
                break;
            }
            chain.push(i);
            next = self.frame_info(i).and_then(|info| info.required_frame);
        }

        for &i in chain.iter().rev() {
            let state = self.composite_frame(i)?;
            self.canvases.insert(i, state);
            // The next link only needs the canvas just inserted.
            self.trim_cache(Some(i));
        }
        match self.canvases.get(&index) {
            Some(state) => Ok(state.canvas.clone()),
            None => unreachable!("frame {} composited but not cached", index),
        }
    }

    fn composite_frame(&mut self, index: usize) -> Result<CanvasState, DecodeError> {
        let image_index = index + self.first_frame_index;
        let (width, height) = self.canvas_dimensions()?;
        let info = self.frame_info(index);

        let mut state = match info.and_then(|info| info.required_frame) {
            Some(required) => match self.canvases.get(&required) {
                Some(state) => state.clone(),
                None => unreachable!("frame {} requires {} before it is composited", index, required),
            },
            None => CanvasState::blank(width, height, self.config.output),
        };

        self.check_format(image_index)?;
        let op = match info {
            Some(info) => CompositeOp {
                blend: info.blend_mode,
                disposal: info.disposal_method,
                disposal_rect: info.disposal_rect,
                x: info.x_offset,
                y: info.y_offset,
            },
            None => {
                let (x, y) = self.images[image_index].offset();
                CompositeOp {
                    blend: BlendMode::Source,
                    disposal: DisposeMethod::Keep,
                    disposal_rect: None,
                    x,
                    y,
                }
            }
        };
        let pixels = self.ensure_pixels(image_index)?;
        composite(&mut state, pixels, &op)?;
        trace!("composited frame {}", index);
        Ok(state)
    }

    fn check_format(&self, image_index: usize) -> Result<(), DecodeError> {
        let expected = self.images[0].decoder.color_info();
        let found = self.images[image_index].decoder.color_info();
        if expected != found {
            return Err(DecodeError::FormatMismatch { expected, found });
        }
        Ok(())
    }

    /// Decoded pixels of image `image_index`, decoding on first use.
    fn ensure_pixels(&mut self, image_index: usize) -> Result<&FramePixels, DecodeError> {
        let layout = self.config.output.layout;
        let image = &mut self.images[image_index];
        let pixels = match image.pixels.take() {
            Some(pixels) => pixels,
            None => {
                let mut pixels = image.decoder.decode()?;
                let (width, height) = image
                    .frame_info
                    .map_or_else(|| image.decoder.dimensions(), |info| (info.width, info.height));
                if (pixels.width, pixels.height) != (width, height) {
                    return Err(DecodeError::InconsistentImageSizes {
                        width,
                        height,
                        found_width: pixels.width,
                        found_height: pixels.height,
                    });
                }
                pixels.convert_layout(layout);
                trace!("decoded image {}: {}x{}", image_index, width, height);
                pixels
            }
        };
        Ok(image.pixels.insert(pixels))
    }

    fn render_default_image(&mut self) -> Result<Canvas, DecodeError> {
        let (width, height) = self.canvas_dimensions()?;
        let mut state = CanvasState::blank(width, height, self.config.output);
        let (x, y) = self.images[0].offset();
        let op = CompositeOp {
            blend: BlendMode::Source,
            disposal: DisposeMethod::Keep,
            disposal_rect: None,
            x,
            y,
        };
        let pixels = self.ensure_pixels(0)?;
        composite(&mut state, pixels, &op)?;
        self.trim_cache(None);
        Ok(state.into_canvas())
    }
}
