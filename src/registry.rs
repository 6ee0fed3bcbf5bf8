//! Picking a decoder for a buffer.
//!
//! A [`DecoderRegistry`] holds factories ordered by priority. Each factory
//! probes the leading bytes and either declines or builds a [`FrameSource`].
//! Equal priorities keep registration order, so lookups never depend on hash
//! iteration order.

use log::debug;

use crate::composite::Canvas;
use crate::decoder::{DecodeConfig, DecodeError, StillDecoder};
use crate::demux::{FrameInfo, LoopCount};
use crate::session::AnimationSession;

/// An animated image as seen by presentation code.
pub trait FrameSource {
    /// Canvas width and height, once known.
    fn canvas_size(&self) -> Option<(u32, u32)>;

    /// Frames available so far.
    fn frame_count(&mut self) -> usize;

    /// How often the animation plays.
    fn play_count(&self) -> LoopCount;

    /// Metadata of frame `index`, if it has any.
    fn frame_info(&self, index: usize) -> Option<FrameInfo>;

    /// Composited canvas of frame `index`.
    fn get_frame(&mut self, index: usize) -> Result<Canvas, DecodeError>;

    /// Drop cached state for every frame except `keep`.
    fn clear_cache_except_frame(&mut self, keep: Option<usize>);
}

impl<D: StillDecoder> FrameSource for AnimationSession<D> {
    fn canvas_size(&self) -> Option<(u32, u32)> {
        AnimationSession::canvas_size(self)
    }

    fn frame_count(&mut self) -> usize {
        AnimationSession::frame_count(self)
    }

    fn play_count(&self) -> LoopCount {
        AnimationSession::play_count(self)
    }

    fn frame_info(&self, index: usize) -> Option<FrameInfo> {
        AnimationSession::frame_info(self, index)
    }

    fn get_frame(&mut self, index: usize) -> Result<Canvas, DecodeError> {
        AnimationSession::get_frame(self, index)
    }

    fn clear_cache_except_frame(&mut self, keep: Option<usize>) {
        AnimationSession::clear_cache_except_frame(self, keep)
    }
}

/// Builds a [`FrameSource`] for a buffer, or declines with `None`.
pub type DecoderFactory = Box<dyn Fn(&[u8]) -> Option<Box<dyn FrameSource>>>;

struct Entry {
    priority: i32,
    factory: DecoderFactory,
}

/// Priority-ordered collection of decoder factories.
#[derive(Default)]
pub struct DecoderRegistry {
    entries: Vec<Entry>,
}

impl core::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DecoderRegistry")
            .field(
                "priorities",
                &self.entries.iter().map(|e| e.priority).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl DecoderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the APNG decoder at priority 0.
    pub fn with_defaults(config: DecodeConfig) -> Self {
        let mut registry = Self::new();
        registry.add_factory(0, move |data: &[u8]| {
            if !AnimationSession::can_decode(data) {
                return None;
            }
            let session = AnimationSession::from_bytes(data, config.clone()).ok()?;
            Some(Box::new(session) as Box<dyn FrameSource>)
        });
        registry
    }

    /// Register a factory. Higher priorities are tried first; equal
    /// priorities in registration order.
    pub fn add_factory<F>(&mut self, priority: i32, factory: F)
    where
        F: Fn(&[u8]) -> Option<Box<dyn FrameSource>> + 'static,
    {
        self.entries.push(Entry {
            priority,
            factory: Box::new(factory),
        });
        // Stable, so equal priorities keep registration order.
        self.entries.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no factory is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a source from the first factory that accepts `data`.
    pub fn create_compatible(&self, data: &[u8]) -> Option<Box<dyn FrameSource>> {
        self.entries.iter().enumerate().find_map(|(i, entry)| {
            let source = (entry.factory)(data)?;
            debug!("decoder {} (priority {}) accepted input", i, entry.priority);
            Some(source)
        })
    }
}
