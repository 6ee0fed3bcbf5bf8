use super::limits::Limits;
use crate::composite::{AlphaType, PixelFormat, PixelLayout};

/// Session configuration. Reusable across sessions.
///
/// ```rust
/// use zenapng::{AlphaType, DecodeConfig, Limits, PixelLayout};
///
/// let config = DecodeConfig::default()
///     .layout(PixelLayout::Bgra8)
///     .alpha_type(AlphaType::Premultiplied)
///     .limits(Limits::default().max_frame_count(500));
/// assert_eq!(config.output.layout, PixelLayout::Bgra8);
/// ```
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DecodeConfig {
    /// Pixel format of composited canvases. Default: RGBA8, unpremultiplied.
    pub output: PixelFormat,
    /// Resource limits. Default: [`Limits::default`].
    pub limits: Limits,
}

impl DecodeConfig {
    /// Set the channel order of composited canvases.
    #[must_use]
    pub fn layout(mut self, layout: PixelLayout) -> Self {
        self.output.layout = layout;
        self
    }

    /// Set the alpha convention of composited canvases.
    #[must_use]
    pub fn alpha_type(mut self, alpha: AlphaType) -> Self {
        self.output.alpha = alpha;
        self
    }

    /// Replace the resource limits.
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
