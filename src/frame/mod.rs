//! Frames, the frame-source interface and multi-resolution pyramids.

pub mod memory;
pub mod provider;
pub mod pyramid;

use std::sync::Arc;

use image::{ColorType, DynamicImage, GenericImageView};

pub use memory::{CacheRequest, MemoryFrameProvider};
pub use provider::{FrameProvider, PREFETCH_PRIORITY};
pub use pyramid::{FramePyramid, PyramidPixel, MIN_LAYER_SIZE};

/// A decoded frame.
pub type Frame = DynamicImage;

/// Shared handle to a frame; frame sources usually cache what they hand out.
pub type FrameRef = Arc<Frame>;

/// Resolution and pixel layout of the frames delivered by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameType {
    pub width: u32,
    pub height: u32,
    pub color: ColorType,
}

impl FrameType {
    pub fn new(width: u32, height: u32, color: ColorType) -> Self {
        Self {
            width,
            height,
            color,
        }
    }

    pub fn of(frame: &Frame) -> Self {
        let (width, height) = frame.dimensions();
        Self::new(width, height, frame.color())
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

/// Convert a frame into its single-plane layout without alpha channel.
///
/// Frames that carry no alpha are returned as the same shared handle.
pub fn strip_alpha(frame: &FrameRef) -> FrameRef {
    let converted = match frame.as_ref() {
        DynamicImage::ImageLumaA8(_) => DynamicImage::ImageLuma8(frame.to_luma8()),
        DynamicImage::ImageLumaA16(_) => DynamicImage::ImageLuma16(frame.to_luma16()),
        DynamicImage::ImageRgba8(_) => DynamicImage::ImageRgb8(frame.to_rgb8()),
        DynamicImage::ImageRgba16(_) => DynamicImage::ImageRgb16(frame.to_rgb16()),
        DynamicImage::ImageRgba32F(_) => DynamicImage::ImageRgb32F(frame.to_rgb32f()),
        _ => return Arc::clone(frame),
    };
    Arc::new(converted)
}
