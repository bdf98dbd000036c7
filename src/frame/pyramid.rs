//! Multi-resolution frame pyramid.
//!
//! Each layer halves the resolution of the one above it by averaging 2x2
//! blocks. The finest layer is the frame itself; no smoothing is applied
//! before downsampling, consumers bring their own filtering.

use image::{ImageBuffer, Luma, Pixel, Rgb};

use super::Frame;

/// No pyramid layer is allowed to fall below this width or height.
pub const MIN_LAYER_SIZE: u32 = 20;

/// The coarsest layer keeps at least `1 / COARSEST_WIDTH_DIVISOR` of the frame width.
const COARSEST_WIDTH_DIVISOR: u64 = 10;

/// 8-bit pixel layouts a pyramid can be built in.
pub trait PyramidPixel: Pixel<Subpixel = u8> + 'static {
    fn from_frame(frame: &Frame) -> ImageBuffer<Self, Vec<u8>>;
}

impl PyramidPixel for Luma<u8> {
    fn from_frame(frame: &Frame) -> ImageBuffer<Self, Vec<u8>> {
        frame.to_luma8()
    }
}

impl PyramidPixel for Rgb<u8> {
    fn from_frame(frame: &Frame) -> ImageBuffer<Self, Vec<u8>> {
        frame.to_rgb8()
    }
}

pub type PyramidLayer<P> = ImageBuffer<P, Vec<u8>>;

/// A frame pyramid, finest layer first.
#[derive(Debug, Clone)]
pub struct FramePyramid<P: PyramidPixel> {
    layers: Vec<PyramidLayer<P>>,
}

impl<P: PyramidPixel> FramePyramid<P> {
    pub fn new(frame: &Frame, layers: u32) -> Self {
        let mut pyramid = Self { layers: Vec::new() };
        pyramid.replace(frame, layers);
        pyramid
    }

    /// Number of layers worth building for a frame resolution.
    ///
    /// Layers are added while the next one stays at least
    /// [`MIN_LAYER_SIZE`] in both dimensions and at least a tenth of the
    /// frame width. The finest layer always exists.
    pub fn ideal_layers(width: u32, height: u32) -> u32 {
        let mut layers = 1;
        let (mut layer_width, mut layer_height) = (width, height);

        loop {
            let (next_width, next_height) = (layer_width / 2, layer_height / 2);
            if next_width < MIN_LAYER_SIZE
                || next_height < MIN_LAYER_SIZE
                || next_width as u64 * COARSEST_WIDTH_DIVISOR < width as u64
            {
                return layers;
            }
            layer_width = next_width;
            layer_height = next_height;
            layers += 1;
        }
    }

    /// Rebuild the pyramid for a new frame.
    ///
    /// Coarser layers whose geometry is unchanged are overwritten in place;
    /// only the finest layer is freshly converted from the frame.
    pub fn replace(&mut self, frame: &Frame, layers: u32) {
        // coarse layers of the old frame, finest of them last so `pop` yields it first
        let mut previous_coarse: Vec<PyramidLayer<P>> = if self.layers.len() > 1 {
            self.layers.drain(1..).rev().collect()
        } else {
            Vec::new()
        };

        let finest = P::from_frame(frame);
        match self.layers.first_mut() {
            Some(layer) => *layer = finest,
            None => self.layers.push(finest),
        }

        for _ in 1..layers.max(1) {
            let Some(source) = self.layers.last() else {
                break;
            };
            let (width, height) = (source.width() / 2, source.height() / 2);
            if width == 0 || height == 0 {
                break;
            }

            let mut target = match previous_coarse.pop() {
                Some(layer) if layer.dimensions() == (width, height) => layer,
                _ => ImageBuffer::new(width, height),
            };
            downsample_2x2(source, &mut target);
            self.layers.push(target);
        }
    }

    pub fn layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer(&self, index: usize) -> Option<&PyramidLayer<P>> {
        self.layers.get(index)
    }

    pub fn finest_layer(&self) -> &PyramidLayer<P> {
        &self.layers[0]
    }

    pub fn coarsest_layer(&self) -> &PyramidLayer<P> {
        &self.layers[self.layers.len() - 1]
    }
}

/// Average each 2x2 block of `source` into one pixel of `target`.
///
/// An odd last row or column of the source is ignored.
fn downsample_2x2<P: PyramidPixel>(source: &PyramidLayer<P>, target: &mut PyramidLayer<P>) {
    let channels = P::CHANNEL_COUNT as usize;
    let source_stride = source.width() as usize * channels;
    let target_stride = target.width() as usize * channels;
    let source = source.as_raw();

    for (y, row) in target.chunks_exact_mut(target_stride).enumerate() {
        let top = &source[2 * y * source_stride..];
        let bottom = &source[(2 * y + 1) * source_stride..];

        for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
            let left = 2 * x * channels;
            let right = left + channels;
            for (c, value) in pixel.iter_mut().enumerate() {
                let sum = top[left + c] as u16
                    + top[right + c] as u16
                    + bottom[left + c] as u16
                    + bottom[right + c] as u16;
                *value = ((sum + 2) / 4) as u8;
            }
        }
    }
}
