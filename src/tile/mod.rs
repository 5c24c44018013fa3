//! Pixel containers produced by the driver.
//!
//! Both containers use a bottom-left origin: row 0 is the southern edge of
//! the tile. Encoders flip back to top-down order on the way out.

mod decode;
mod encode;

pub use decode::decode_image;
pub use encode::{RasterFormat, encode_rgba};

use crate::error::DriverResult;

/// Marks a heightfield cell (or float image pixel) that holds no valid
/// measurement.
pub const NO_DATA_VALUE: f32 = -f32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    R32Float,
}

#[derive(Debug, Clone, PartialEq)]
enum Pixels {
    Rgba8(Vec<u8>),
    R32Float(Vec<f32>),
}

/// A 2D image, either packed RGBA8 or single-channel 32-bit float.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    pixels: Pixels,
}

impl Image {
    /// New image with every pixel zeroed (transparent black for RGBA).
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Self {
        let pixels = match format {
            PixelFormat::Rgba8 => Pixels::Rgba8(vec![0; width * height * 4]),
            PixelFormat::R32Float => Pixels::R32Float(vec![0.0; width * height]),
        };
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        match self.pixels {
            Pixels::Rgba8(_) => PixelFormat::Rgba8,
            Pixels::R32Float(_) => PixelFormat::R32Float,
        }
    }

    fn index(&self, col: usize, row: usize) -> Option<usize> {
        (col < self.width && row < self.height).then(|| row * self.width + col)
    }

    /// Write one RGBA pixel. Ignored for float images and out-of-range cells.
    pub fn write_rgba(&mut self, col: usize, row: usize, rgba: [u8; 4]) {
        let Some(i) = self.index(col, row) else {
            return;
        };
        if let Pixels::Rgba8(data) = &mut self.pixels {
            data[i * 4..i * 4 + 4].copy_from_slice(&rgba);
        }
    }

    /// Write one float pixel. Ignored for RGBA images and out-of-range cells.
    pub fn write_f32(&mut self, col: usize, row: usize, value: f32) {
        let Some(i) = self.index(col, row) else {
            return;
        };
        if let Pixels::R32Float(data) = &mut self.pixels {
            data[i] = value;
        }
    }

    pub fn rgba_at(&self, col: usize, row: usize) -> Option<[u8; 4]> {
        let i = self.index(col, row)?;
        match &self.pixels {
            Pixels::Rgba8(data) => Some([data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]]),
            Pixels::R32Float(_) => None,
        }
    }

    pub fn f32_at(&self, col: usize, row: usize) -> Option<f32> {
        let i = self.index(col, row)?;
        match &self.pixels {
            Pixels::R32Float(data) => Some(data[i]),
            Pixels::Rgba8(_) => None,
        }
    }

    pub fn fill_rgba(&mut self, rgba: [u8; 4]) {
        if let Pixels::Rgba8(data) = &mut self.pixels {
            for px in data.chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
    }

    pub fn fill_f32(&mut self, value: f32) {
        if let Pixels::R32Float(data) = &mut self.pixels {
            data.fill(value);
        }
    }

    /// Raw RGBA bytes, bottom row first.
    pub fn as_rgba8(&self) -> Option<&[u8]> {
        match &self.pixels {
            Pixels::Rgba8(data) => Some(data),
            Pixels::R32Float(_) => None,
        }
    }

    /// Raw float samples, bottom row first.
    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.pixels {
            Pixels::R32Float(data) => Some(data),
            Pixels::Rgba8(_) => None,
        }
    }

    /// RGBA bytes reordered top row first, as image files expect.
    pub fn to_top_down_rgba(&self) -> Option<Vec<u8>> {
        let data = self.as_rgba8()?;
        let stride = self.width * 4;
        Some(
            data.chunks_exact(stride.max(1))
                .rev()
                .flatten()
                .copied()
                .collect(),
        )
    }

    /// Encode to PNG or JPEG. Only RGBA images can be encoded.
    pub fn encode(&self, format: RasterFormat) -> DriverResult<Vec<u8>> {
        let rgba = self.to_top_down_rgba().ok_or_else(|| {
            crate::error::DriverError::Encoding(format!(
                "cannot encode a {:?} image as {}",
                self.format(),
                format.extension()
            ))
        })?;
        encode_rgba(&rgba, self.width, self.height, format)
    }
}

/// Regular grid of elevations, row 0 at the south edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

impl Heightfield {
    /// New heightfield with every cell set to [`NO_DATA_VALUE`].
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            heights: vec![NO_DATA_VALUE; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn height_at(&self, col: usize, row: usize) -> Option<f32> {
        (col < self.width && row < self.height).then(|| self.heights[row * self.width + col])
    }

    pub fn set_height(&mut self, col: usize, row: usize, value: f32) {
        if col < self.width && row < self.height {
            self.heights[row * self.width + col] = value;
        }
    }

    pub fn fill(&mut self, value: f32) {
        self.heights.fill(value);
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    pub fn heights_mut(&mut self) -> &mut [f32] {
        &mut self.heights
    }

    /// Number of cells holding a real measurement.
    pub fn valid_count(&self) -> usize {
        self.heights.iter().filter(|&&h| h != NO_DATA_VALUE).count()
    }

    /// Little-endian f32 dump, south row first.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.heights.iter().flat_map(|h| h.to_le_bytes()).collect()
    }
}
