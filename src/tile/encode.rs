/// Tile encoding utilities
use std::io::Cursor;

use crate::error::{DriverError, DriverResult};

/// Supported output formats for image tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Jpeg,
}

impl RasterFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(RasterFormat::Png),
            "jpg" | "jpeg" => Some(RasterFormat::Jpeg),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
        }
    }
}

/// Encode a top-down RGBA buffer to the specified format
pub fn encode_rgba(rgba: &[u8], width: usize, height: usize, format: RasterFormat) -> DriverResult<Vec<u8>> {
    if rgba.len() != width * height * 4 {
        return Err(DriverError::Encoding(format!(
            "RGBA buffer has {} bytes, expected {} for {}x{}",
            rgba.len(),
            width * height * 4,
            width,
            height
        )));
    }
    match format {
        RasterFormat::Png => encode_png(rgba, width, height),
        RasterFormat::Jpeg => encode_jpeg(rgba, width, height),
    }
}

fn encode_png(rgba: &[u8], width: usize, height: usize) -> DriverResult<Vec<u8>> {
    let mut png_data = Vec::new();
    {
        let mut encoder = png::Encoder::new(Cursor::new(&mut png_data), width as u32, height as u32);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);

        let mut writer = encoder
            .write_header()
            .map_err(|e| DriverError::Encoding(format!("Failed to write PNG header: {}", e)))?;

        writer
            .write_image_data(rgba)
            .map_err(|e| DriverError::Encoding(format!("Failed to write PNG data: {}", e)))?;
    }

    Ok(png_data)
}

/// JPEG has no alpha; transparent pixels are blended onto white.
fn encode_jpeg(rgba: &[u8], width: usize, height: usize) -> DriverResult<Vec<u8>> {
    use image::ImageEncoder;
    use image::codecs::jpeg::JpegEncoder;

    let rgb_data: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|px| {
            let alpha = px[3] as f32 / 255.0;
            let blend = |c: u8| ((c as f32 * alpha) + (255.0 * (1.0 - alpha))) as u8;
            [blend(px[0]), blend(px[1]), blend(px[2])]
        })
        .collect();

    let mut jpeg_data = Vec::new();
    JpegEncoder::new_with_quality(Cursor::new(&mut jpeg_data), 85)
        .write_image(&rgb_data, width as u32, height as u32, image::ExtendedColorType::Rgb8)
        .map_err(|e| DriverError::Encoding(format!("Failed to encode JPEG: {}", e)))?;

    Ok(jpeg_data)
}
