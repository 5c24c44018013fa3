use image::{DynamicImage, ImageFormat};

use crate::error::{DriverError, DriverResult};

use super::{Image, PixelFormat};

/// Decode an in-memory PNG or JPEG into an [`Image`].
///
/// `hint` is a file extension or MIME subtype used to pick the decoder;
/// without one the format is sniffed from the bytes. 16-bit grayscale
/// (the usual encoding for elevation PNGs) becomes an `R32Float` image;
/// everything else is converted to RGBA8. Rows are flipped into the
/// bottom-left origin.
pub fn decode_image(bytes: &[u8], hint: Option<&str>) -> DriverResult<Image> {
    let format = hint.and_then(|h| {
        let h = h.rsplit(['/', '.']).next().unwrap_or(h);
        ImageFormat::from_extension(h)
    });

    let decoded = match format {
        Some(format) => image::load_from_memory_with_format(bytes, format),
        None => image::load_from_memory(bytes),
    }
    .map_err(|e| DriverError::Encoding(format!("Failed to decode image: {}", e)))?;

    let (width, height) = (decoded.width() as usize, decoded.height() as usize);

    match decoded {
        DynamicImage::ImageLuma16(gray) => {
            let mut image = Image::new(width, height, PixelFormat::R32Float);
            for (x, y, px) in gray.enumerate_pixels() {
                image.write_f32(x as usize, height - 1 - y as usize, px.0[0] as f32);
            }
            Ok(image)
        }
        other => {
            let rgba = other.to_rgba8();
            let mut image = Image::new(width, height, PixelFormat::Rgba8);
            for (x, y, px) in rgba.enumerate_pixels() {
                image.write_rgba(x as usize, height - 1 - y as usize, px.0);
            }
            Ok(image)
        }
    }
}
