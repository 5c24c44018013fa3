//! Builds RGBA (or float elevation) image tiles.

use crate::error::{DriverError, DriverResult};
use crate::geo::profile::TileKey;
use crate::io::IoOptions;
use crate::raster::{
    RasterDataset, ReadRequest, ResampleAlg, Sample, SampleType, apply_scale_offset, read_band,
};
use crate::tile::{Image, NO_DATA_VALUE, PixelFormat};

use super::bands::{BandClassification, ImageLayout};
use super::palette::{MISSING_ENTRY_COLOR, palette_color};
use super::window::{PixelWindow, compute_window};
use super::{Driver, ValueFilter};

impl Driver {
    /// Build an image tile for `key`.
    ///
    /// Colour bands produce an RGBA8 image; a lone 16-bit or float gray band
    /// is treated as elevation and produces an R32Float image. Pixels
    /// outside the data stay transparent (or [`NO_DATA_VALUE`]).
    pub fn create_image(&self, key: &TileKey, tile_size: u32, io: &IoOptions) -> DriverResult<Image> {
        self.check_request(key, io)?;

        let ts = tile_size as usize;
        let window = compute_window(key.extent(), &self.extent, &self.grid, ts)?;
        let dataset = self.sampling_dataset();
        let bands = BandClassification::classify(dataset)?;
        let resample = self.options.interpolation.image_resample_alg();

        match bands.layout() {
            ImageLayout::Rgb {
                red,
                green,
                blue,
                alpha,
            } => self.read_rgb(dataset, &window, ts, resample, [red, green, blue], alpha),
            ImageLayout::Gray { gray, alpha } => self.read_gray(dataset, &window, ts, resample, gray, alpha),
            ImageLayout::Elevation { band } => self.read_elevation_image(dataset, &window, ts, resample, band),
            ImageLayout::Palette { band } => self.read_palette(dataset, &window, ts, band),
            ImageLayout::Unusable => {
                tracing::warn!(
                    "Could not find red, green and blue bands or gray bands in {}. Cannot create image.",
                    self.name
                );
                Err(DriverError::unavailable("Could not find red, green, blue, or gray band"))
            }
        }
    }

    fn read_rgb(
        &self,
        dataset: &dyn RasterDataset,
        window: &PixelWindow,
        ts: usize,
        resample: ResampleAlg,
        rgb: [usize; 3],
        alpha: Option<usize>,
    ) -> DriverResult<Image> {
        let request = read_request(window, resample);

        let mut channels = Vec::with_capacity(3);
        let mut filters = Vec::with_capacity(4);
        for band in rgb {
            channels.push(read_band::<u8>(dataset, band, &request)?);
            filters.push(self.value_filter(&dataset.band_info(band)?));
        }
        let alpha_channel = match alpha {
            Some(band) => {
                filters.push(self.value_filter(&dataset.band_info(band)?));
                read_band::<u8>(dataset, band, &request)?
            }
            None => vec![255; request.len()],
        };

        let mut image = Image::new(ts, ts, PixelFormat::Rgba8);
        write_flipped(window, ts, |i, col, row| {
            let mut px = [channels[0][i], channels[1][i], channels[2][i], alpha_channel[i]];
            let valid = px
                .iter()
                .zip(&filters)
                .all(|(v, filter)| filter.is_valid(*v as f32));
            if !valid {
                px[3] = 0;
            }
            image.write_rgba(col, row, px);
        });
        Ok(image)
    }

    fn read_gray(
        &self,
        dataset: &dyn RasterDataset,
        window: &PixelWindow,
        ts: usize,
        resample: ResampleAlg,
        gray: usize,
        alpha: Option<usize>,
    ) -> DriverResult<Image> {
        let request = read_request(window, resample);

        let gray_channel = read_band::<u8>(dataset, gray, &request)?;
        let gray_filter = self.value_filter(&dataset.band_info(gray)?);
        let alpha_channel = match alpha {
            Some(band) => Some((
                read_band::<u8>(dataset, band, &request)?,
                self.value_filter(&dataset.band_info(band)?),
            )),
            None => None,
        };

        let mut image = Image::new(ts, ts, PixelFormat::Rgba8);
        write_flipped(window, ts, |i, col, row| {
            let g = gray_channel[i];
            let mut a = 255;
            let mut valid = gray_filter.is_valid(g as f32);
            if let Some((channel, filter)) = &alpha_channel {
                a = channel[i];
                valid &= filter.is_valid(a as f32);
            }
            image.write_rgba(col, row, [g, g, g, if valid { a } else { 0 }]);
        });
        Ok(image)
    }

    fn read_elevation_image(
        &self,
        dataset: &dyn RasterDataset,
        window: &PixelWindow,
        ts: usize,
        resample: ResampleAlg,
        band: usize,
    ) -> DriverResult<Image> {
        let request = read_request(window, resample);
        let info = dataset.band_info(band)?;
        let filter = self.value_filter(&info);

        let mut values = match info.sample_type {
            SampleType::Int16 => masked_samples::<i16>(dataset, band, &request, &filter)?,
            _ => masked_samples::<f32>(dataset, band, &request, &filter)?,
        };

        let (scale, offset) = info.scale_offset();
        apply_scale_offset(&mut values, scale, offset, Some(NO_DATA_VALUE));

        let mut image = Image::new(ts, ts, PixelFormat::R32Float);
        image.fill_f32(NO_DATA_VALUE);
        write_flipped(window, ts, |i, col, row| image.write_f32(col, row, values[i]));
        Ok(image)
    }

    fn read_palette(
        &self,
        dataset: &dyn RasterDataset,
        window: &PixelWindow,
        ts: usize,
        band: usize,
    ) -> DriverResult<Image> {
        // Indices cannot be interpolated
        let request = read_request(window, ResampleAlg::NearestNeighbour);
        let indices = read_band::<u8>(dataset, band, &request)?;
        let info = dataset.band_info(band)?;
        let filter = self.value_filter(&info);

        let mut image = Image::new(ts, ts, PixelFormat::Rgba8);
        write_flipped(window, ts, |i, col, row| {
            let index = indices[i];
            let color = if !filter.is_valid(index as f32) {
                [0, 0, 0, 0]
            } else {
                info.color_table
                    .as_ref()
                    .and_then(|table| palette_color(table, index as usize))
                    .unwrap_or(MISSING_ENTRY_COLOR)
            };
            image.write_rgba(col, row, color);
        });
        Ok(image)
    }
}

fn read_request(window: &PixelWindow, resample: ResampleAlg) -> ReadRequest {
    ReadRequest {
        x_off: window.src_x,
        y_off: window.src_y,
        x_size: window.src_width,
        y_size: window.src_height,
        buf_width: window.dst_width,
        buf_height: window.dst_height,
        resample,
    }
}

/// Visit every destination pixel of `window` with its buffer index and its
/// position in a bottom-left-origin tile.
fn write_flipped(window: &PixelWindow, ts: usize, mut write: impl FnMut(usize, usize, usize)) {
    for src_row in 0..window.dst_height {
        let dst_row = window.dst_y + src_row;
        let flipped = ts - dst_row - 1;
        for src_col in 0..window.dst_width {
            write(src_row * window.dst_width + src_col, window.dst_x + src_col, flipped);
        }
    }
}

/// Read a band as `T` and replace invalid samples with [`NO_DATA_VALUE`].
fn masked_samples<T: Sample>(
    dataset: &dyn RasterDataset,
    band: usize,
    request: &ReadRequest,
    filter: &ValueFilter,
) -> DriverResult<Vec<f32>> {
    Ok(read_band::<T>(dataset, band, request)?
        .into_iter()
        .map(|v| {
            let v = v.to_f64() as f32;
            if filter.is_valid(v) { v } else { NO_DATA_VALUE }
        })
        .collect())
}
