//! Builds single-band float heightfields.
//!
//! Two samplers: area-pixel sources with interpolation sample every output
//! cell straight from the dataset, everything else reads one buffered
//! window into a [`Workspace`] and interpolates inside it.

use crate::config::Interpolation;
use crate::error::{DriverError, DriverResult};
use crate::geo::profile::TileKey;
use crate::io::IoOptions;
use crate::raster::{RasterDataset, ReadRequest, ResampleAlg, apply_scale_offset, read_band, read_band_into};
use crate::tile::{Heightfield, NO_DATA_VALUE};

use super::window::wrap_longitude;
use super::workspace::Workspace;
use super::{Driver, ValueFilter};

/// Source pixels added around the tile footprint on the bulk-read path.
/// Larger margins leave gaps between neighbouring tiles.
pub const POINT_SAMPLE_MARGIN: f64 = 0.5;

/// Tolerance for snapping buffer coordinates onto its edges.
const UV_EPSILON: f64 = 1e-6;

impl Driver {
    /// Build a `tile_size` x `tile_size` heightfield for `key` from band 1.
    ///
    /// Cells without a valid sample hold [`NO_DATA_VALUE`].
    pub fn create_heightfield(&self, key: &TileKey, tile_size: u32, io: &IoOptions) -> DriverResult<Heightfield> {
        let mut workspace = self.workspaces.checkout();
        let result = self.create_heightfield_with(key, tile_size, io, &mut workspace);
        self.workspaces.checkin(workspace);
        result
    }

    /// Like [`create_heightfield`](Self::create_heightfield) but reads
    /// through a caller-owned scratch buffer.
    pub fn create_heightfield_with(
        &self,
        key: &TileKey,
        tile_size: u32,
        io: &IoOptions,
        workspace: &mut Workspace,
    ) -> DriverResult<Heightfield> {
        self.check_request(key, io)?;

        let tile = key.extent();
        let intersection = tile
            .intersection_same_srs(&self.extent)
            .ok_or_else(|| DriverError::unavailable("Tile does not intersect the data extent"))?;

        // Longitude offset that moves tile coordinates into the data's frame
        let shift = if self.extent.srs().is_geodetic() {
            wrap_longitude(intersection.xmin(), intersection.width(), &self.bounds).0 - intersection.xmin()
        } else {
            0.0
        };

        let ts = tile_size as usize;
        let mut heightfield = Heightfield::new(ts, ts);
        if ts == 0 {
            return Ok(heightfield);
        }

        let dataset = self.sampling_dataset();
        let info = dataset.band_info(1)?;
        let filter = self.value_filter(&info);

        let cells = CellGrid {
            xmin: tile.xmin() + shift,
            ymin: tile.ymin(),
            dx: tile.width() / (ts - 1).max(1) as f64,
            dy: tile.height() / (ts - 1).max(1) as f64,
            size: ts,
        };

        let interpolation = self.options.interpolation;
        if self.pixel_is_area && interpolation != Interpolation::Nearest {
            tracing::trace!("{}: area sampling level {}", self.name, key.level);
            self.sample_area(dataset, &cells, &filter, &mut heightfield);
        } else {
            tracing::trace!("{}: bulk sampling level {}", self.name, key.level);
            self.sample_points(dataset, &cells, interpolation, &filter, workspace, &mut heightfield)?;
        }

        let heights = heightfield.heights_mut();
        if self.linear_units != 1.0 {
            for h in heights.iter_mut().filter(|h| **h != NO_DATA_VALUE) {
                *h = (*h as f64 * self.linear_units) as f32;
            }
        }
        let (scale, offset) = info.scale_offset();
        apply_scale_offset(heights, scale, offset, Some(NO_DATA_VALUE));

        Ok(heightfield)
    }

    /// Sample each cell centre directly from the dataset.
    fn sample_area(
        &self,
        dataset: &dyn RasterDataset,
        cells: &CellGrid,
        filter: &ValueFilter,
        heightfield: &mut Heightfield,
    ) {
        let (width, height) = self.grid.size();
        for row in 0..cells.size {
            for col in 0..cells.size {
                let (x, y) = cells.position(col, row);
                let (c, r) = self.grid.geo_to_pixel(x, y);
                let value = area_pixel(c - 0.5, width)
                    .zip(area_pixel(r - 0.5, height))
                    .and_then(|(c, r)| sample_dataset(dataset, c, r, filter));
                if let Some(h) = value {
                    heightfield.set_height(col, row, h);
                }
            }
        }
    }

    /// Read the tile footprint once and interpolate every cell from the
    /// buffer.
    fn sample_points(
        &self,
        dataset: &dyn RasterDataset,
        cells: &CellGrid,
        interpolation: Interpolation,
        filter: &ValueFilter,
        workspace: &mut Workspace,
        heightfield: &mut Heightfield,
    ) -> DriverResult<()> {
        let (width, height) = self.grid.size();
        let ts = cells.size;
        let (xmax, ymax) = cells.position(ts - 1, ts - 1);

        let (tile_col_min, tile_row_max) = self.grid.geo_to_pixel(cells.xmin, cells.ymin);
        let (tile_col_max, tile_row_min) = self.grid.geo_to_pixel(xmax, ymax);

        let col_min = (tile_col_min - POINT_SAMPLE_MARGIN).floor().max(0.0);
        let col_max = (tile_col_max + POINT_SAMPLE_MARGIN).ceil().min(width as f64 - 1.0);
        let row_min = (tile_row_min - POINT_SAMPLE_MARGIN).floor().max(0.0);
        let row_max = (tile_row_max + POINT_SAMPLE_MARGIN).ceil().min(height as f64 - 1.0);
        if col_max < col_min || row_max < row_min {
            return Err(DriverError::unavailable("Tile footprint falls outside the raster"));
        }

        let request = ReadRequest {
            x_off: col_min,
            y_off: row_min,
            x_size: col_max - col_min + 1.0,
            y_size: row_max - row_min + 1.0,
            buf_width: ts,
            buf_height: ts,
            resample: ResampleAlg::NearestNeighbour,
        };
        let buffer = workspace.reset(ts * ts, NO_DATA_VALUE);
        if let Err(e) = read_band_into::<f32>(dataset, 1, &request, buffer) {
            tracing::warn!("{}: bulk elevation read failed: {}", self.name, e);
            return Err(DriverError::unavailable(format!("Raster read failed ({})", e)));
        }

        // Extent of the buffered pixels, which differs slightly from the tile
        let (buf_xmin, buf_ymin) = self.grid.pixel_to_geo(col_min, row_max + 1.0);
        let (buf_xmax, buf_ymax) = self.grid.pixel_to_geo(col_max + 1.0, row_min);

        for row in 0..ts {
            for col in 0..ts {
                let (x, y) = cells.position(col, row);
                let u = snap_unit((x - buf_xmin) / (buf_xmax - buf_xmin));
                let v = snap_unit((y - buf_ymin) / (buf_ymax - buf_ymin));
                if !(0.0..=1.0).contains(&u) || !(0.0..=1.0).contains(&v) {
                    continue;
                }
                // The buffer runs north to south
                let h = sample_workspace(buffer, ts, ts, u, 1.0 - v, interpolation, filter);
                heightfield.set_height(col, row, h);
            }
        }
        Ok(())
    }
}

/// Output cell centres in the data's frame. Row 0 is the south edge.
struct CellGrid {
    xmin: f64,
    ymin: f64,
    dx: f64,
    dy: f64,
    size: usize,
}

impl CellGrid {
    fn position(&self, col: usize, row: usize) -> (f64, f64) {
        (self.xmin + self.dx * col as f64, self.ymin + self.dy * row as f64)
    }
}

/// Centre-relative pixel coordinate, pulled onto the first or last pixel
/// when within half a pixel outside it. `None` beyond that.
fn area_pixel(p: f64, size: usize) -> Option<f64> {
    let last = size as f64 - 1.0;
    let p = if (-0.5..0.0).contains(&p) {
        0.0
    } else if p > last && p <= last + 0.5 {
        last
    } else {
        p
    };
    (p >= 0.0 && p <= last).then_some(p)
}

fn is_sample_valid(value: f32, filter: &ValueFilter) -> bool {
    value != NO_DATA_VALUE && filter.is_valid(value)
}

/// Bilinear sample of the dataset at centre-relative pixel `(c, r)`.
fn sample_dataset(dataset: &dyn RasterDataset, c: f64, r: f64, filter: &ValueFilter) -> Option<f32> {
    let (width, height) = dataset.raster_size();
    let col_min = c.floor() as usize;
    let col_max = (c.ceil() as usize).min(width.saturating_sub(1)).max(col_min);
    let row_min = r.floor() as usize;
    let row_max = (r.ceil() as usize).min(height.saturating_sub(1)).max(row_min);

    let cols = col_max - col_min + 1;
    let request = ReadRequest::pixels(col_min, row_min, cols, row_max - row_min + 1);
    let window = match read_band::<f32>(dataset, 1, &request) {
        Ok(window) => window,
        Err(e) => {
            tracing::trace!("Elevation read at ({}, {}) failed: {}", c, r, e);
            return None;
        }
    };
    let at = |col: usize, row: usize| window[(row - row_min) * cols + (col - col_min)];

    let corners = [
        at(col_min, row_min),
        at(col_max, row_min),
        at(col_min, row_max),
        at(col_max, row_max),
    ];
    if !corners.iter().all(|v| is_sample_valid(*v, filter)) {
        return None;
    }
    Some(interpolate(corners, c - col_min as f64, r - row_min as f64))
}

/// Bilinear blend of `[top_left, top_right, bottom_left, bottom_right]`
/// at fractional offsets `(fx, fy)` from the top-left sample.
pub fn interpolate(corners: [f32; 4], fx: f64, fy: f64) -> f32 {
    let [tl, tr, bl, br] = corners.map(f64::from);
    let top = tl * (1.0 - fx) + tr * fx;
    let bottom = bl * (1.0 - fx) + br * fx;
    (top * (1.0 - fy) + bottom * fy) as f32
}

fn snap_unit(t: f64) -> f64 {
    if t.abs() < UV_EPSILON {
        0.0
    } else if (t - 1.0).abs() < UV_EPSILON {
        1.0
    } else {
        t
    }
}

/// Sample a row-major `width` x `height` buffer at unit coordinates
/// `(u, v)`, with `v = 0` at the first row.
///
/// Buffer samples are pixel centres. Nearest picks the sample under the
/// point; the other policies blend the four surrounding samples. Returns
/// [`NO_DATA_VALUE`] if any sample used is invalid.
pub fn sample_workspace(
    data: &[f32],
    width: usize,
    height: usize,
    u: f64,
    v: f64,
    interpolation: Interpolation,
    filter: &ValueFilter,
) -> f32 {
    let (w, h) = (width as f64, height as f64);
    let u = u.clamp(0.0, 1.0);
    let v = v.clamp(0.0, 1.0);

    if interpolation == Interpolation::Nearest {
        let x = (u * w).clamp(0.0, w - 1.0) as usize;
        let y = (v * h).clamp(0.0, h - 1.0) as usize;
        let value = data[y * width + x];
        return if is_sample_valid(value, filter) { value } else { NO_DATA_VALUE };
    }

    let c = (u * w - 0.5).clamp(0.0, w - 1.0);
    let r = (v * h - 0.5).clamp(0.0, h - 1.0);
    let (col_min, col_max) = (c.floor() as usize, c.ceil() as usize);
    let (row_min, row_max) = (r.floor() as usize, r.ceil() as usize);

    let corners = [
        data[row_min * width + col_min],
        data[row_min * width + col_max],
        data[row_max * width + col_min],
        data[row_max * width + col_max],
    ];
    if !corners.iter().all(|v| is_sample_valid(*v, filter)) {
        return NO_DATA_VALUE;
    }
    interpolate(corners, c - col_min as f64, r - row_min as f64)
}
