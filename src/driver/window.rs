//! Maps a tile request onto source and destination pixel windows.

use crate::error::{DriverError, DriverResult};
use crate::geo::transform::GeoTransform;
use crate::geo::{GeoBox, GeoExtent};

/// Coordinates this close to the raster edge snap onto it.
const EDGE_SNAP: f64 = 1e-4;

/// A raster's pixel grid: the forward and inverse geotransforms plus the
/// raster size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelGrid {
    forward: GeoTransform,
    inverse: GeoTransform,
    width: usize,
    height: usize,
}

impl PixelGrid {
    /// Fails if the transform cannot be inverted.
    pub fn new(forward: GeoTransform, width: usize, height: usize) -> DriverResult<Self> {
        Ok(Self {
            inverse: forward.invert()?,
            forward,
            width,
            height,
        })
    }

    pub fn forward(&self) -> &GeoTransform {
        &self.forward
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        self.forward.apply(col, row)
    }

    /// Inverse mapping, snapping values that land within rounding error of
    /// the raster edges.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let (mut col, mut row) = self.inverse.apply(x, y);
        let (w, h) = (self.width as f64, self.height as f64);
        if col.abs() < EDGE_SNAP {
            col = 0.0;
        }
        if row.abs() < EDGE_SNAP {
            row = 0.0;
        }
        if (col - w).abs() < EDGE_SNAP {
            col = w;
        }
        if (row - h).abs() < EDGE_SNAP {
            row = h;
        }
        (col, row)
    }
}

/// Source window (fractional, in sampling-dataset pixels) and destination
/// window (whole tile pixels, top-left origin) for one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelWindow {
    pub src_x: f64,
    pub src_y: f64,
    pub src_width: f64,
    pub src_height: f64,
    pub dst_x: usize,
    pub dst_y: usize,
    pub dst_width: usize,
    pub dst_height: usize,
}

/// Shift a longitude span by whole turns until `west` lies inside the
/// data's own longitude range. Returns the shifted (west, east).
pub fn wrap_longitude(west: f64, width: f64, data_bounds: &GeoBox) -> (f64, f64) {
    let mut west = west;
    while west < data_bounds.xmin() {
        west += 360.0;
    }
    while west > data_bounds.xmax() {
        west -= 360.0;
    }
    (west, west + width)
}

/// Compute the pixel windows for `tile`, or `ResourceUnavailable` when the
/// tile and the data do not overlap.
pub fn compute_window(
    tile: &GeoExtent,
    data: &GeoExtent,
    grid: &PixelGrid,
    tile_size: usize,
) -> DriverResult<PixelWindow> {
    let intersection = tile
        .intersection_same_srs(data)
        .ok_or_else(|| DriverError::unavailable("Tile does not intersect the data extent"))?;

    let (west, east) = if data.srs().is_geodetic() {
        wrap_longitude(intersection.xmin(), intersection.width(), data.bounds())
    } else {
        (intersection.xmin(), intersection.xmax())
    };

    let (mut src_x, mut src_y) = grid.geo_to_pixel(west, intersection.ymax());
    let (src_max_x, src_max_y) = grid.geo_to_pixel(east, intersection.ymin());
    let mut src_width = src_max_x - src_x;
    let mut src_height = src_max_y - src_y;

    let (raster_width, raster_height) = (grid.width as f64, grid.height as f64);
    if src_x < 0.0 {
        src_width += src_x;
        src_x = 0.0;
    }
    if src_y < 0.0 {
        src_height += src_y;
        src_y = 0.0;
    }
    if src_x + src_width > raster_width {
        src_width = raster_width - src_x;
    }
    if src_y + src_height > raster_height {
        src_height = raster_height - src_y;
    }

    let ts = tile_size as f64;
    let target_width = ((intersection.width() / tile.width()) * ts).ceil();
    let target_height = ((intersection.height() / tile.height()) * ts).ceil();
    let offset_left = (((intersection.xmin() - tile.xmin()) / tile.width()) * ts).floor().max(0.0);
    let offset_top = (((tile.ymax() - intersection.ymax()) / tile.height()) * ts).floor().max(0.0);

    let dst_width = target_width.min(ts - offset_left);
    let dst_height = target_height.min(ts - offset_top);

    if src_width <= 0.0 || src_height <= 0.0 || dst_width <= 0.0 || dst_height <= 0.0 {
        return Err(DriverError::unavailable(format!(
            "Empty pixel window for tile (src {}x{}, dst {}x{})",
            src_width, src_height, dst_width, dst_height
        )));
    }

    Ok(PixelWindow {
        src_x,
        src_y,
        src_width,
        src_height,
        dst_x: offset_left as usize,
        dst_y: offset_top as usize,
        dst_width: dst_width as usize,
        dst_height: dst_height as usize,
    })
}
