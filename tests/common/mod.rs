//! Common test utilities and fixtures
//!
//! Builds small in-memory datasets with known values so tile contents can
//! be checked exactly.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use tilesampler::raster::memory::{MemBand, MemDataset, MemLibrary};
use tilesampler::{
    Driver, GeoBox, GeoExtent, GeoTransform, IoOptions, SourceOptions, SpatialReference, TileKey,
};

static INIT: Once = Once::new();

/// Initialize test logging
pub fn init_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("tilesampler=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// A lat/lon dataset whose top-left corner is at (`west`, `north`) with
/// square pixels of `res` degrees.
pub fn geodetic_dataset(name: &str, width: usize, height: usize, west: f64, north: f64, res: f64) -> MemDataset {
    MemDataset::new(name, width, height)
        .with_geo_transform(GeoTransform::north_up(west, north, res, res))
        .with_projection("EPSG:4326")
}

/// Whole-globe dataset with `width` x `height` pixels.
pub fn whole_globe(name: &str, width: usize, height: usize) -> MemDataset {
    MemDataset::new(name, width, height)
        .with_geo_transform(GeoTransform::north_up(
            -180.0,
            90.0,
            360.0 / width as f64,
            180.0 / height as f64,
        ))
        .with_projection("EPSG:4326")
}

/// 2x2 float DEM over lon 0..2, lat 0..2:
///
/// ```text
///  0 10
/// 20 30
/// ```
pub fn dem_2x2() -> MemDataset {
    geodetic_dataset("dem.tif", 2, 2, 0.0, 2.0, 1.0).with_band(MemBand::from_f32(&[0.0, 10.0, 20.0, 30.0]))
}

/// Register `dataset` under its own name and open a driver on it.
pub fn open_driver(dataset: MemDataset, options: SourceOptions, tile_size: u32) -> Driver {
    init_logging();
    let library = MemLibrary::new();
    let name = options.source_name().unwrap_or("test.tif").to_string();
    library.insert(name.clone(), dataset);
    let options = SourceOptions {
        uri: Some(name),
        ..options
    };
    Driver::open(&library, "test", &options, tile_size, &IoOptions::default()).expect("driver should open")
}

/// Open with default options.
pub fn open_default(dataset: MemDataset, tile_size: u32) -> Driver {
    open_driver(dataset, SourceOptions::default(), tile_size)
}

/// Open a shared dataset without going through a library.
pub fn open_shared(dataset: Arc<MemDataset>, options: &SourceOptions) -> Driver {
    init_logging();
    Driver::open_dataset(dataset, "shared", options, 256, &IoOptions::default()).expect("driver should open")
}

/// Lat/lon tile key over explicit bounds.
pub fn geodetic_key(level: u32, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> TileKey {
    TileKey::new(
        level,
        GeoExtent::new(SpatialReference::wgs84(), GeoBox::new(xmin, ymin, xmax, ymax)),
    )
}

/// Options that select nearest-neighbour sampling.
pub fn nearest() -> SourceOptions {
    SourceOptions {
        interpolation: tilesampler::Interpolation::Nearest,
        ..Default::default()
    }
}
