//! On-demand tile sampling from georeferenced raster datasets.
//!
//! A [`Driver`] is opened once per data source. Opening resolves the
//! dataset's spatial reference, decides whether the pixel grid has to be
//! virtually warped, and works out the tiling profile and the deepest level
//! worth reading. After that, [`Driver::create_image`] and
//! [`Driver::create_heightfield`] build fixed-size tiles for any [`TileKey`].
//!
//! Raster access goes through the [`raster::RasterLibrary`] seam. The
//! in-memory backend is always available; the GDAL backend is compiled in
//! with the `gdal-support` feature.

pub mod config;
pub mod driver;
pub mod error;
pub mod geo;
pub mod io;
pub mod raster;
pub mod tile;

pub use config::{Config, Interpolation, SourceOptions};
pub use driver::{Driver, Workspace};
pub use error::{DriverError, DriverResult, ErrorKind};
pub use geo::profile::{DataExtent, Profile, TileKey};
pub use geo::srs::SpatialReference;
pub use geo::transform::GeoTransform;
pub use geo::{GeoBox, GeoExtent};
pub use io::{CancelToken, IoOptions};
pub use tile::{Heightfield, Image, NO_DATA_VALUE, PixelFormat, RasterFormat};
