//! The tile sampling driver.
//!
//! [`Driver::open`] runs once per source: it opens the dataset (descending
//! into a sub-dataset if needed), resolves its spatial reference, decides
//! whether a virtual warp is needed, and derives the tiling profile, data
//! extent and maximum level. The tile builders in [`image`] and
//! [`elevation`] then only read.

pub mod bands;
pub mod elevation;
pub mod image;
pub mod opener;
pub mod palette;
pub mod srs_resolver;
pub mod warp;
pub mod window;
pub mod workspace;

use std::path::Path;
use std::sync::Arc;

use crate::config::SourceOptions;
use crate::error::{DriverError, DriverResult};
use crate::geo::profile::{DataExtent, Profile, TileKey};
use crate::geo::transform::GeoTransform;
use crate::geo::{GeoBox, GeoExtent};
use crate::io::IoOptions;
use crate::raster::{BandInfo, RasterDataset, RasterLibrary};

use opener::DatasetHandle;
use window::PixelGrid;
pub use workspace::Workspace;
use workspace::WorkspacePool;

/// Nodata assumed for bands that do not declare one.
const DEFAULT_BAND_NO_DATA: f32 = -32767.0;

/// The dataset tiles are read from: the source itself, or a warped view
/// of it.
enum SamplingHandle {
    Source,
    Warped(Box<dyn RasterDataset>),
}

/// An opened data source, ready to build tiles.
///
/// All tile builders take `&self` and may run concurrently as long as the
/// raster backend supports concurrent reads on one dataset.
pub struct Driver {
    // Declared before `source` so a warped view is dropped before the
    // dataset it reads from.
    sampling: SamplingHandle,
    source: DatasetHandle,
    name: String,
    grid: PixelGrid,
    profile: Profile,
    bounds: GeoBox,
    extent: GeoExtent,
    max_level: u32,
    linear_units: f64,
    pixel_is_area: bool,
    options: SourceOptions,
    workspaces: WorkspacePool,
}

impl std::fmt::Debug for Driver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Driver")
            .field("name", &self.name)
            .field("warped", &matches!(self.sampling, SamplingHandle::Warped(_)))
            .field("profile", &self.profile)
            .field("extent", &self.extent)
            .field("max_level", &self.max_level)
            .field("pixel_is_area", &self.pixel_is_area)
            .field("options", &self.options)
            .finish()
    }
}

/// Validity rule for raw band values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueFilter {
    pub band_no_data: f32,
    pub no_data: Option<f32>,
    pub min_valid: Option<f32>,
    pub max_valid: Option<f32>,
}

impl ValueFilter {
    pub fn new(band: &BandInfo, options: &SourceOptions) -> Self {
        Self {
            band_no_data: band.no_data.map(|v| v as f32).unwrap_or(DEFAULT_BAND_NO_DATA),
            no_data: options.no_data_value,
            min_valid: options.min_valid_value,
            max_valid: options.max_valid_value,
        }
    }

    /// NaN is never valid, whatever the declared nodata.
    pub fn is_valid(&self, v: f32) -> bool {
        !v.is_nan()
            && v != self.band_no_data
            && self.no_data != Some(v)
            && self.min_valid.is_none_or(|min| v >= min)
            && self.max_valid.is_none_or(|max| v <= max)
    }
}

impl Driver {
    /// Open the source named by `options` through `library`.
    ///
    /// `name` labels the driver in logs; `tile_size` is the output tile
    /// size the maximum level is computed for.
    pub fn open(
        library: &dyn RasterLibrary,
        name: &str,
        options: &SourceOptions,
        tile_size: u32,
        io: &IoOptions,
    ) -> DriverResult<Driver> {
        if io.canceled() {
            return Err(DriverError::unavailable("Open cancelled"));
        }
        let source = opener::open_source(library, options)?;
        let source_name = options.source_name().unwrap_or_default().to_string();
        // Connection strings have no sidecar files
        let has_sidecar = options.is_file();
        Self::finish_open(source, name, &source_name, options, tile_size, |path| {
            has_sidecar.then(|| library.read_sidecar(path)).flatten()
        })
    }

    /// Wrap a dataset the caller already opened. The driver shares the
    /// handle and never closes it.
    pub fn open_dataset(
        dataset: Arc<dyn RasterDataset>,
        name: &str,
        options: &SourceOptions,
        tile_size: u32,
        io: &IoOptions,
    ) -> DriverResult<Driver> {
        if io.canceled() {
            return Err(DriverError::unavailable("Open cancelled"));
        }
        let source_name = options
            .source_name()
            .map(str::to_string)
            .unwrap_or_else(|| dataset.description());
        Self::finish_open(
            DatasetHandle::Borrowed(dataset),
            name,
            &source_name,
            options,
            tile_size,
            |path| std::fs::read_to_string(path).ok(),
        )
    }

    fn finish_open(
        source: DatasetHandle,
        name: &str,
        source_name: &str,
        options: &SourceOptions,
        tile_size: u32,
        read_sidecar: impl Fn(&Path) -> Option<String>,
    ) -> DriverResult<Driver> {
        let (src_srs, srs_source) = srs_resolver::resolve_srs(source.get(), source_name, read_sidecar)?;
        tracing::debug!("{}: spatial reference {} ({:?})", name, src_srs.name(), srs_source);

        let plan = warp::plan_warp(source.get(), &src_srs, options.max_warp_error)?;
        let sampling = match plan.warped {
            Some(warped) => SamplingHandle::Warped(warped),
            None => SamplingHandle::Source,
        };
        let sampling_ds: &dyn RasterDataset = match &sampling {
            SamplingHandle::Warped(ds) => ds.as_ref(),
            SamplingHandle::Source => source.get(),
        };

        let (width, height) = sampling_ds.raster_size();
        let grid = PixelGrid::new(plan.geo_transform, width, height)?;
        let raw_bounds = warp::raster_bounds(&plan.geo_transform, width, height);

        let profile = match plan.profile {
            Some(profile) => profile,
            None => Profile::with_bounds(plan.srs.clone(), raw_bounds).map_err(|e| {
                DriverError::Failure(format!(
                    "Cannot create projected profile from {}: {}",
                    plan.srs.name(),
                    e
                ))
            })?,
        };

        let resolution_x = raw_bounds.width() / width.max(1) as f64;
        let resolution_y = raw_bounds.height() / height.max(1) as f64;
        let max_level = options.max_data_level.unwrap_or_else(|| {
            warp::compute_max_level(&profile, tile_size, resolution_x.min(resolution_y))
        });

        let area_or_point = source
            .get()
            .metadata_item("AREA_OR_POINT", "")
            .map(|v| v.to_ascii_lowercase());
        let pixel_is_area = area_or_point.as_deref() != Some("point");
        let explicit_area = area_or_point.as_deref() == Some("area");

        let extent = warp::data_extent(&plan.srs, raw_bounds, (width, height), explicit_area);
        let bounds = *extent.bounds();

        tracing::info!(
            "Opened {} ({}x{}, {}) max level {}{}",
            name,
            width,
            height,
            plan.srs.name(),
            max_level,
            if matches!(sampling, SamplingHandle::Warped(_)) { ", warped" } else { "" }
        );

        Ok(Driver {
            sampling,
            source,
            name: name.to_string(),
            grid,
            profile,
            bounds,
            extent,
            max_level,
            linear_units: 1.0,
            pixel_is_area,
            options: options.clone(),
            workspaces: WorkspacePool::default(),
        })
    }

    /// The dataset tiles are sampled from.
    pub(crate) fn sampling_dataset(&self) -> &dyn RasterDataset {
        match &self.sampling {
            SamplingHandle::Warped(ds) => ds.as_ref(),
            SamplingHandle::Source => self.source.get(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_warped(&self) -> bool {
        matches!(self.sampling, SamplingHandle::Warped(_))
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Data extent in the profile's SRS.
    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }

    pub fn bounds(&self) -> &GeoBox {
        &self.bounds
    }

    pub fn max_level(&self) -> u32 {
        self.max_level
    }

    pub fn pixel_is_area(&self) -> bool {
        self.pixel_is_area
    }

    pub fn options(&self) -> &SourceOptions {
        &self.options
    }

    pub fn geo_transform(&self) -> &GeoTransform {
        self.grid.forward()
    }

    /// Where this source has data and up to which level.
    pub fn data_extents(&self) -> Vec<DataExtent> {
        vec![DataExtent {
            extent: self.extent.clone(),
            min_level: 0,
            max_level: Some(self.max_level),
        }]
    }

    pub fn pixel_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        self.grid.pixel_to_geo(col, row)
    }

    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.grid.geo_to_pixel(x, y)
    }

    pub fn intersects(&self, key: &TileKey) -> bool {
        key.extent().intersects(&self.extent)
    }

    /// Rejections shared by every tile builder.
    fn check_request(&self, key: &TileKey, io: &IoOptions) -> DriverResult<()> {
        if key.level > self.max_level {
            tracing::trace!("{}: level {} beyond max {}", self.name, key.level, self.max_level);
            return Err(DriverError::unavailable(format!(
                "Level {} exceeds the maximum data level {}",
                key.level, self.max_level
            )));
        }
        if io.canceled() {
            return Err(DriverError::unavailable("Request cancelled"));
        }
        Ok(())
    }

    fn value_filter(&self, band: &BandInfo) -> ValueFilter {
        ValueFilter::new(band, &self.options)
    }
}
