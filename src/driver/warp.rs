//! Decides whether the source needs a virtual warp and derives the
//! tiling profile, data bounds and maximum level from the result.

use crate::error::{DriverError, DriverResult};
use crate::geo::profile::Profile;
use crate::geo::srs::SpatialReference;
use crate::geo::transform::GeoTransform;
use crate::geo::{GeoBox, GeoExtent};
use crate::raster::{RasterDataset, ResampleAlg};

/// Outcome of warp planning. `warped` is `None` when the source is sampled
/// directly.
pub(crate) struct WarpPlan {
    pub warped: Option<Box<dyn RasterDataset>>,
    pub geo_transform: GeoTransform,
    pub srs: SpatialReference,
    pub profile: Option<Profile>,
}

/// Whether the pixel grid has to be resampled before it can be tiled.
pub(crate) fn requires_reprojection(source: &dyn RasterDataset, gt: Option<&GeoTransform>) -> bool {
    let has_gcp = source.gcp_count() > 0 && source.gcp_projection().is_some();
    let is_rotated = gt.is_some_and(GeoTransform::is_rotated);
    has_gcp || is_rotated
}

pub(crate) fn plan_warp(
    source: &dyn RasterDataset,
    src_srs: &SpatialReference,
    max_error: f64,
) -> DriverResult<WarpPlan> {
    let mut geo_transform = source.geo_transform();
    let needs_reprojection = requires_reprojection(source, geo_transform.as_ref());

    // Lat/lon data tiles straight onto the whole-globe profile
    let profile = if src_srs.is_geodetic() {
        let profile = Profile::from_srs(src_srs).ok_or_else(|| {
            DriverError::unavailable(format!(
                "Cannot create geographic profile from {}",
                src_srs.name()
            ))
        })?;
        if geo_transform.is_none() {
            let (w, h) = source.raster_size();
            let extent = profile.extent();
            geo_transform = Some(GeoTransform::north_up(
                extent.xmin(),
                extent.ymax(),
                extent.width() / w.max(1) as f64,
                extent.height() / h.max(1) as f64,
            ));
        }
        Some(profile)
    } else {
        None
    };

    let srs_mismatch = profile
        .as_ref()
        .is_some_and(|p| !p.srs().equivalent_to(src_srs));

    if !(needs_reprojection || srs_mismatch) {
        let geo_transform = geo_transform.ok_or_else(|| {
            DriverError::Failure(format!("Dataset {} has no geotransform", source.description()))
        })?;
        return Ok(WarpPlan {
            warped: None,
            geo_transform,
            srs: src_srs.clone(),
            profile,
        });
    }

    let dst_srs = profile.as_ref().map(Profile::srs).unwrap_or(src_srs).clone();
    tracing::debug!(
        "Warping {} from {} to {} (gcp or rotation: {})",
        source.description(),
        src_srs.name(),
        dst_srs.name(),
        needs_reprojection
    );

    let warped = source
        .warp(
            &src_srs.to_text(),
            &dst_srs.to_text(),
            ResampleAlg::NearestNeighbour,
            max_error,
        )
        .map_err(|e| DriverError::Failure(format!("Failed to create a final sampling dataset: {}", e)))?;

    let geo_transform = warped.geo_transform().ok_or_else(|| {
        DriverError::Failure(format!("Warped dataset {} has no geotransform", warped.description()))
    })?;
    let srs = warped
        .projection()
        .and_then(|p| SpatialReference::parse(&p))
        .unwrap_or(dst_srs);

    Ok(WarpPlan {
        warped: Some(warped),
        geo_transform,
        srs,
        profile,
    })
}

/// Deepest level whose tiles are still coarser than the data.
///
/// Starts from the level-0 per-pixel tile resolution and halves it until it
/// drops below `native_resolution`. A non-positive native resolution caps
/// at level 1.
pub fn compute_max_level(profile: &Profile, tile_size: u32, native_resolution: f64) -> u32 {
    if native_resolution.is_nan() || native_resolution <= 0.0 {
        return 1;
    }
    let (mut w, mut h) = profile.tile_dimensions(0);
    w /= tile_size.max(1) as f64;
    h /= tile_size.max(1) as f64;

    let mut level = 0;
    while w >= native_resolution && h >= native_resolution && level < 63 {
        level += 1;
        w *= 0.5;
        h *= 0.5;
    }
    level
}

/// Keep geodetic bounds on the globe.
///
/// Area-pixel data overflowing ±180/±90 is first pulled in by half a pixel
/// (its outer pixel centres sit on the limit); anything still spanning more
/// than the globe is clamped to it. Returns the bounds and whether they
/// were clamped.
pub fn clamp_geodetic_bounds(bounds: GeoBox, resolution: (f64, f64), is_area: bool) -> (GeoBox, bool) {
    let (mut xmin, mut ymin, mut xmax, mut ymax) = (bounds.xmin(), bounds.ymin(), bounds.xmax(), bounds.ymax());
    let mut clamped = false;

    if is_area && (xmin < -180.0 || xmax > 180.0) {
        xmin += resolution.0 * 0.5;
        xmax -= resolution.0 * 0.5;
    }
    if xmax - xmin > 360.0 {
        xmin = -180.0;
        xmax = 180.0;
        clamped = true;
    }

    if is_area && (ymin < -90.0 || ymax > 90.0) {
        ymin += resolution.1 * 0.5;
        ymax -= resolution.1 * 0.5;
    }
    if ymax - ymin > 180.0 {
        ymin = -90.0;
        ymax = 90.0;
        clamped = true;
    }

    (GeoBox::new(xmin, ymin, xmax, ymax), clamped)
}

/// Bounds of the whole raster in the sampling dataset's SRS.
pub(crate) fn raster_bounds(gt: &GeoTransform, width: usize, height: usize) -> GeoBox {
    let (min_x, min_y) = gt.apply(0.0, height as f64);
    let (max_x, max_y) = gt.apply(width as f64, 0.0);
    GeoBox::new(min_x, min_y, max_x, max_y)
}

/// Final data extent, clamped for geodetic systems.
pub(crate) fn data_extent(
    srs: &SpatialReference,
    bounds: GeoBox,
    raster_size: (usize, usize),
    is_area: bool,
) -> GeoExtent {
    let bounds = if srs.is_geodetic() {
        let resolution = (
            bounds.width() / raster_size.0.max(1) as f64,
            bounds.height() / raster_size.1.max(1) as f64,
        );
        let (clamped_bounds, clamped) = clamp_geodetic_bounds(bounds, resolution, is_area);
        if clamped {
            tracing::debug!("Clamped geodetic bounds {:?} to {:?}", bounds, clamped_bounds);
        }
        clamped_bounds
    } else {
        bounds
    };
    GeoExtent::new(srs.clone(), bounds)
}
