use crate::error::{DriverError, DriverResult};
use crate::geo::srs::SpatialReference;
use crate::geo::{GeoBox, GeoExtent};

const MERCATOR_HALF_WIDTH: f64 = 20_037_508.342_789_244;

/// Quadtree tiling scheme: a spatial reference, the extent it covers, and
/// the number of tiles at level 0. Every level doubles the tile count along
/// both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    extent: GeoExtent,
    tiles_wide: u32,
    tiles_high: u32,
}

impl Profile {
    /// Whole-globe lat/lon profile, two tiles wide at level 0.
    pub fn global_geodetic() -> Self {
        Self::global_geodetic_with(SpatialReference::wgs84())
    }

    fn global_geodetic_with(srs: SpatialReference) -> Self {
        Self {
            extent: GeoExtent::new(srs, GeoBox::new(-180.0, -90.0, 180.0, 90.0)),
            tiles_wide: 2,
            tiles_high: 1,
        }
    }

    pub fn spherical_mercator() -> Self {
        Self {
            extent: GeoExtent::new(
                SpatialReference::spherical_mercator(),
                GeoBox::new(
                    -MERCATOR_HALF_WIDTH,
                    -MERCATOR_HALF_WIDTH,
                    MERCATOR_HALF_WIDTH,
                    MERCATOR_HALF_WIDTH,
                ),
            ),
            tiles_wide: 1,
            tiles_high: 1,
        }
    }

    /// Profile implied by a spatial reference alone. Geodetic systems map to
    /// the whole globe; other projected systems need bounds.
    pub fn from_srs(srs: &SpatialReference) -> Option<Self> {
        if srs.is_geodetic() {
            Some(Self::global_geodetic_with(srs.clone()))
        } else if srs.is_spherical_mercator() {
            Some(Self::spherical_mercator())
        } else {
            None
        }
    }

    /// Profile over explicit bounds. Level-0 tiles are kept roughly square.
    pub fn with_bounds(srs: SpatialReference, bounds: GeoBox) -> DriverResult<Self> {
        let (w, h) = (bounds.width(), bounds.height());
        if !(w.is_finite() && h.is_finite()) || w <= 0.0 || h <= 0.0 {
            return Err(DriverError::Failure(format!(
                "Cannot create profile for {} over degenerate bounds {:?}",
                srs.name(),
                bounds
            )));
        }

        let (tiles_wide, tiles_high) = if w >= h {
            (((w / h).round() as u32).max(1), 1)
        } else {
            (1, ((h / w).round() as u32).max(1))
        };

        Ok(Self {
            extent: GeoExtent::new(srs, bounds),
            tiles_wide,
            tiles_high,
        })
    }

    pub fn srs(&self) -> &SpatialReference {
        self.extent.srs()
    }

    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }

    /// Number of tiles along x and y at `level`.
    pub fn num_tiles(&self, level: u32) -> (u64, u64) {
        let factor = 1u64 << level.min(62);
        (self.tiles_wide as u64 * factor, self.tiles_high as u64 * factor)
    }

    /// Width and height of one tile at `level`, in profile units.
    pub fn tile_dimensions(&self, level: u32) -> (f64, f64) {
        let (nx, ny) = self.num_tiles(level);
        (self.extent.width() / nx as f64, self.extent.height() / ny as f64)
    }

    /// Key for tile (x, y) at `level`, rows counted from the top.
    pub fn tile_key(&self, level: u32, x: u64, y: u64) -> TileKey {
        let (w, h) = self.tile_dimensions(level);
        let xmin = self.extent.xmin() + w * x as f64;
        let ymax = self.extent.ymax() - h * y as f64;
        TileKey::new(
            level,
            GeoExtent::new(self.srs().clone(), GeoBox::new(xmin, ymax - h, xmin + w, ymax)),
        )
    }
}

/// Identifies one tile: its quadtree level and the extent it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct TileKey {
    pub level: u32,
    extent: GeoExtent,
}

impl TileKey {
    pub fn new(level: u32, extent: GeoExtent) -> Self {
        Self { level, extent }
    }

    pub fn extent(&self) -> &GeoExtent {
        &self.extent
    }
}

/// Region where a source has data, and the levels it serves there.
#[derive(Debug, Clone, PartialEq)]
pub struct DataExtent {
    pub extent: GeoExtent,
    pub min_level: u32,
    pub max_level: Option<u32>,
}
