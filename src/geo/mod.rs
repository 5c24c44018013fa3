//! Coordinate types shared by the driver: boxes, extents, spatial
//! references, geotransforms and tiling profiles.

pub mod profile;
pub mod srs;
pub mod transform;

use geo::{Coord, Rect};

use srs::SpatialReference;

/// Axis-aligned box in some CRS's units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBox {
    rect: Rect<f64>,
}

impl GeoBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            rect: Rect::new(Coord { x: xmin, y: ymin }, Coord { x: xmax, y: ymax }),
        }
    }

    pub fn xmin(&self) -> f64 {
        self.rect.min().x
    }

    pub fn ymin(&self) -> f64 {
        self.rect.min().y
    }

    pub fn xmax(&self) -> f64 {
        self.rect.max().x
    }

    pub fn ymax(&self) -> f64 {
        self.rect.max().y
    }

    pub fn width(&self) -> f64 {
        self.rect.width()
    }

    pub fn height(&self) -> f64 {
        self.rect.height()
    }

    pub fn translate_x(&self, dx: f64) -> Self {
        Self::new(self.xmin() + dx, self.ymin(), self.xmax() + dx, self.ymax())
    }

    /// Rectangular intersection. Touching edges do not count.
    pub fn intersection(&self, other: &GeoBox) -> Option<GeoBox> {
        let xmin = self.xmin().max(other.xmin());
        let ymin = self.ymin().max(other.ymin());
        let xmax = self.xmax().min(other.xmax());
        let ymax = self.ymax().min(other.ymax());
        (xmin < xmax && ymin < ymax).then(|| GeoBox::new(xmin, ymin, xmax, ymax))
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }
}

/// A box tagged with the spatial reference its coordinates are in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoExtent {
    srs: SpatialReference,
    bounds: GeoBox,
}

impl GeoExtent {
    pub fn new(srs: SpatialReference, bounds: GeoBox) -> Self {
        Self { srs, bounds }
    }

    pub fn srs(&self) -> &SpatialReference {
        &self.srs
    }

    pub fn bounds(&self) -> &GeoBox {
        &self.bounds
    }

    pub fn xmin(&self) -> f64 {
        self.bounds.xmin()
    }

    pub fn ymin(&self) -> f64 {
        self.bounds.ymin()
    }

    pub fn xmax(&self) -> f64 {
        self.bounds.xmax()
    }

    pub fn ymax(&self) -> f64 {
        self.bounds.ymax()
    }

    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// Intersect with another extent assumed to share this extent's SRS.
    ///
    /// The result is expressed in this extent's frame. For geodetic extents
    /// the other extent is also tried one full turn east and west so that
    /// longitude frames like [0,360] still meet [-180,180] tiles; the
    /// largest overlap wins.
    pub fn intersection_same_srs(&self, other: &GeoExtent) -> Option<GeoExtent> {
        let direct = self.bounds.intersection(&other.bounds);
        if !self.srs.is_geodetic() {
            return direct.map(|b| GeoExtent::new(self.srs.clone(), b));
        }

        let mut best = direct;
        for shift in [-360.0, 360.0] {
            if let Some(candidate) = self.bounds.intersection(&other.bounds.translate_x(shift)) {
                if best.is_none_or(|b| candidate.area() > b.area()) {
                    best = Some(candidate);
                }
            }
        }
        best.map(|b| GeoExtent::new(self.srs.clone(), b))
    }

    pub fn intersects(&self, other: &GeoExtent) -> bool {
        self.intersection_same_srs(other).is_some()
    }
}
