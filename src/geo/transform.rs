use crate::error::{DriverError, DriverResult};

/// Six-coefficient affine map from pixel (col, row) to georeferenced (x, y):
///
/// ```text
/// x = c[0] + c[1] * col + c[2] * row
/// y = c[3] + c[4] * col + c[5] * row
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform(pub [f64; 6]);

impl GeoTransform {
    /// North-up transform with the given origin (top-left) and pixel size.
    pub fn north_up(xmin: f64, ymax: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self([xmin, pixel_width, 0.0, ymax, 0.0, -pixel_height])
    }

    pub fn coefficients(&self) -> &[f64; 6] {
        &self.0
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let c = &self.0;
        (c[0] + c[1] * x + c[2] * y, c[3] + c[4] * x + c[5] * y)
    }

    /// Off-diagonal terms present (rotation or skew).
    pub fn is_rotated(&self) -> bool {
        self.0[2] != 0.0 || self.0[4] != 0.0
    }

    /// Algebraic inverse. Fails for singular transforms.
    pub fn invert(&self) -> DriverResult<GeoTransform> {
        let c = &self.0;

        // Common case: no rotation
        if c[2] == 0.0 && c[4] == 0.0 && c[1] != 0.0 && c[5] != 0.0 {
            return Ok(GeoTransform([
                -c[0] / c[1],
                1.0 / c[1],
                0.0,
                -c[3] / c[5],
                0.0,
                1.0 / c[5],
            ]));
        }

        let det = c[1] * c[5] - c[2] * c[4];
        let magnitude = c[1].abs().max(c[2].abs()) * c[4].abs().max(c[5].abs());
        if det == 0.0 || det.abs() <= 1e-10 * magnitude {
            return Err(DriverError::Failure(format!(
                "Geotransform {:?} is not invertible",
                c
            )));
        }

        let inv_det = 1.0 / det;
        Ok(GeoTransform([
            (c[2] * c[3] - c[0] * c[5]) * inv_det,
            c[5] * inv_det,
            -c[2] * inv_det,
            (-c[1] * c[3] + c[0] * c[4]) * inv_det,
            -c[4] * inv_det,
            c[1] * inv_det,
        ]))
    }
}
