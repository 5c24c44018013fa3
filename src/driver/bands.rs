//! Assigns a role to every band of the sampling dataset.
//!
//! Two passes: explicit colour-interpretation tags first, and only when
//! none of the recognised tags is present, a guess from the band count.
//! A gray band whose samples are 16-bit integers or 32-bit floats is
//! elevation rather than colour.

use crate::raster::{BandInfo, ColorInterpretation, RasterDataset, RasterResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterBandRole {
    Red,
    Green,
    Blue,
    Alpha,
    Gray,
    Palette,
    Elevation,
    Unclassified,
}

/// How the image path should read the dataset. Band numbers are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    Rgb {
        red: usize,
        green: usize,
        blue: usize,
        alpha: Option<usize>,
    },
    Gray {
        gray: usize,
        alpha: Option<usize>,
    },
    Elevation {
        band: usize,
    },
    Palette {
        band: usize,
    },
    Unusable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandClassification {
    roles: Vec<RasterBandRole>,
}

impl BandClassification {
    pub fn classify(dataset: &dyn RasterDataset) -> RasterResult<Self> {
        let infos = (1..=dataset.band_count())
            .map(|band| dataset.band_info(band))
            .collect::<RasterResult<Vec<_>>>()?;
        Ok(Self::from_band_infos(&infos))
    }

    pub fn from_band_infos(infos: &[BandInfo]) -> Self {
        let mut roles = vec![RasterBandRole::Unclassified; infos.len()];

        for (i, info) in infos.iter().enumerate() {
            let role = match info.color_interpretation {
                ColorInterpretation::Red => RasterBandRole::Red,
                ColorInterpretation::Green => RasterBandRole::Green,
                ColorInterpretation::Blue => RasterBandRole::Blue,
                ColorInterpretation::Alpha => RasterBandRole::Alpha,
                ColorInterpretation::Gray => RasterBandRole::Gray,
                ColorInterpretation::Palette => RasterBandRole::Palette,
                _ => continue,
            };
            if !roles.contains(&role) {
                roles[i] = role;
            }
        }

        if roles.iter().all(|r| *r == RasterBandRole::Unclassified) {
            let guess: &[RasterBandRole] = match infos.len() {
                1 => &[RasterBandRole::Gray],
                2 => &[RasterBandRole::Gray, RasterBandRole::Alpha],
                3 => &[RasterBandRole::Red, RasterBandRole::Green, RasterBandRole::Blue],
                4 => &[
                    RasterBandRole::Red,
                    RasterBandRole::Green,
                    RasterBandRole::Blue,
                    RasterBandRole::Alpha,
                ],
                _ => &[],
            };
            roles[..guess.len()].copy_from_slice(guess);
        }

        for (role, info) in roles.iter_mut().zip(infos) {
            if *role == RasterBandRole::Gray && info.sample_type.is_elevation() {
                *role = RasterBandRole::Elevation;
            }
        }

        Self { roles }
    }

    /// Role of 1-based `band`.
    pub fn role(&self, band: usize) -> RasterBandRole {
        band.checked_sub(1)
            .and_then(|i| self.roles.get(i))
            .copied()
            .unwrap_or(RasterBandRole::Unclassified)
    }

    /// 1-based number of the band holding `role`.
    pub fn band(&self, role: RasterBandRole) -> Option<usize> {
        self.roles.iter().position(|r| *r == role).map(|i| i + 1)
    }

    pub fn layout(&self) -> ImageLayout {
        let alpha = self.band(RasterBandRole::Alpha);

        if let (Some(red), Some(green), Some(blue)) = (
            self.band(RasterBandRole::Red),
            self.band(RasterBandRole::Green),
            self.band(RasterBandRole::Blue),
        ) {
            ImageLayout::Rgb {
                red,
                green,
                blue,
                alpha,
            }
        } else if let Some(band) = self.band(RasterBandRole::Elevation) {
            ImageLayout::Elevation { band }
        } else if let Some(gray) = self.band(RasterBandRole::Gray) {
            ImageLayout::Gray { gray, alpha }
        } else if let Some(band) = self.band(RasterBandRole::Palette) {
            ImageLayout::Palette { band }
        } else {
            ImageLayout::Unusable
        }
    }
}
