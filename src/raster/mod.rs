//! Raster-access seam.
//!
//! The driver never talks to a raster library directly. It opens datasets
//! through a [`RasterLibrary`] and reads them through [`RasterDataset`],
//! which is object safe so backends can be swapped at runtime. Band reads
//! are typed through [`Sample`]; the element type is picked once per band
//! and [`read_band`] hands back a buffer of that type.

#[cfg(feature = "gdal-support")]
pub mod gdal;
pub mod memory;

use std::path::Path;

use thiserror::Error;

use crate::geo::transform::GeoTransform;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Failed to open {0}")]
    Open(String),

    #[error("Band {0} does not exist")]
    NoSuchBand(usize),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Warp failed: {0}")]
    Warp(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[cfg(feature = "gdal-support")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] ::gdal::errors::GdalError),
}

pub type RasterResult<T> = Result<T, RasterError>;

/// Colour meaning a band declares in its metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorInterpretation {
    #[default]
    Undefined,
    Gray,
    Palette,
    Red,
    Green,
    Blue,
    Alpha,
    Other,
}

/// Native element type of a band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    #[default]
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    Float32,
    Float64,
    Unknown,
}

impl SampleType {
    /// 16-bit integers and 32-bit floats hold elevation, not colour.
    pub fn is_elevation(self) -> bool {
        matches!(self, SampleType::Int16 | SampleType::UInt16 | SampleType::Float32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaletteInterpretation {
    Gray,
    Rgb,
    Cmyk,
    Hls,
}

/// Owned copy of a band's colour table. Each entry keeps the four raw
/// components; their meaning depends on the interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    pub interpretation: PaletteInterpretation,
    pub entries: Vec<[i16; 4]>,
}

impl ColorTable {
    pub fn new(interpretation: PaletteInterpretation, entries: Vec<[i16; 4]>) -> Self {
        Self {
            interpretation,
            entries,
        }
    }

    pub fn entry(&self, index: usize) -> Option<[i16; 4]> {
        self.entries.get(index).copied()
    }
}

/// Per-band metadata snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandInfo {
    pub color_interpretation: ColorInterpretation,
    pub sample_type: SampleType,
    pub no_data: Option<f64>,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
    pub color_table: Option<ColorTable>,
}

impl BandInfo {
    pub fn scale_offset(&self) -> (f64, f64) {
        (self.scale.unwrap_or(1.0), self.offset.unwrap_or(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleAlg {
    #[default]
    NearestNeighbour,
    Bilinear,
    Cubic,
    CubicSpline,
    Average,
}

/// A (possibly fractional) source window resampled into a buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadRequest {
    pub x_off: f64,
    pub y_off: f64,
    pub x_size: f64,
    pub y_size: f64,
    pub buf_width: usize,
    pub buf_height: usize,
    pub resample: ResampleAlg,
}

impl ReadRequest {
    /// Read a source window 1:1 into a buffer of the same size.
    pub fn pixels(x_off: usize, y_off: usize, width: usize, height: usize) -> Self {
        Self {
            x_off: x_off as f64,
            y_off: y_off as f64,
            x_size: width as f64,
            y_size: height as f64,
            buf_width: width,
            buf_height: height,
            resample: ResampleAlg::NearestNeighbour,
        }
    }

    pub fn len(&self) -> usize {
        self.buf_width * self.buf_height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Destination buffer for a band read, tagged with its element type.
pub enum SampleBufMut<'a> {
    U8(&'a mut [u8]),
    I16(&'a mut [i16]),
    F32(&'a mut [f32]),
}

impl SampleBufMut<'_> {
    pub fn len(&self) -> usize {
        match self {
            SampleBufMut::U8(b) => b.len(),
            SampleBufMut::I16(b) => b.len(),
            SampleBufMut::F32(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store `value` at `index`, rounding and saturating for integer types.
    pub fn set(&mut self, index: usize, value: f64) {
        match self {
            SampleBufMut::U8(b) => b[index] = u8::from_f64(value),
            SampleBufMut::I16(b) => b[index] = i16::from_f64(value),
            SampleBufMut::F32(b) => b[index] = f32::from_f64(value),
        }
    }
}

/// Element types a band can be read into.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + 'static {
    fn buffer(slice: &mut [Self]) -> SampleBufMut<'_>;
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    fn buffer(slice: &mut [Self]) -> SampleBufMut<'_> {
        SampleBufMut::U8(slice)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, u8::MAX as f64) as u8
    }
}

impl Sample for i16 {
    fn buffer(slice: &mut [Self]) -> SampleBufMut<'_> {
        SampleBufMut::I16(slice)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl Sample for f32 {
    fn buffer(slice: &mut [Self]) -> SampleBufMut<'_> {
        SampleBufMut::F32(slice)
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// Opens datasets by name.
pub trait RasterLibrary: Send + Sync {
    fn open(&self, path: &str) -> RasterResult<Box<dyn RasterDataset>>;

    /// Contents of a small text file next to the dataset, if readable.
    fn read_sidecar(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

/// An open, read-only raster dataset.
///
/// Band indices are 1-based. Implementations must allow concurrent reads
/// through a shared reference.
pub trait RasterDataset: Send + Sync {
    fn description(&self) -> String;

    /// (width, height) in pixels.
    fn raster_size(&self) -> (usize, usize);

    fn band_count(&self) -> usize;

    fn band_info(&self, band: usize) -> RasterResult<BandInfo>;

    /// Read a window of `band` into `out`, which must hold
    /// `request.buf_width * request.buf_height` elements.
    fn read(&self, band: usize, request: &ReadRequest, out: SampleBufMut<'_>) -> RasterResult<()>;

    fn geo_transform(&self) -> Option<GeoTransform>;

    /// Embedded projection definition, `None` when empty.
    fn projection(&self) -> Option<String>;

    fn gcp_count(&self) -> usize;

    fn gcp_projection(&self) -> Option<String>;

    fn metadata_item(&self, key: &str, domain: &str) -> Option<String>;

    /// Names of contained sub-datasets, in declaration order.
    fn sub_dataset_names(&self) -> Vec<String>;

    /// Build a virtual dataset presenting this one reprojected into
    /// `dst_srs` on a north-up grid.
    fn warp(
        &self,
        src_srs: &str,
        dst_srs: &str,
        resample: ResampleAlg,
        max_error: f64,
    ) -> RasterResult<Box<dyn RasterDataset>>;
}

/// Read a band window into a freshly allocated buffer of `T`.
pub fn read_band<T: Sample>(
    dataset: &dyn RasterDataset,
    band: usize,
    request: &ReadRequest,
) -> RasterResult<Vec<T>> {
    let mut data = vec![T::default(); request.len()];
    dataset.read(band, request, T::buffer(&mut data))?;
    Ok(data)
}

/// Read a band window into a caller-provided buffer of `T`.
pub fn read_band_into<T: Sample>(
    dataset: &dyn RasterDataset,
    band: usize,
    request: &ReadRequest,
    out: &mut [T],
) -> RasterResult<()> {
    if out.len() < request.len() {
        return Err(RasterError::Read(format!(
            "buffer holds {} samples, request needs {}",
            out.len(),
            request.len()
        )));
    }
    dataset.read(band, request, T::buffer(&mut out[..request.len()]))
}

/// `value * scale + offset` in place. Samples equal to `skip` are left
/// untouched.
pub fn apply_scale_offset<T: Sample>(data: &mut [T], scale: f64, offset: f64, skip: Option<T>) {
    if scale == 1.0 && offset == 0.0 {
        return;
    }
    for v in data.iter_mut().filter(|v| skip != Some(**v)) {
        *v = T::from_f64(v.to_f64() * scale + offset);
    }
}
