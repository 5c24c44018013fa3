//! In-memory raster backend.
//!
//! Datasets are built up front and are immutable once handed out. Reads
//! emulate the raster-IO conventions of the GDAL backend (pixel-centre
//! sampling of fractional windows) so the driver behaves the same against
//! both. Warping is limited to de-rotating a skewed geotransform within one
//! spatial reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::geo::srs::SpatialReference;
use crate::geo::transform::GeoTransform;

use super::{
    BandInfo, ColorInterpretation, ColorTable, RasterDataset, RasterError, RasterLibrary,
    RasterResult, ReadRequest, ResampleAlg, SampleBufMut, SampleType,
};

/// One band: metadata plus row-major samples, top row first.
#[derive(Debug, Clone)]
pub struct MemBand {
    info: BandInfo,
    data: Arc<Vec<f64>>,
}

impl MemBand {
    pub fn new(data: Vec<f64>) -> Self {
        Self {
            info: BandInfo::default(),
            data: Arc::new(data),
        }
    }

    pub fn from_u8(data: &[u8]) -> Self {
        Self::new(data.iter().map(|&v| v as f64).collect()).sample_type(SampleType::UInt8)
    }

    pub fn from_i16(data: &[i16]) -> Self {
        Self::new(data.iter().map(|&v| v as f64).collect()).sample_type(SampleType::Int16)
    }

    pub fn from_f32(data: &[f32]) -> Self {
        Self::new(data.iter().map(|&v| v as f64).collect()).sample_type(SampleType::Float32)
    }

    pub fn color(mut self, interp: ColorInterpretation) -> Self {
        self.info.color_interpretation = interp;
        self
    }

    pub fn sample_type(mut self, sample_type: SampleType) -> Self {
        self.info.sample_type = sample_type;
        self
    }

    pub fn no_data(mut self, value: f64) -> Self {
        self.info.no_data = Some(value);
        self
    }

    pub fn scale_offset(mut self, scale: f64, offset: f64) -> Self {
        self.info.scale = Some(scale);
        self.info.offset = Some(offset);
        self
    }

    pub fn color_table(mut self, table: ColorTable) -> Self {
        self.info.color_interpretation = ColorInterpretation::Palette;
        self.info.color_table = Some(table);
        self
    }
}

#[derive(Debug, Clone)]
pub struct MemDataset {
    name: String,
    width: usize,
    height: usize,
    bands: Vec<MemBand>,
    geo_transform: Option<GeoTransform>,
    projection: Option<String>,
    gcp_count: usize,
    gcp_projection: Option<String>,
    metadata: HashMap<(String, String), String>,
    sub_datasets: Vec<String>,
}

impl MemDataset {
    pub fn new(name: impl Into<String>, width: usize, height: usize) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            bands: Vec::new(),
            geo_transform: None,
            projection: None,
            gcp_count: 0,
            gcp_projection: None,
            metadata: HashMap::new(),
            sub_datasets: Vec::new(),
        }
    }

    /// Append a band. Panics if its sample count does not match the raster.
    pub fn with_band(mut self, band: MemBand) -> Self {
        assert_eq!(
            band.data.len(),
            self.width * self.height,
            "band size does not match raster size"
        );
        self.bands.push(band);
        self
    }

    pub fn with_geo_transform(mut self, gt: GeoTransform) -> Self {
        self.geo_transform = Some(gt);
        self
    }

    pub fn with_projection(mut self, projection: impl Into<String>) -> Self {
        self.projection = Some(projection.into());
        self
    }

    pub fn with_gcps(mut self, count: usize, projection: impl Into<String>) -> Self {
        self.gcp_count = count;
        self.gcp_projection = Some(projection.into());
        self
    }

    /// Set a metadata item in the default domain.
    pub fn with_metadata(self, key: &str, value: &str) -> Self {
        self.with_domain_metadata(key, "", value)
    }

    pub fn with_domain_metadata(mut self, key: &str, domain: &str, value: &str) -> Self {
        self.metadata
            .insert((domain.to_string(), key.to_string()), value.to_string());
        self
    }

    pub fn with_sub_datasets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_datasets = names.into_iter().map(Into::into).collect();
        self
    }

    fn band(&self, index: usize) -> RasterResult<&MemBand> {
        index
            .checked_sub(1)
            .and_then(|i| self.bands.get(i))
            .ok_or(RasterError::NoSuchBand(index))
    }

    fn pixel(&self, data: &[f64], col: i64, row: i64) -> f64 {
        let col = col.clamp(0, self.width as i64 - 1) as usize;
        let row = row.clamp(0, self.height as i64 - 1) as usize;
        data[row * self.width + col]
    }

    /// Bilinear sample at a pixel-centre coordinate, clamped at the edges.
    fn bilinear(&self, data: &[f64], x: f64, y: f64) -> f64 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (c, r) = (x0 as i64, y0 as i64);

        let ul = self.pixel(data, c, r);
        let ur = self.pixel(data, c + 1, r);
        let ll = self.pixel(data, c, r + 1);
        let lr = self.pixel(data, c + 1, r + 1);

        let top = ul + (ur - ul) * fx;
        let bottom = ll + (lr - ll) * fx;
        top + (bottom - top) * fy
    }
}

impl RasterDataset for MemDataset {
    fn description(&self) -> String {
        self.name.clone()
    }

    fn raster_size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn band_count(&self) -> usize {
        self.bands.len()
    }

    fn band_info(&self, band: usize) -> RasterResult<BandInfo> {
        Ok(self.band(band)?.info.clone())
    }

    fn read(&self, band: usize, request: &ReadRequest, mut out: SampleBufMut<'_>) -> RasterResult<()> {
        let data = &self.band(band)?.data;

        if out.len() < request.len() {
            return Err(RasterError::Read(format!(
                "buffer holds {} samples, request needs {}",
                out.len(),
                request.len()
            )));
        }

        const SLACK: f64 = 1e-6;
        if request.x_off < -SLACK
            || request.y_off < -SLACK
            || request.x_size <= 0.0
            || request.y_size <= 0.0
            || request.x_off + request.x_size > self.width as f64 + SLACK
            || request.y_off + request.y_size > self.height as f64 + SLACK
        {
            return Err(RasterError::Read(format!(
                "access window ({}, {}, {}, {}) out of range for {}x{} raster",
                request.x_off, request.y_off, request.x_size, request.y_size, self.width, self.height
            )));
        }

        let x_step = request.x_size / request.buf_width as f64;
        let y_step = request.y_size / request.buf_height as f64;

        for j in 0..request.buf_height {
            let sy = request.y_off + (j as f64 + 0.5) * y_step;
            for i in 0..request.buf_width {
                let sx = request.x_off + (i as f64 + 0.5) * x_step;
                let value = match request.resample {
                    ResampleAlg::NearestNeighbour => {
                        self.pixel(data, sx.floor() as i64, sy.floor() as i64)
                    }
                    _ => self.bilinear(data, sx - 0.5, sy - 0.5),
                };
                out.set(j * request.buf_width + i, value);
            }
        }
        Ok(())
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        self.geo_transform
    }

    fn projection(&self) -> Option<String> {
        self.projection.clone().filter(|p| !p.trim().is_empty())
    }

    fn gcp_count(&self) -> usize {
        self.gcp_count
    }

    fn gcp_projection(&self) -> Option<String> {
        self.gcp_projection.clone().filter(|p| !p.trim().is_empty())
    }

    fn metadata_item(&self, key: &str, domain: &str) -> Option<String> {
        self.metadata
            .get(&(domain.to_string(), key.to_string()))
            .cloned()
    }

    fn sub_dataset_names(&self) -> Vec<String> {
        self.sub_datasets.clone()
    }

    fn warp(
        &self,
        src_srs: &str,
        dst_srs: &str,
        _resample: ResampleAlg,
        _max_error: f64,
    ) -> RasterResult<Box<dyn RasterDataset>> {
        let src = SpatialReference::parse(src_srs)
            .ok_or_else(|| RasterError::Warp(format!("unrecognised source SRS: {}", src_srs)))?;
        let dst = SpatialReference::parse(dst_srs)
            .ok_or_else(|| RasterError::Warp(format!("unrecognised target SRS: {}", dst_srs)))?;
        if !src.equivalent_to(&dst) {
            return Err(RasterError::Unsupported(format!(
                "in-memory warp from {} to {}",
                src.name(),
                dst.name()
            )));
        }
        let gt = self.geo_transform.ok_or_else(|| {
            RasterError::Unsupported("in-memory warp of a dataset without geotransform".to_string())
        })?;
        let inverse = gt
            .invert()
            .map_err(|e| RasterError::Warp(e.to_string()))?;

        let (w, h) = (self.width as f64, self.height as f64);
        let corners = [gt.apply(0.0, 0.0), gt.apply(w, 0.0), gt.apply(0.0, h), gt.apply(w, h)];
        let xmin = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
        let xmax = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
        let ymin = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
        let ymax = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

        let c = gt.coefficients();
        let res = (c[1] * c[5] - c[2] * c[4]).abs().sqrt();
        let out_w = ((xmax - xmin) / res).ceil().max(1.0) as usize;
        let out_h = ((ymax - ymin) / res).ceil().max(1.0) as usize;
        let out_gt = GeoTransform::north_up(xmin, ymax, res, res);

        let mut warped = MemDataset::new(format!("{} (warped)", self.name), out_w, out_h)
            .with_geo_transform(out_gt)
            .with_projection(dst_srs);
        warped.metadata = self.metadata.clone();

        for band in &self.bands {
            let fill = band.info.no_data.unwrap_or(0.0);
            let mut data = vec![fill; out_w * out_h];
            for row in 0..out_h {
                for col in 0..out_w {
                    let (x, y) = out_gt.apply(col as f64 + 0.5, row as f64 + 0.5);
                    let (sc, sr) = inverse.apply(x, y);
                    if sc >= 0.0 && sr >= 0.0 && sc < w && sr < h {
                        data[row * out_w + col] =
                            band.data[sr.floor() as usize * self.width + sc.floor() as usize];
                    }
                }
            }
            warped.bands.push(MemBand {
                info: band.info.clone(),
                data: Arc::new(data),
            });
        }

        Ok(Box::new(warped))
    }
}

/// Registry of named in-memory datasets and sidecar files.
#[derive(Debug, Default)]
pub struct MemLibrary {
    datasets: RwLock<HashMap<String, MemDataset>>,
    sidecars: RwLock<HashMap<PathBuf, String>>,
}

impl MemLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, dataset: MemDataset) {
        if let Ok(mut datasets) = self.datasets.write() {
            datasets.insert(name.into(), dataset);
        }
    }

    pub fn insert_sidecar(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        if let Ok(mut sidecars) = self.sidecars.write() {
            sidecars.insert(path.into(), contents.into());
        }
    }
}

impl RasterLibrary for MemLibrary {
    fn open(&self, path: &str) -> RasterResult<Box<dyn RasterDataset>> {
        let datasets = self
            .datasets
            .read()
            .map_err(|_| RasterError::Open(path.to_string()))?;
        datasets
            .get(path)
            .cloned()
            .map(|ds| Box::new(ds) as Box<dyn RasterDataset>)
            .ok_or_else(|| RasterError::Open(path.to_string()))
    }

    fn read_sidecar(&self, path: &Path) -> Option<String> {
        let registered = self
            .sidecars
            .read()
            .ok()
            .and_then(|s| s.get(path).cloned());
        registered.or_else(|| std::fs::read_to_string(path).ok())
    }
}
