//! GDAL-backed raster access.

use std::ffi::{CStr, CString, c_int, c_void};
use std::sync::{Mutex, MutexGuard};

use gdal::raster::{ColorInterpretation as GdalColorInterpretation, GdalDataType};
use gdal::{Dataset, Metadata};

use crate::geo::transform::GeoTransform;

use super::{
    BandInfo, ColorInterpretation, ColorTable, PaletteInterpretation, RasterDataset, RasterError,
    RasterLibrary, RasterResult, ReadRequest, ResampleAlg, SampleBufMut, SampleType,
};

impl ResampleAlg {
    fn as_gdal_rio(self) -> gdal_sys::GDALRIOResampleAlg::Type {
        use gdal_sys::GDALRIOResampleAlg::*;
        match self {
            ResampleAlg::NearestNeighbour => GRIORA_NearestNeighbour,
            ResampleAlg::Bilinear => GRIORA_Bilinear,
            ResampleAlg::Cubic => GRIORA_Cubic,
            ResampleAlg::CubicSpline => GRIORA_CubicSpline,
            ResampleAlg::Average => GRIORA_Average,
        }
    }

    fn as_gdal_warp(self) -> gdal_sys::GDALResampleAlg::Type {
        use gdal_sys::GDALResampleAlg::*;
        match self {
            ResampleAlg::NearestNeighbour => GRA_NearestNeighbour,
            ResampleAlg::Bilinear => GRA_Bilinear,
            ResampleAlg::Cubic => GRA_Cubic,
            ResampleAlg::CubicSpline => GRA_CubicSpline,
            ResampleAlg::Average => GRA_Average,
        }
    }
}

/// Convert an S3 or HTTP URL to a GDAL VSI path
fn href_to_vsi_path(href: &str) -> String {
    if let Some(rest) = href.strip_prefix("s3://") {
        format!("/vsis3/{}", rest)
    } else if href.starts_with("https://") || href.starts_with("http://") {
        format!("/vsicurl/{}", href)
    } else {
        href.to_string()
    }
}

/// Opens datasets through GDAL's driver registry.
#[derive(Debug, Default, Clone, Copy)]
pub struct GdalLibrary;

impl RasterLibrary for GdalLibrary {
    fn open(&self, path: &str) -> RasterResult<Box<dyn RasterDataset>> {
        let vsi_path = href_to_vsi_path(path);
        let dataset = Dataset::open(&vsi_path)
            .map_err(|e| RasterError::Open(format!("{}: {}", path, e)))?;
        Ok(Box::new(GdalDataset::new(dataset, path)))
    }
}

/// A GDAL dataset. GDAL handles are not thread safe, so every call goes
/// through a mutex.
///
/// A warped dataset created by [`RasterDataset::warp`] reads through its
/// source's handle, so the source must outlive it.
pub struct GdalDataset {
    dataset: Mutex<Dataset>,
    description: String,
}

impl GdalDataset {
    pub fn new(dataset: Dataset, description: impl Into<String>) -> Self {
        Self {
            dataset: Mutex::new(dataset),
            description: description.into(),
        }
    }

    fn lock(&self) -> RasterResult<MutexGuard<'_, Dataset>> {
        self.dataset
            .lock()
            .map_err(|_| RasterError::Read(format!("{}: dataset lock poisoned", self.description)))
    }
}

fn color_interpretation(interp: GdalColorInterpretation) -> ColorInterpretation {
    match interp {
        GdalColorInterpretation::Undefined => ColorInterpretation::Undefined,
        GdalColorInterpretation::GrayIndex => ColorInterpretation::Gray,
        GdalColorInterpretation::PaletteIndex => ColorInterpretation::Palette,
        GdalColorInterpretation::RedBand => ColorInterpretation::Red,
        GdalColorInterpretation::GreenBand => ColorInterpretation::Green,
        GdalColorInterpretation::BlueBand => ColorInterpretation::Blue,
        GdalColorInterpretation::AlphaBand => ColorInterpretation::Alpha,
        _ => ColorInterpretation::Other,
    }
}

fn sample_type(data_type: GdalDataType) -> SampleType {
    match data_type {
        GdalDataType::UInt8 => SampleType::UInt8,
        GdalDataType::Int8 => SampleType::Int8,
        GdalDataType::UInt16 => SampleType::UInt16,
        GdalDataType::Int16 => SampleType::Int16,
        GdalDataType::UInt32 => SampleType::UInt32,
        GdalDataType::Int32 => SampleType::Int32,
        GdalDataType::Float32 => SampleType::Float32,
        GdalDataType::Float64 => SampleType::Float64,
        _ => SampleType::Unknown,
    }
}

/// Copy the band's colour table out of GDAL.
fn read_color_table(band_h: gdal_sys::GDALRasterBandH) -> Option<ColorTable> {
    use gdal_sys::GDALPaletteInterp::*;

    unsafe {
        let table = gdal_sys::GDALGetRasterColorTable(band_h);
        if table.is_null() {
            return None;
        }

        let interpretation = match gdal_sys::GDALGetPaletteInterpretation(table) {
            GPI_Gray => PaletteInterpretation::Gray,
            GPI_CMYK => PaletteInterpretation::Cmyk,
            GPI_HLS => PaletteInterpretation::Hls,
            _ => PaletteInterpretation::Rgb,
        };

        let count = gdal_sys::GDALGetColorEntryCount(table).max(0);
        let entries = (0..count)
            .map(|i| {
                let entry = gdal_sys::GDALGetColorEntry(table, i);
                if entry.is_null() {
                    [0, 0, 0, 0]
                } else {
                    let e = &*entry;
                    [e.c1, e.c2, e.c3, e.c4]
                }
            })
            .collect();

        Some(ColorTable::new(interpretation, entries))
    }
}

fn c_string(ptr: *const std::ffi::c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    let s = unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned();
    (!s.trim().is_empty()).then_some(s)
}

impl RasterDataset for GdalDataset {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn raster_size(&self) -> (usize, usize) {
        self.lock().map(|ds| ds.raster_size()).unwrap_or((0, 0))
    }

    fn band_count(&self) -> usize {
        self.lock().map(|ds| ds.raster_count()).unwrap_or(0)
    }

    fn band_info(&self, index: usize) -> RasterResult<BandInfo> {
        let ds = self.lock()?;
        let band = ds
            .rasterband(index)
            .map_err(|_| RasterError::NoSuchBand(index))?;

        let color_table = read_color_table(unsafe { band.c_rasterband() });

        Ok(BandInfo {
            color_interpretation: color_interpretation(band.color_interpretation()),
            sample_type: sample_type(band.band_type()),
            no_data: band.no_data_value(),
            scale: band.scale(),
            offset: band.offset(),
            color_table,
        })
    }

    fn read(&self, index: usize, request: &ReadRequest, out: SampleBufMut<'_>) -> RasterResult<()> {
        if out.len() < request.len() {
            return Err(RasterError::Read(format!(
                "buffer holds {} samples, request needs {}",
                out.len(),
                request.len()
            )));
        }

        let ds = self.lock()?;
        let (width, height) = ds.raster_size();
        let band = ds
            .rasterband(index)
            .map_err(|_| RasterError::NoSuchBand(index))?;

        // Integer window enclosing the fractional one; the extra argument
        // carries the exact window.
        let x = request.x_off.floor().max(0.0) as usize;
        let y = request.y_off.floor().max(0.0) as usize;
        let x_size = ((request.x_off + request.x_size).ceil() as usize)
            .min(width)
            .saturating_sub(x)
            .max(1);
        let y_size = ((request.y_off + request.y_size).ceil() as usize)
            .min(height)
            .saturating_sub(y)
            .max(1);

        let mut extra: gdal_sys::GDALRasterIOExtraArg = unsafe { std::mem::zeroed() };
        extra.nVersion = 1;
        extra.eResampleAlg = request.resample.as_gdal_rio();
        extra.bFloatingPointWindowValidity = 1;
        extra.dfXOff = request.x_off;
        extra.dfYOff = request.y_off;
        extra.dfXSize = request.x_size;
        extra.dfYSize = request.y_size;

        let (data, data_type) = match out {
            SampleBufMut::U8(b) => (b.as_mut_ptr() as *mut c_void, gdal_sys::GDALDataType::GDT_Byte),
            SampleBufMut::I16(b) => (b.as_mut_ptr() as *mut c_void, gdal_sys::GDALDataType::GDT_Int16),
            SampleBufMut::F32(b) => (b.as_mut_ptr() as *mut c_void, gdal_sys::GDALDataType::GDT_Float32),
        };

        let err = unsafe {
            gdal_sys::GDALRasterIOEx(
                band.c_rasterband(),
                gdal_sys::GDALRWFlag::GF_Read,
                x as c_int,
                y as c_int,
                x_size as c_int,
                y_size as c_int,
                data,
                request.buf_width as c_int,
                request.buf_height as c_int,
                data_type,
                0,
                0,
                &mut extra,
            )
        };

        if err != gdal_sys::CPLErr::CE_None {
            return Err(RasterError::Read(format!(
                "{}: band {} window ({}, {}, {}, {})",
                self.description, index, request.x_off, request.y_off, request.x_size, request.y_size
            )));
        }
        Ok(())
    }

    fn geo_transform(&self) -> Option<GeoTransform> {
        let ds = self.lock().ok()?;
        ds.geo_transform().ok().map(GeoTransform)
    }

    fn projection(&self) -> Option<String> {
        let ds = self.lock().ok()?;
        let wkt = ds.projection();
        (!wkt.trim().is_empty()).then_some(wkt)
    }

    fn gcp_count(&self) -> usize {
        match self.lock() {
            Ok(ds) => unsafe { gdal_sys::GDALGetGCPCount(ds.c_dataset()).max(0) as usize },
            Err(_) => 0,
        }
    }

    fn gcp_projection(&self) -> Option<String> {
        let ds = self.lock().ok()?;
        c_string(unsafe { gdal_sys::GDALGetGCPProjection(ds.c_dataset()) })
    }

    fn metadata_item(&self, key: &str, domain: &str) -> Option<String> {
        let ds = self.lock().ok()?;
        ds.metadata_item(key, domain)
    }

    fn sub_dataset_names(&self) -> Vec<String> {
        let Ok(ds) = self.lock() else {
            return Vec::new();
        };
        (1..)
            .map_while(|i| ds.metadata_item(&format!("SUBDATASET_{}_NAME", i), "SUBDATASETS"))
            .collect()
    }

    fn warp(
        &self,
        src_srs: &str,
        dst_srs: &str,
        resample: ResampleAlg,
        max_error: f64,
    ) -> RasterResult<Box<dyn RasterDataset>> {
        let src = CString::new(src_srs).map_err(|e| RasterError::Warp(e.to_string()))?;
        let dst = CString::new(dst_srs).map_err(|e| RasterError::Warp(e.to_string()))?;

        let ds = self.lock()?;
        let handle = unsafe {
            gdal_sys::GDALAutoCreateWarpedVRT(
                ds.c_dataset(),
                src.as_ptr(),
                dst.as_ptr(),
                resample.as_gdal_warp(),
                max_error,
                std::ptr::null(),
            )
        };
        if handle.is_null() {
            return Err(RasterError::Warp(format!(
                "{}: could not create warped VRT",
                self.description
            )));
        }

        let warped = unsafe { Dataset::from_c_dataset(handle) };
        Ok(Box::new(GdalDataset::new(
            warped,
            format!("{} (warped)", self.description),
        )))
    }
}
