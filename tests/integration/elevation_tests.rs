//! Heightfield sampling on the area and point paths

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use tilesampler::raster::memory::MemBand;
use tilesampler::{CancelToken, ErrorKind, GeoTransform, IoOptions, NO_DATA_VALUE, SourceOptions, Workspace};

use crate::common::{dem_2x2, geodetic_dataset, geodetic_key, nearest, open_default, open_driver, whole_globe};

fn dem_key() -> tilesampler::TileKey {
    geodetic_key(0, 0.0, 0.0, 2.0, 2.0)
}

#[test]
fn test_area_bilinear() {
    let driver = open_default(dem_2x2(), 256);
    let hf = driver.create_heightfield(&dem_key(), 3, &IoOptions::default()).unwrap();

    assert_eq!((hf.width(), hf.height()), (3, 3));
    assert_abs_diff_eq!(hf.height_at(1, 1).unwrap(), 15.0);
    // Row 0 is the south edge
    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 20.0);
    assert_abs_diff_eq!(hf.height_at(2, 0).unwrap(), 30.0);
    assert_abs_diff_eq!(hf.height_at(0, 2).unwrap(), 0.0);
    assert_abs_diff_eq!(hf.height_at(2, 2).unwrap(), 10.0);
    assert_abs_diff_eq!(hf.height_at(1, 0).unwrap(), 25.0);
}

#[test]
fn test_area_cells_off_the_raster_are_no_data() {
    let driver = open_default(dem_2x2(), 256);
    let hf = driver
        .create_heightfield(&geodetic_key(0, 0.0, 0.0, 4.0, 4.0), 5, &IoOptions::default())
        .unwrap();

    // Only cells within half a pixel of the raster get a value
    assert_eq!(hf.valid_count(), 9);
    assert_eq!(hf.height_at(3, 0), Some(NO_DATA_VALUE));
    assert_eq!(hf.height_at(0, 3), Some(NO_DATA_VALUE));
    assert_abs_diff_eq!(hf.height_at(2, 2).unwrap(), 10.0);
}

#[test]
fn test_point_bilinear() {
    let driver = open_default(dem_2x2().with_metadata("AREA_OR_POINT", "Point"), 256);
    let hf = driver.create_heightfield(&dem_key(), 2, &IoOptions::default()).unwrap();

    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 20.0);
    assert_abs_diff_eq!(hf.height_at(1, 0).unwrap(), 30.0);
    assert_abs_diff_eq!(hf.height_at(0, 1).unwrap(), 0.0);
    assert_abs_diff_eq!(hf.height_at(1, 1).unwrap(), 10.0);
}

#[test]
fn test_nearest_uses_bulk_read() {
    let driver = open_driver(dem_2x2(), nearest(), 256);
    let mut workspace = Workspace::new();
    let hf = driver
        .create_heightfield_with(&dem_key(), 2, &IoOptions::default(), &mut workspace)
        .unwrap();

    assert_eq!(hf.height_at(0, 0), Some(20.0));
    assert_eq!(hf.height_at(1, 1), Some(10.0));
    assert!(workspace.capacity() >= 4);
}

#[test]
fn test_band_no_data() {
    let ds = geodetic_dataset("dem.tif", 2, 2, 0.0, 2.0, 1.0)
        .with_band(MemBand::from_f32(&[0.0, -9999.0, 20.0, 30.0]).no_data(-9999.0));
    let driver = open_default(ds, 256);
    let hf = driver.create_heightfield(&dem_key(), 3, &IoOptions::default()).unwrap();

    assert_eq!(hf.height_at(1, 1), Some(NO_DATA_VALUE));
    assert_eq!(hf.height_at(2, 2), Some(NO_DATA_VALUE));
    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 20.0);
}

#[test]
fn test_nan_no_data() {
    let ds = geodetic_dataset("dem.tif", 2, 2, 0.0, 2.0, 1.0)
        .with_band(MemBand::from_f32(&[0.0, f32::NAN, 20.0, 30.0]).no_data(f64::NAN));
    let driver = open_default(ds, 256);
    let hf = driver.create_heightfield(&dem_key(), 3, &IoOptions::default()).unwrap();

    assert_eq!(hf.height_at(1, 1), Some(NO_DATA_VALUE));
    assert_eq!(hf.height_at(2, 2), Some(NO_DATA_VALUE));
    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 20.0);
    assert!(hf.heights().iter().all(|h| !h.is_nan()));
}

#[test]
fn test_stray_nan_on_point_path() {
    let ds = geodetic_dataset("dem.tif", 2, 2, 0.0, 2.0, 1.0)
        .with_band(MemBand::from_f32(&[0.0, f32::NAN, 20.0, 30.0]))
        .with_metadata("AREA_OR_POINT", "Point");
    let driver = open_default(ds, 256);
    let hf = driver.create_heightfield(&dem_key(), 2, &IoOptions::default()).unwrap();

    assert_eq!(hf.height_at(1, 1), Some(NO_DATA_VALUE));
    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 20.0);
    assert!(hf.heights().iter().all(|h| !h.is_nan()));
}

#[test]
fn test_configured_no_data() {
    let options = SourceOptions {
        no_data_value: Some(20.0),
        ..Default::default()
    };
    let driver = open_driver(dem_2x2(), options, 256);
    let hf = driver.create_heightfield(&dem_key(), 3, &IoOptions::default()).unwrap();

    assert_eq!(hf.height_at(0, 0), Some(NO_DATA_VALUE));
    assert_eq!(hf.height_at(1, 1), Some(NO_DATA_VALUE));
    assert_abs_diff_eq!(hf.height_at(2, 2).unwrap(), 10.0);
}

#[test]
fn test_scale_offset_on_valid_cells() {
    let ds = geodetic_dataset("dem.tif", 2, 2, 0.0, 2.0, 1.0)
        .with_band(MemBand::from_f32(&[0.0, -9999.0, 20.0, 30.0]).no_data(-9999.0).scale_offset(2.0, 1.0));
    let driver = open_default(ds, 256);
    let hf = driver.create_heightfield(&dem_key(), 3, &IoOptions::default()).unwrap();

    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 41.0);
    assert_abs_diff_eq!(hf.height_at(2, 0).unwrap(), 61.0);
    assert_eq!(hf.height_at(2, 2), Some(NO_DATA_VALUE));
}

/// Data in a 0..360 longitude frame whose value is the pixel-centre
/// longitude.
fn east_frame_dem() -> tilesampler::raster::memory::MemDataset {
    let values: Vec<f32> = (0..18).flat_map(|_| (0..36).map(|col| col as f32 * 10.0 + 5.0)).collect();
    whole_globe("frame.tif", 36, 18)
        .with_geo_transform(GeoTransform::north_up(0.0, 90.0, 10.0, 10.0))
        .with_band(MemBand::from_f32(&values))
}

#[test]
fn test_longitude_wrap_area() {
    let driver = open_default(east_frame_dem(), 256);
    // Longitudes -180..-170 are 180..190 in the data's frame
    let hf = driver
        .create_heightfield(&geodetic_key(0, -180.0, 0.0, -170.0, 10.0), 2, &IoOptions::default())
        .unwrap();

    assert_abs_diff_eq!(hf.height_at(0, 0).unwrap(), 180.0, epsilon = 1e-3);
    assert_abs_diff_eq!(hf.height_at(1, 0).unwrap(), 190.0, epsilon = 1e-3);
    assert_abs_diff_eq!(hf.height_at(1, 1).unwrap(), 190.0, epsilon = 1e-3);
}

#[test]
fn test_longitude_wrap_point() {
    let driver = open_default(east_frame_dem().with_metadata("AREA_OR_POINT", "Point"), 256);
    let hf = driver
        .create_heightfield(&geodetic_key(0, -180.0, 0.0, -170.0, 10.0), 2, &IoOptions::default())
        .unwrap();

    assert_eq!(hf.valid_count(), 4);
    for h in hf.heights() {
        assert!((170.0..=200.0).contains(h), "height {} outside the wrapped window", h);
    }
}

#[test]
fn test_cancelled_heightfield() {
    let driver = open_default(dem_2x2(), 256);
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = driver
        .create_heightfield(&dem_key(), 3, &IoOptions::with_cancel(cancel))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_concurrent_heightfields() {
    let driver = Arc::new(open_driver(dem_2x2(), nearest(), 256));
    let expected = driver.create_heightfield(&dem_key(), 8, &IoOptions::default()).unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let driver = driver.clone();
                scope.spawn(move || driver.create_heightfield(&dem_key(), 8, &IoOptions::default()).unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}
