//! Image tile building for colour, gray, palette and elevation sources

use tilesampler::raster::memory::{MemBand, MemDataset};
use tilesampler::raster::{ColorInterpretation, ColorTable, PaletteInterpretation};
use tilesampler::{CancelToken, ErrorKind, IoOptions, PixelFormat, RasterFormat, SourceOptions};

use crate::common::{geodetic_dataset, geodetic_key, nearest, open_default, open_driver, whole_globe};

/// Eastern half of the globe: columns 2 and 3 of a 4x2 whole-globe raster.
fn east_tile() -> tilesampler::TileKey {
    geodetic_key(0, 0.0, -90.0, 180.0, 90.0)
}

fn gray_table(len: usize) -> ColorTable {
    ColorTable::new(
        PaletteInterpretation::Gray,
        (0..len).map(|i| [i as i16, 0, 0, 255]).collect(),
    )
}

#[test]
fn test_rgb_bands_by_count() {
    let ds = whole_globe("rgb.tif", 4, 2)
        .with_band(MemBand::from_u8(&[10; 8]))
        .with_band(MemBand::from_u8(&[20; 8]))
        .with_band(MemBand::from_u8(&[30; 8]));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 8, &IoOptions::default()).unwrap();
    assert_eq!(image.format(), PixelFormat::Rgba8);
    assert_eq!((image.width(), image.height()), (8, 8));
    for (col, row) in [(0, 0), (3, 5), (7, 7)] {
        assert_eq!(image.rgba_at(col, row), Some([10, 20, 30, 255]));
    }
}

#[test]
fn test_rgb_bands_by_tag() {
    let ds = whole_globe("bgra.tif", 4, 2)
        .with_band(MemBand::from_u8(&[30; 8]).color(ColorInterpretation::Blue))
        .with_band(MemBand::from_u8(&[20; 8]).color(ColorInterpretation::Green))
        .with_band(MemBand::from_u8(&[10; 8]).color(ColorInterpretation::Red))
        .with_band(MemBand::from_u8(&[128; 8]).color(ColorInterpretation::Alpha));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(1, 1), Some([10, 20, 30, 128]));
}

#[test]
fn test_band_no_data_masks_pixels() {
    // Column 2 is nodata, column 3 is valid
    let data = [7, 7, 0, 200, 7, 7, 0, 200];
    let ds = whole_globe("gray.tif", 4, 2).with_band(MemBand::from_u8(&data).no_data(0.0));
    let driver = open_driver(ds, nearest(), 256);

    let image = driver.create_image(&east_tile(), 8, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(0, 0).map(|px| px[3]), Some(0));
    assert_eq!(image.rgba_at(3, 7).map(|px| px[3]), Some(0));
    assert_eq!(image.rgba_at(4, 0), Some([200, 200, 200, 255]));
    assert_eq!(image.rgba_at(7, 7), Some([200, 200, 200, 255]));
}

#[test]
fn test_configured_no_data_masks_pixels() {
    let data = [7, 7, 50, 200, 7, 7, 50, 200];
    let ds = whole_globe("gray.tif", 4, 2).with_band(MemBand::from_u8(&data));
    let options = SourceOptions {
        no_data_value: Some(200.0),
        ..nearest()
    };
    let driver = open_driver(ds, options, 256);

    let image = driver.create_image(&east_tile(), 8, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(0, 0), Some([50, 50, 50, 255]));
    assert_eq!(image.rgba_at(7, 0).map(|px| px[3]), Some(0));
}

#[test]
fn test_valid_range_masks_pixels() {
    let data = [7, 7, 50, 200, 7, 7, 50, 200];
    let ds = whole_globe("gray.tif", 4, 2).with_band(MemBand::from_u8(&data));
    let options = SourceOptions {
        max_valid_value: Some(100.0),
        ..nearest()
    };
    let driver = open_driver(ds, options, 256);

    let image = driver.create_image(&east_tile(), 8, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(2, 2).map(|px| px[3]), Some(255));
    assert_eq!(image.rgba_at(6, 2).map(|px| px[3]), Some(0));
}

#[test]
fn test_gray_palette() {
    let ds = whole_globe("palette.tif", 4, 2).with_band(MemBand::from_u8(&[128; 8]).color_table(gray_table(256)));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(2, 2), Some([128, 128, 128, 255]));
}

#[test]
fn test_palette_missing_entry_is_red() {
    let ds = whole_globe("palette.tif", 4, 2).with_band(MemBand::from_u8(&[5; 8]).color_table(gray_table(2)));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(0, 3), Some([255, 0, 0, 255]));
}

#[test]
fn test_palette_no_data_is_transparent() {
    let ds = whole_globe("palette.tif", 4, 2)
        .with_band(MemBand::from_u8(&[5; 8]).color_table(gray_table(2)).no_data(5.0));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(0, 3), Some([0, 0, 0, 0]));
}

#[test]
fn test_float_gray_band_becomes_elevation_image() {
    let mut data = [100.0f32; 8];
    data[3] = -9999.0;
    let ds = whole_globe("dem.tif", 4, 2)
        .with_band(MemBand::from_f32(&data).no_data(-9999.0).scale_offset(2.0, 5.0));
    let driver = open_driver(ds, nearest(), 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.format(), PixelFormat::R32Float);
    // Bottom row comes from raster row 1, which is fully valid
    assert_eq!(image.f32_at(3, 0), Some(205.0));
    // Top-right quadrant reads raster row 0, column 3
    assert_eq!(image.f32_at(3, 3), Some(tilesampler::NO_DATA_VALUE));
    assert_eq!(image.f32_at(0, 3), Some(205.0));
}

#[test]
fn test_partial_tile_is_transparent_outside_data() {
    let ds = geodetic_dataset("small.tif", 10, 10, 0.0, 10.0, 1.0).with_band(MemBand::from_u8(&[50; 100]));
    let options = SourceOptions {
        max_data_level: Some(5),
        ..Default::default()
    };
    let driver = open_driver(ds, options, 256);

    // Data fills the south-west quadrant of the tile
    let image = driver
        .create_image(&geodetic_key(1, 0.0, 0.0, 20.0, 20.0), 16, &IoOptions::default())
        .unwrap();
    assert_eq!(image.rgba_at(0, 0), Some([50, 50, 50, 255]));
    assert_eq!(image.rgba_at(7, 7), Some([50, 50, 50, 255]));
    assert_eq!(image.rgba_at(8, 7).map(|px| px[3]), Some(0));
    assert_eq!(image.rgba_at(7, 8).map(|px| px[3]), Some(0));
    assert_eq!(image.rgba_at(15, 15), Some([0, 0, 0, 0]));
}

#[test]
fn test_unusable_bands() {
    let ds = whole_globe("alpha.tif", 4, 2).with_band(MemBand::from_u8(&[1; 8]).color(ColorInterpretation::Alpha));
    let driver = open_default(ds, 256);

    let err = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_cancelled_request() {
    let ds = whole_globe("gray.tif", 4, 2).with_band(MemBand::from_u8(&[1; 8]));
    let driver = open_default(ds, 256);

    let cancel = CancelToken::new();
    let io = IoOptions::with_cancel(cancel.clone());
    assert!(driver.create_image(&east_tile(), 4, &io).is_ok());

    cancel.cancel();
    let err = driver.create_image(&east_tile(), 4, &io).unwrap_err();
    assert!(err.is_recoverable());
}

#[test]
fn test_tile_outside_data() {
    let ds = geodetic_dataset("small.tif", 2, 2, 0.0, 2.0, 1.0).with_band(MemBand::from_u8(&[1; 4]));
    let driver = open_default(ds, 256);

    let err = driver
        .create_image(&geodetic_key(0, -180.0, -90.0, -90.0, 90.0), 4, &IoOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_encoded_tile() {
    let ds = whole_globe("rgb.tif", 4, 2)
        .with_band(MemBand::from_u8(&[10; 8]))
        .with_band(MemBand::from_u8(&[20; 8]))
        .with_band(MemBand::from_u8(&[30; 8]));
    let driver = open_default(ds, 256);
    let image = driver.create_image(&east_tile(), 16, &IoOptions::default()).unwrap();

    let png = image.encode(RasterFormat::Png).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    let jpeg = image.encode(RasterFormat::Jpeg).unwrap();
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[test]
fn test_raw_dataset_without_band_tags() {
    // Two untagged bands are gray plus alpha
    let ds = MemDataset::new("ga.tif", 4, 2)
        .with_geo_transform(tilesampler::GeoTransform::north_up(-180.0, 90.0, 90.0, 90.0))
        .with_projection("EPSG:4326")
        .with_band(MemBand::from_u8(&[90; 8]))
        .with_band(MemBand::from_u8(&[60; 8]));
    let driver = open_default(ds, 256);

    let image = driver.create_image(&east_tile(), 4, &IoOptions::default()).unwrap();
    assert_eq!(image.rgba_at(1, 2), Some([90, 90, 90, 60]));
}
