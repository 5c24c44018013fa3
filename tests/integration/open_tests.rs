//! Opening sources: SRS resolution, warping, profiles and levels

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use tilesampler::raster::memory::{MemBand, MemDataset, MemLibrary};
use tilesampler::{CancelToken, Driver, ErrorKind, GeoBox, GeoTransform, IoOptions, SourceOptions};

use crate::common::{dem_2x2, geodetic_dataset, init_logging, open_default, open_driver, open_shared, whole_globe};

#[test]
fn test_open_whole_globe() {
    let driver = open_default(whole_globe("world.tif", 360, 180).with_band(MemBand::new(vec![1.0; 360 * 180])), 256);

    assert!(!driver.is_warped());
    assert!(driver.profile().srs().is_geodetic());
    assert_eq!(*driver.bounds(), GeoBox::new(-180.0, -90.0, 180.0, 90.0));
    // One-degree pixels are coarser than the level-0 tile resolution
    assert_eq!(driver.max_level(), 0);
    assert!(driver.pixel_is_area());
}

#[test]
fn test_geographic_srs_outside_4000_range() {
    // GDA2020 is geographic despite its code
    let ds = MemDataset::new("gda.tif", 360, 180)
        .with_band(MemBand::new(vec![1.0; 360 * 180]))
        .with_geo_transform(GeoTransform::north_up(-180.0, 90.0, 1.0, 1.0))
        .with_projection("EPSG:7844");
    let driver = open_default(ds, 256);

    assert!(!driver.is_warped());
    assert!(driver.profile().srs().is_geodetic());
    assert_eq!(driver.profile().num_tiles(0), (2, 1));
    assert_eq!(*driver.bounds(), GeoBox::new(-180.0, -90.0, 180.0, 90.0));
}

#[test]
fn test_data_extents() {
    let mut options = SourceOptions::default();
    options.max_data_level = Some(7);
    let driver = open_driver(dem_2x2(), options, 256);

    let extents = driver.data_extents();
    assert_eq!(extents.len(), 1);
    assert_eq!(extents[0].min_level, 0);
    assert_eq!(extents[0].max_level, Some(7));
    assert_eq!(*extents[0].extent.bounds(), GeoBox::new(0.0, 0.0, 2.0, 2.0));
}

#[test]
fn test_max_level_from_resolution() {
    // Level-3 tiles sample exactly at the data resolution
    let res = 180.0 / 256.0 / 8.0;
    let ds = geodetic_dataset("fine.tif", 64, 64, 10.0, 10.0, res).with_band(MemBand::new(vec![0.0; 64 * 64]));
    let driver = open_default(ds, 256);
    assert_eq!(driver.max_level(), 4);
}

#[test]
fn test_missing_source_is_configuration_error() {
    init_logging();
    let library = MemLibrary::new();
    let err = Driver::open(&library, "empty", &SourceOptions::default(), 256, &IoOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(!err.is_recoverable());
}

#[test]
fn test_unknown_source_is_unavailable() {
    init_logging();
    let library = MemLibrary::new();
    let options = SourceOptions::with_uri("missing.tif");
    let err = Driver::open(&library, "missing", &options, 256, &IoOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_cancelled_open() {
    init_logging();
    let library = MemLibrary::new();
    library.insert("dem.tif", dem_2x2());
    let cancel = CancelToken::new();
    cancel.cancel();

    let options = SourceOptions::with_uri("dem.tif");
    let err = Driver::open(&library, "dem", &options, 256, &IoOptions::with_cancel(cancel)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
}

#[test]
fn test_missing_srs_is_unavailable() {
    init_logging();
    let library = MemLibrary::new();
    library.insert(
        "nosrs.tif",
        MemDataset::new("nosrs.tif", 2, 2)
            .with_band(MemBand::new(vec![0.0; 4]))
            .with_geo_transform(GeoTransform::north_up(0.0, 2.0, 1.0, 1.0)),
    );
    let options = SourceOptions::with_uri("nosrs.tif");
    let err = Driver::open(&library, "nosrs", &options, 256, &IoOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
    assert!(err.to_string().contains("no spatial reference information"));
}

#[test]
fn test_sidecar_prj_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("scan.prj"), "EPSG:4326\n").unwrap();
    let path = dir.path().join("scan.tif").to_string_lossy().into_owned();

    let ds = MemDataset::new(path.clone(), 4, 2)
        .with_band(MemBand::new(vec![0.0; 8]))
        .with_geo_transform(GeoTransform::north_up(-180.0, 90.0, 90.0, 90.0));
    let driver = open_driver(ds, SourceOptions::with_uri(path), 256);
    assert!(driver.profile().srs().is_geodetic());
}

#[test]
fn test_registered_sidecar() {
    init_logging();
    let library = MemLibrary::new();
    library.insert(
        "/data/scan.tif",
        MemDataset::new("/data/scan.tif", 10, 10)
            .with_band(MemBand::new(vec![0.0; 100]))
            .with_geo_transform(GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0, 10.0)),
    );
    library.insert_sidecar("/data/scan.prj", "EPSG:32633");

    let options = SourceOptions::with_uri("/data/scan.tif");
    let driver = Driver::open(&library, "scan", &options, 256, &IoOptions::default()).unwrap();
    assert_eq!(driver.profile().srs().epsg(), Some(32633));
}

#[test]
fn test_connection_source_skips_sidecar() {
    init_logging();
    let library = MemLibrary::new();
    library.insert(
        "/data/scan.tif",
        MemDataset::new("/data/scan.tif", 10, 10)
            .with_band(MemBand::new(vec![0.0; 100]))
            .with_geo_transform(GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0, 10.0)),
    );
    library.insert_sidecar("/data/scan.prj", "EPSG:32633");

    let options = SourceOptions {
        connection: Some("/data/scan.tif".into()),
        ..Default::default()
    };
    let err = Driver::open(&library, "scan", &options, 256, &IoOptions::default()).unwrap_err();
    assert!(err.to_string().contains("no spatial reference information"));
}

#[test]
fn test_projected_profile_covers_data() {
    let ds = MemDataset::new("utm.tif", 200, 100)
        .with_band(MemBand::new(vec![0.0; 200 * 100]))
        .with_geo_transform(GeoTransform::north_up(500_000.0, 4_000_000.0, 10.0, 10.0))
        .with_projection("EPSG:32633");
    let driver = open_default(ds, 256);

    assert!(!driver.is_warped());
    let profile = driver.profile();
    assert_eq!(profile.srs().epsg(), Some(32633));
    assert_eq!(profile.num_tiles(0), (2, 1));
    assert_eq!(*driver.bounds(), GeoBox::new(500_000.0, 3_999_000.0, 502_000.0, 4_000_000.0));
}

#[test]
fn test_rotated_source_is_warped() {
    let ds = MemDataset::new("rot.tif", 8, 8)
        .with_band(MemBand::new(vec![5.0; 64]))
        .with_geo_transform(GeoTransform([500_000.0, 10.0, 3.0, 4_000_000.0, 2.0, -10.0]))
        .with_projection("EPSG:32633");
    let driver = open_default(ds, 256);

    assert!(driver.is_warped());
    assert!(!driver.geo_transform().is_rotated());
}

#[test]
fn test_sub_dataset_selection() {
    init_logging();
    let library = MemLibrary::new();
    library.insert(
        "container.nc",
        MemDataset::new("container.nc", 1, 1).with_sub_datasets(["nc:temp", "nc:elev"]),
    );
    library.insert("nc:temp", whole_globe("nc:temp", 4, 2).with_band(MemBand::new(vec![1.0; 8])));
    library.insert("nc:elev", whole_globe("nc:elev", 8, 4).with_band(MemBand::new(vec![1.0; 32])));

    let mut options = SourceOptions::with_uri("container.nc");
    options.sub_dataset = Some(2);
    let driver = Driver::open(&library, "nc", &options, 256, &IoOptions::default()).unwrap();
    assert_abs_diff_eq!(driver.geo_transform().coefficients()[1], 45.0);

    // Out of range falls back to the first sub-dataset
    options.sub_dataset = Some(3);
    let driver = Driver::open(&library, "nc", &options, 256, &IoOptions::default()).unwrap();
    assert_abs_diff_eq!(driver.geo_transform().coefficients()[1], 90.0);
}

#[test]
fn test_pixel_is_point_metadata() {
    let driver = open_default(dem_2x2().with_metadata("AREA_OR_POINT", "Point"), 256);
    assert!(!driver.pixel_is_area());

    let driver = open_default(dem_2x2().with_metadata("AREA_OR_POINT", "Area"), 256);
    assert!(driver.pixel_is_area());
}

#[test]
fn test_area_bounds_trimmed_to_globe() {
    // Pixel centres sit on the antimeridian and the poles
    let ds = geodetic_dataset("edges.tif", 361, 181, -180.5, 90.5, 1.0)
        .with_band(MemBand::new(vec![0.0; 361 * 181]))
        .with_metadata("AREA_OR_POINT", "Area");
    let driver = open_default(ds, 256);

    let bounds = driver.bounds();
    assert_abs_diff_eq!(bounds.xmin(), -180.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bounds.xmax(), 180.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bounds.ymin(), -90.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bounds.ymax(), 90.0, epsilon = 1e-9);
}

#[test]
fn test_open_dataset_shares_handle() {
    let dataset = Arc::new(dem_2x2());
    let driver = open_shared(dataset.clone(), &SourceOptions::default());
    assert_eq!(Arc::strong_count(&dataset), 2);

    drop(driver);
    assert_eq!(Arc::strong_count(&dataset), 1);
}
