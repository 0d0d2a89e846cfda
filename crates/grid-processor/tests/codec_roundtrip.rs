//! Integration test: write grids with ZarrGridCodec and read them back.
//!
//! Every finite cell, the transform, the CRS and the nodata marker must
//! survive a save/load cycle unchanged.

use grid_processor::{
    CrsCode, GeoTransform, Grid, GridCodec, GridProcessorConfig, GridProcessorError,
    ZarrCompression, ZarrGridCodec,
};
use test_utils::{create_grid_with_nans, create_test_grid, georeferenced, temp_dir};
use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

fn assert_bitwise_eq(a: &Grid, b: &Grid) {
    assert_eq!(a.shape(), b.shape());
    assert_eq!(a.transform(), b.transform());
    assert_eq!(a.crs(), b.crs());
    assert_eq!(a.nodata(), b.nodata());
    for (i, (x, y)) in a.values().iter().zip(b.values()).enumerate() {
        if x.is_nan() {
            assert!(y.is_nan(), "cell {} should be missing", i);
        } else {
            assert_eq!(x.to_bits(), y.to_bits(), "cell {} differs", i);
        }
    }
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_roundtrip_full_grid() {
    let (width, height) = (100, 80);
    let grid = georeferenced(
        create_test_grid(width, height),
        width,
        height,
        (-106.0, 40.0),
        0.0125,
        CrsCode::Epsg4326,
    );

    let dir = temp_dir();
    let path = dir.path().join("elevation.zarr");
    let codec = ZarrGridCodec::default();
    codec.save_grid(&grid, &path).expect("Failed to save");
    let loaded = codec.load_grid(&path).expect("Failed to load");

    assert_bitwise_eq(&grid, &loaded);
}

#[test]
fn test_roundtrip_across_chunks_and_codecs() {
    let (width, height) = (37, 23);
    let data: Vec<f32> = (0..width * height).map(|i| (i as f32) * 0.1 + 1.0e-7).collect();
    let grid = georeferenced(data, width, height, (0.0, 23.0), 30.0, CrsCode::Epsg3857);

    for compression in [
        ZarrCompression::None,
        ZarrCompression::BloscLz4,
        ZarrCompression::BloscZstd,
    ] {
        let config = GridProcessorConfig {
            zarr_chunk_size: 16,
            zarr_compression: compression,
            ..Default::default()
        };
        let dir = temp_dir();
        let path = dir.path().join("grid.zarr");
        let codec = ZarrGridCodec::new(&config);
        codec.save_grid(&grid, &path).unwrap();
        assert_bitwise_eq(&grid, &codec.load_grid(&path).unwrap());
    }
}

#[test]
fn test_roundtrip_nodata_and_missing_cells() {
    let mut data = create_grid_with_nans(10, 10, &[(0, 0), (9, 9), (4, 5)]);
    data[1] = -9999.0;
    let grid = georeferenced(data, 10, 10, (-105.0, 40.0), 0.1, CrsCode::Epsg4269)
        .with_nodata(-9999.0);
    assert_eq!(grid.valid_count(), 96);

    let dir = temp_dir();
    let path = dir.path().join("soil_ph.zarr");
    let codec = ZarrGridCodec::default();
    codec.save_grid(&grid, &path).unwrap();
    let loaded = codec.load_grid(&path).unwrap();

    assert_bitwise_eq(&grid, &loaded);
    assert_eq!(loaded.valid_count(), 96);
    assert_eq!(loaded.cell_value(0, 1), None);
}

#[test]
fn test_roundtrip_rotated_transform_without_crs() {
    let t = GeoTransform::from_gdal([500.0, 10.0, 2.0, 900.0, 1.5, -10.0]);
    let grid = Grid::new(3, 4, create_test_grid(4, 3), t).unwrap();

    let dir = temp_dir();
    let path = dir.path().join("rotated.zarr");
    let codec = ZarrGridCodec::default();
    codec.save_grid(&grid, &path).unwrap();
    assert_bitwise_eq(&grid, &codec.load_grid(&path).unwrap());
}

#[test]
fn test_save_replaces_existing_array() {
    let dir = temp_dir();
    let path = dir.path().join("layer.zarr");
    let codec = ZarrGridCodec::default();

    let big = georeferenced(vec![1.0; 64], 8, 8, (0.0, 8.0), 1.0, CrsCode::Epsg3857);
    let small = georeferenced(vec![2.0; 4], 2, 2, (0.0, 2.0), 1.0, CrsCode::Epsg3857);
    codec.save_grid(&big, &path).unwrap();
    codec.save_grid(&small, &path).unwrap();

    assert_bitwise_eq(&small, &codec.load_grid(&path).unwrap());
}

// =============================================================================
// Raw arrays written by other tools
// =============================================================================

fn write_band_array(path: &std::path::Path, dims: Option<Vec<&str>>) {
    std::fs::create_dir_all(path).unwrap();
    let store = std::sync::Arc::new(FilesystemStore::new(path).unwrap());

    let mut attrs = serde_json::Map::new();
    attrs.insert(
        "transform".to_string(),
        serde_json::json!([0.0, 1.0, 0.0, 2.0, 0.0, -1.0]),
    );
    attrs.insert("crs".to_string(), serde_json::json!("EPSG:3857"));
    if let Some(dims) = dims {
        attrs.insert("dims".to_string(), serde_json::json!(dims));
    }

    let array = ArrayBuilder::new(
        vec![1, 2, 3],
        DataType::Float32,
        vec![1u64, 2, 3].try_into().unwrap(),
        FillValue::from(f32::NAN),
    )
    .attributes(attrs)
    .build(store, "/")
    .unwrap();
    array.store_metadata().unwrap();

    let subset = ArraySubset::new_with_start_shape(vec![0, 0, 0], vec![1, 2, 3]).unwrap();
    array
        .store_array_subset_elements(&subset, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])
        .unwrap();
}

#[test]
fn test_load_squeezes_single_band() {
    let dir = temp_dir();
    let path = dir.path().join("band.zarr");
    write_band_array(&path, Some(vec!["band", "y", "x"]));

    let codec = ZarrGridCodec::default();
    let raw = codec.load_raw(&path).unwrap();
    assert_eq!(raw.shape, vec![1, 2, 3]);
    assert_eq!(raw.dims, vec!["band", "y", "x"]);

    let grid = codec.load_grid(&path).unwrap();
    assert_eq!(grid.shape(), (2, 3));
    assert_eq!(grid.cell_value(1, 2), Some(6.0));
    assert_eq!(grid.crs(), Some(CrsCode::Epsg3857));
}

#[test]
fn test_load_without_dims_attribute_uses_defaults() {
    let dir = temp_dir();
    let path = dir.path().join("nodims.zarr");
    write_band_array(&path, None);

    let raw = ZarrGridCodec::default().load_raw(&path).unwrap();
    assert_eq!(raw.dims, vec!["dim_0", "y", "x"]);
}

#[test]
fn test_load_missing_array_fails() {
    let dir = temp_dir();
    let err = ZarrGridCodec::default()
        .load_grid(&dir.path().join("absent.zarr"))
        .unwrap_err();
    assert!(matches!(
        err,
        GridProcessorError::Codec(_) | GridProcessorError::Storage(_)
    ));
}
