//! Integration tests for GeoTIFF loading.
//!
//! Files are written to a temporary directory with the tiff encoder so the
//! tests do not depend on external data.

use approx::assert_relative_eq;
use lakevol_raster::{read_elevation, read_image, RasterError};
use std::fs::File;
use std::path::Path;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

const GDAL_METADATA: &str = r#"<GDALMetadata>
  <Item name="DESCRIPTION" sample="0" role="description">B2</Item>
  <Item name="DESCRIPTION" sample="1" role="description">B3</Item>
  <Item name="DESCRIPTION" sample="2" role="description">B4</Item>
  <Item name="DESCRIPTION" sample="3" role="description">B8</Item>
</GDALMetadata>"#;

fn write_four_band(path: &Path, with_georef: bool) {
    let (width, height) = (6u32, 4u32);
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for row in 0..height {
        for col in 0..width {
            for band in 0..4 {
                data.push((band * 1000 + row * 10 + col) as f32);
            }
        }
    }

    let file = File::create(path).expect("create tiff");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    let mut image = encoder
        .new_image::<colortype::RGBA32Float>(width, height)
        .expect("new image");
    if with_georef {
        image
            .encoder()
            .write_tag(Tag::Unknown(33550), &[10.0f64, 10.0, 0.0][..])
            .expect("pixel scale");
        image
            .encoder()
            .write_tag(Tag::Unknown(33922), &[0.0f64, 0.0, 0.0, 500_000.0, 1_200_000.0, 0.0][..])
            .expect("tiepoint");
        image
            .encoder()
            .write_tag(Tag::Unknown(34735), &[1u16, 1, 0, 1, 3072, 0, 1, 32644][..])
            .expect("geokeys");
        image
            .encoder()
            .write_tag(Tag::Unknown(42112), GDAL_METADATA)
            .expect("metadata");
    }
    image.write_data(&data).expect("write data");
}

fn write_dem(path: &Path) {
    let (width, height) = (5u32, 5u32);
    let mut data = vec![0.0f32; (width * height) as usize];
    for row in 0..height as usize {
        for col in 0..width as usize {
            data[row * width as usize + col] = 100.0 + (row + col) as f32;
        }
    }
    data[0] = -9999.0;

    let file = File::create(path).expect("create tiff");
    let mut encoder = TiffEncoder::new(file).expect("encoder");
    let mut image = encoder
        .new_image::<colortype::Gray32Float>(width, height)
        .expect("new image");
    image
        .encoder()
        .write_tag(Tag::Unknown(33550), &[30.0f64, 30.0, 0.0][..])
        .expect("pixel scale");
    image
        .encoder()
        .write_tag(Tag::Unknown(33922), &[0.0f64, 0.0, 0.0, 1000.0, 2000.0, 0.0][..])
        .expect("tiepoint");
    image
        .encoder()
        .write_tag(Tag::Unknown(42113), "-9999")
        .expect("nodata");
    image.write_data(&data).expect("write data");
}

#[test]
fn test_read_multiband_image() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("scene.tif");
    write_four_band(&path, true);

    let image = read_image(&path, "scene").expect("Failed to load image");
    assert_eq!(image.id(), "scene");
    assert_eq!(image.band_count(), 4);
    assert_eq!(image.shape(), (4, 6));
    assert_eq!(image.crs(), Some("EPSG:32644"));

    // Deinterleaved into (band, row, col)
    assert_eq!(image.band(0).unwrap()[[0, 0]], 0.0);
    assert_eq!(image.band(1).unwrap()[[2, 3]], 1023.0);
    assert_eq!(image.band(3).unwrap()[[3, 5]], 3035.0);

    let t = image.transform();
    assert_relative_eq!(t.origin_x, 500_000.0);
    assert_relative_eq!(t.origin_y, 1_200_000.0);
    assert_relative_eq!(t.pixel_width, 10.0);
    assert_relative_eq!(t.pixel_height, -10.0);
    assert_relative_eq!(t.pixel_area(), 100.0);

    let labels: Vec<Option<&str>> = image.band_labels().iter().map(|l| l.as_deref()).collect();
    assert_eq!(labels, vec![Some("B2"), Some("B3"), Some("B4"), Some("B8")]);
}

#[test]
fn test_missing_georeferencing_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plain.tif");
    write_four_band(&path, false);

    match read_image(&path, "plain") {
        Err(RasterError::InvalidGeoTiff(_)) => {}
        other => panic!("expected InvalidGeoTiff, got {:?}", other.map(|i| i.shape())),
    }
}

#[test]
fn test_read_elevation_with_nodata() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("dem.tif");
    write_dem(&path);

    let dem = read_elevation(&path).expect("Failed to load DEM");
    assert_eq!(dem.shape(), (5, 5));
    assert_eq!(dem.no_data_value(), Some(-9999.0));
    assert_relative_eq!(dem.pixel_area(), 900.0);
    assert!(dem.crs().is_none());

    let valid: Vec<f32> = dem.valid_samples().collect();
    assert_eq!(valid.len(), 24);
    assert_eq!(dem.data()[[4, 4]], 108.0);
}

#[test]
fn test_missing_file() {
    let result = read_elevation("does/not/exist.tif");
    assert!(matches!(result, Err(RasterError::Io(_))));
}
