//! GeoTIFF loading for multi-band imagery and elevation models.

use crate::image::{ElevationRaster, RasterImage};
use crate::transform::GeoTransform;
use crate::{RasterError, Result};
use ndarray::{Array2, Array3};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Read, Seek};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, warn};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_METADATA: u16 = 42112;
const GDAL_NODATA: u16 = 42113;

const PROJECTED_CS_TYPE_KEY: u32 = 3072;
const GEOGRAPHIC_TYPE_KEY: u32 = 2048;
const USER_DEFINED: u32 = 32767;

fn tag(code: u16) -> Tag {
    Tag::from_u16_exhaustive(code)
}

fn open_decoder(path: &Path) -> Result<Decoder<std::io::BufReader<std::fs::File>>> {
    let file = std::fs::File::open(path)?;
    let decoder = Decoder::new(std::io::BufReader::new(file))?;

    // Full scenes can exceed the default buffer limits
    let mut limits = Limits::default();
    limits.decoding_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.intermediate_buffer_size = 1024 * 1024 * 1024; // 1 GB
    limits.ifd_value_size = 1024 * 1024 * 1024;
    Ok(decoder.with_limits(limits))
}

/// Load a multi-band GeoTIFF as a [`RasterImage`].
///
/// Band labels are taken from GDAL per-band `DESCRIPTION` metadata when
/// present. The CRS is read from the GeoKey directory and left unset when the
/// file does not name an EPSG code.
pub fn read_image<P: AsRef<Path>>(path: P, id: impl Into<String>) -> Result<RasterImage> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;

    let (width, height) = decoder.dimensions()?;
    let samples = samples_per_pixel(&mut decoder)?;
    reject_planar(&mut decoder)?;

    let transform = read_transform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let labels = read_band_labels(&mut decoder, samples);
    let interleaved = decode_samples(&mut decoder)?;

    let rows = height as usize;
    let cols = width as usize;
    let expected = rows * cols * samples;
    if interleaved.len() != expected {
        return Err(RasterError::ShapeMismatch {
            expected: vec![samples, rows, cols],
            actual: vec![interleaved.len()],
        });
    }

    let bands = Array3::from_shape_fn((samples, rows, cols), |(b, r, c)| {
        interleaved[(r * cols + c) * samples + b]
    });

    debug!(
        path = %path.display(),
        bands = samples,
        rows,
        cols,
        crs = crs.as_deref().unwrap_or("unknown"),
        "loaded image"
    );

    let mut image = RasterImage::new(id, bands, transform).with_labels(labels);
    if let Some(crs) = crs {
        image = image.with_crs(crs);
    }
    Ok(image)
}

/// Load the first band of a GeoTIFF as an [`ElevationRaster`].
pub fn read_elevation<P: AsRef<Path>>(path: P) -> Result<ElevationRaster> {
    let path = path.as_ref();
    let mut decoder = open_decoder(path)?;

    let (width, height) = decoder.dimensions()?;
    let samples = samples_per_pixel(&mut decoder)?;
    reject_planar(&mut decoder)?;

    let transform = read_transform(&mut decoder)?;
    let crs = read_crs(&mut decoder);
    let no_data_value = read_nodata_value(&mut decoder);
    let interleaved = decode_samples(&mut decoder)?;

    let rows = height as usize;
    let cols = width as usize;
    if interleaved.len() != rows * cols * samples {
        return Err(RasterError::ShapeMismatch {
            expected: vec![rows, cols],
            actual: vec![interleaved.len()],
        });
    }
    if samples > 1 {
        warn!(path = %path.display(), samples, "elevation file has several bands, using the first");
    }

    let data = Array2::from_shape_fn((rows, cols), |(r, c)| interleaved[(r * cols + c) * samples]);

    let mut dem = ElevationRaster::new(data, transform);
    if let Some(crs) = crs {
        dem = dem.with_crs(crs);
    }
    if let Some(nodata) = no_data_value {
        dem = dem.with_no_data(nodata);
    }
    Ok(dem)
}

fn samples_per_pixel<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<usize> {
    let samples = match decoder.colortype()? {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        ColorType::Multiband { num_samples, .. } => num_samples as usize,
        other => {
            return Err(RasterError::UnsupportedDataType(format!(
                "color type {:?}",
                other
            )))
        }
    };
    Ok(samples)
}

fn reject_planar<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<()> {
    let planar = match decoder.find_tag(Tag::PlanarConfiguration)? {
        Some(value) => value.into_u32()?,
        None => 1,
    };
    if planar == 2 {
        return Err(RasterError::UnsupportedDataType(
            "planar (band-separate) layout".to_string(),
        ));
    }
    Ok(())
}

/// Decode all samples to f32 in pixel-interleaved order.
fn decode_samples<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder.read_image()?;

    match result {
        DecodingResult::F32(data) => Ok(data),
        DecodingResult::F16(data) => Ok(data.into_iter().map(|v| v.to_f32()).collect()),
        DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
    }
}

/// Read the affine transform from ModelTransformation, or from
/// ModelTiepoint plus ModelPixelScale.
fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(tag(MODEL_TRANSFORMATION)) {
        if m.len() >= 8 {
            return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let tiepoint = decoder.get_tag_f64_vec(tag(MODEL_TIEPOINT));
    let pixel_scale = decoder.get_tag_f64_vec(tag(MODEL_PIXEL_SCALE));

    if let (Ok(tiepoint), Ok(scale)) = (tiepoint, pixel_scale) {
        if tiepoint.len() >= 6 && scale.len() >= 2 {
            // Tiepoint format: [i, j, k, x, y, z] maps pixel (i, j) to world (x, y)
            let (i, j) = (tiepoint[0], tiepoint[1]);
            let pixel_width = scale[0];
            let pixel_height = -scale[1];
            let origin_x = tiepoint[3] - i * pixel_width;
            let origin_y = tiepoint[4] - j * pixel_height;
            return Ok(GeoTransform::new(origin_x, origin_y, pixel_width, pixel_height));
        }
    }

    Err(RasterError::InvalidGeoTiff(
        "missing ModelTransformation or ModelTiepoint/ModelPixelScale tags".to_string(),
    ))
}

/// EPSG identifier from the GeoKey directory, projected key first.
fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<String> {
    let keys = decoder.get_tag_u32_vec(tag(GEO_KEY_DIRECTORY)).ok()?;
    epsg_from_geokeys(&keys).map(|code| format!("EPSG:{}", code))
}

/// Scan a GeoKey directory for an EPSG code stored inline.
///
/// The directory is a 4-value header followed by `(key, location, count, value)`
/// entries. Only entries with location 0 carry their value inline.
pub(crate) fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let declared = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(declared).collect();

    for wanted in [PROJECTED_CS_TYPE_KEY, GEOGRAPHIC_TYPE_KEY] {
        if let Some(entry) = entries.iter().find(|e| e[0] == wanted && e[1] == 0) {
            let code = entry[3];
            if code != 0 && code != USER_DEFINED {
                return Some(code);
            }
        }
    }
    None
}

/// Try to read the no-data value from the GDAL_NODATA tag.
fn read_nodata_value<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
    let text = decoder.get_tag_ascii_string(tag(GDAL_NODATA)).ok()?;
    text.trim_matches(|c: char| c.is_whitespace() || c == '\0').parse().ok()
}

/// Per-band labels from GDAL_METADATA band descriptions.
fn read_band_labels<R: Read + Seek>(decoder: &mut Decoder<R>, bands: usize) -> Vec<Option<String>> {
    match decoder.get_tag_ascii_string(tag(GDAL_METADATA)) {
        Ok(xml) => band_descriptions(&xml, bands),
        Err(_) => vec![None; bands],
    }
}

/// Extract `<Item name="DESCRIPTION" sample="N">label</Item>` entries.
pub(crate) fn band_descriptions(xml: &str, bands: usize) -> Vec<Option<String>> {
    let mut labels = vec![None; bands];
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    // Sample index of the DESCRIPTION item being read, and its text so far
    let mut current: Option<usize> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"Item" => {
                current = description_sample(e);
                text.clear();
            }
            Ok(Event::Text(e)) if current.is_some() => match e.unescape() {
                Ok(chunk) => text.push_str(&chunk),
                Err(err) => {
                    warn!(error = %err, "bad text in GDAL metadata");
                    current = None;
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"Item" => {
                if let Some(sample) = current.take() {
                    let label = text.trim();
                    if sample < bands && !label.is_empty() {
                        labels[sample] = Some(label.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                warn!(error = %err, "malformed GDAL metadata, keeping labels read so far");
                break;
            }
        }
    }
    labels
}

/// Sample index of an `Item` element naming a band description.
fn description_sample(item: &BytesStart) -> Option<usize> {
    let mut is_description = false;
    let mut sample = None;
    for attr in item.attributes().flatten() {
        let value = attr.unescape_value().ok()?;
        match attr.key.as_ref() {
            b"name" => is_description = value == "DESCRIPTION",
            b"sample" => sample = value.trim().parse::<usize>().ok(),
            _ => {}
        }
    }
    if is_description {
        sample
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsg_projected_key_preferred() {
        // header, then GeographicType=4326 and ProjectedCSType=32644
        let keys = [1, 1, 0, 2, 2048, 0, 1, 4326, 3072, 0, 1, 32644];
        assert_eq!(epsg_from_geokeys(&keys), Some(32644));
    }

    #[test]
    fn test_epsg_geographic_only() {
        let keys = [1, 1, 0, 1, 2048, 0, 1, 4326];
        assert_eq!(epsg_from_geokeys(&keys), Some(4326));
    }

    #[test]
    fn test_epsg_user_defined_is_none() {
        let keys = [1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(epsg_from_geokeys(&keys), None);
        assert_eq!(epsg_from_geokeys(&[1, 1]), None);
    }

    #[test]
    fn test_band_descriptions() {
        let xml = r#"<GDALMetadata>
  <Item name="DESCRIPTION" sample="0" role="description">B3</Item>
  <Item name="OFFSET" sample="0" role="offset">0</Item>
  <Item name="DESCRIPTION" sample="2" role="description">SCL</Item>
  <Item name="DESCRIPTION" sample="9" role="description">ignored</Item>
</GDALMetadata>"#;
        let labels = band_descriptions(xml, 3);
        assert_eq!(labels, vec![Some("B3".to_string()), None, Some("SCL".to_string())]);
    }

    #[test]
    fn test_band_descriptions_entities_and_empty_items() {
        let xml = r#"<GDALMetadata>
  <Item sample='1' name='DESCRIPTION'>B3 &amp; green</Item>
  <Item name="DESCRIPTION" sample="0"/>
  <Item name="DESCRIPTION" sample="2">   </Item>
  <Item role="description" sample="3" name="DESCRIPTION">B8</Item>
</GDALMetadata>"#;
        let labels = band_descriptions(xml, 4);
        assert_eq!(
            labels,
            vec![None, Some("B3 & green".to_string()), None, Some("B8".to_string())]
        );
    }

    #[test]
    fn test_band_descriptions_malformed_keeps_earlier_labels() {
        let xml = r#"<GDALMetadata><Item name="DESCRIPTION" sample="0">B2</Item><Item name="DESCRIPTION" sample="1">B3</Oops></GDALMetadata>"#;
        let labels = band_descriptions(xml, 2);
        assert_eq!(labels[0].as_deref(), Some("B2"));
        assert_eq!(labels[1], None);
    }
}
