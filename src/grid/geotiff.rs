use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use ndarray::Array2;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;

use crate::geom::Crs;

use super::Grid;

// GeoTIFF private tags (OGC GeoTIFF 1.1 + the GDAL nodata extension).
const TAG_MODEL_PIXEL_SCALE: u16 = 33550;
const TAG_MODEL_TIEPOINT: u16 = 33922;
const TAG_GEO_KEY_DIRECTORY: u16 = 34735;
const TAG_GDAL_NODATA: u16 = 42113;

const KEY_GEOGRAPHIC_TYPE: u16 = 2048;
const KEY_PROJECTED_TYPE: u16 = 3072;
const KEY_VALUE_USER_DEFINED: u16 = 32767;

impl Grid {
    /// Read a single-band GeoTIFF raster.
    ///
    /// Resolution comes from ModelPixelScale, the origin from the first
    /// ModelTiepoint, the no-data sentinel from GDAL_NODATA and the EPSG code
    /// from the GeoKey directory. A malformed raster is a fatal input error.
    pub fn from_geotiff(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open raster: {}", path.display()))?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .with_context(|| format!("Failed to initialise TIFF decoder: {}", path.display()))?;

        let (width, height) = decoder
            .dimensions()
            .with_context(|| format!("Failed to read raster dimensions: {}", path.display()))?;
        ensure!(width > 0 && height > 0, "raster {} has empty dimensions", path.display());

        let scale = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_PIXEL_SCALE))
            .with_context(|| format!("raster {} has no ModelPixelScale tag", path.display()))?;
        ensure!(scale.len() >= 2, "malformed ModelPixelScale in {}", path.display());
        let (x_res, y_res) = (scale[0].abs(), scale[1].abs());

        let tiepoint = decoder
            .get_tag_f64_vec(Tag::Unknown(TAG_MODEL_TIEPOINT))
            .with_context(|| format!("raster {} has no ModelTiepoint tag", path.display()))?;
        ensure!(tiepoint.len() >= 6, "malformed ModelTiepoint in {}", path.display());

        let nodata = read_nodata(&mut decoder);
        let crs = match read_epsg(&mut decoder) {
            Some(code) => Crs::Epsg(code),
            None => Crs::Unknown,
        };

        let values = decode_band(&mut decoder)
            .with_context(|| format!("Failed to decode raster data: {}", path.display()))?;
        ensure!(
            values.len() == width as usize * height as usize,
            "raster {} is not single band: {} samples for {}x{} pixels",
            path.display(),
            values.len(),
            width,
            height
        );

        // The tiepoint anchors raster position (i, j) at a pixel corner; walk
        // back to the corner of pixel (0, 0), then out to pixel centroids.
        // Row 0 is the top of the image, so y decreases with row index.
        let left = tiepoint[3] - tiepoint[0] * x_res;
        let top = tiepoint[4] + tiepoint[1] * y_res;
        let xs = (0..width).map(|i| left + (i as f64 + 0.5) * x_res).collect();
        let ys = (0..height).map(|j| top - (j as f64 + 0.5) * y_res).collect();

        let values = Array2::from_shape_vec((height as usize, width as usize), values)
            .with_context(|| format!("raster {} shape mismatch", path.display()))?;

        Grid::from_parts(values, xs, ys, x_res, y_res, nodata, crs)
    }
}

/// Decode the image into f64 samples whatever the stored sample type.
fn decode_band<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f64>> {
    let image = decoder.read_image()?;
    Ok(match image {
        DecodingResult::U8(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F64(v) => v,
        _ => bail!("unsupported sample format: {:?}", decoder.colortype()?),
    })
}

/// GDAL stores the no-data sentinel as ASCII, sometimes NUL terminated.
fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    decoder
        .get_tag_ascii_string(Tag::Unknown(TAG_GDAL_NODATA))
        .ok()
        .and_then(|s| s.trim().trim_end_matches('\0').trim().parse().ok())
}

/// Pull the EPSG code out of the GeoKey directory, preferring a projected
/// CRS key over a geographic one. User-defined codes are treated as unknown.
fn read_epsg<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let dir = decoder.get_tag_u16_vec(Tag::Unknown(TAG_GEO_KEY_DIRECTORY)).ok()?;
    // Header: version, key revision, minor revision, number of keys.
    let count = *dir.get(3)? as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in 0..count {
        let base = 4 + entry * 4;
        let key = dir.get(base..base + 4)?;
        // Only short values stored inline (location 0) can carry an EPSG code.
        if key[1] != 0 {
            continue;
        }
        match key[0] {
            KEY_GEOGRAPHIC_TYPE => geographic = Some(key[3]),
            KEY_PROJECTED_TYPE => projected = Some(key[3]),
            _ => {}
        }
    }

    projected
        .or(geographic)
        .filter(|&code| code != 0 && code != KEY_VALUE_USER_DEFINED)
        .map(u32::from)
}
