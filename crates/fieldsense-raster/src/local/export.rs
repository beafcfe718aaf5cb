//! Single-band GeoTIFF writer.
//!
//! Output is a 32-bit float grayscale TIFF in EPSG:4326 with NaN as nodata,
//! resampled by nearest neighbour onto a grid of the requested resolution.

use fieldsense_core::error::{FieldsenseError, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use super::raster::Raster;
use crate::spatial::AreaMask;

/// Metres per degree of latitude
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Largest grid an export may produce
pub const MAX_EXPORT_PIXELS: usize = 100_000_000;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

/// GeoKey directory for a geographic WGS84 raster with pixel-is-area
const WGS84_GEO_KEYS: [u16; 16] = [
    1, 1, 0, 3, // header: version, revision, minor, key count
    1024, 0, 1, 2, // GTModelTypeGeoKey = geographic
    1025, 0, 1, 1, // GTRasterTypeGeoKey = pixel is area
    2048, 0, 1, 4326, // GeographicTypeGeoKey = WGS84
];

/// Output grid of an export
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ExportGrid {
    pub min_lon: f64,
    pub max_lat: f64,
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
}

impl ExportGrid {
    pub fn covering(mask: &AreaMask, resolution_meters: f64) -> Result<Self> {
        let bbox = mask.bounding_box();
        let pixel_size = resolution_meters / METERS_PER_DEGREE;
        // tolerance keeps an exact multiple from gaining a sliver column
        let width = (bbox.width() / pixel_size - 1e-9).ceil().max(1.0) as usize;
        let height = (bbox.height() / pixel_size - 1e-9).ceil().max(1.0) as usize;

        if width.saturating_mul(height) > MAX_EXPORT_PIXELS {
            return Err(FieldsenseError::engine(format!(
                "export of {}x{} pixels exceeds the {} pixel limit",
                width, height, MAX_EXPORT_PIXELS
            )));
        }

        Ok(Self { min_lon: bbox.min_lon, max_lat: bbox.max_lat, pixel_size, width, height })
    }

    fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (
            self.min_lon + (col as f64 + 0.5) * self.pixel_size,
            self.max_lat - (row as f64 + 0.5) * self.pixel_size,
        )
    }
}

/// Sample the first band of `raster` onto `grid`, masking outside `mask`
pub(crate) fn resample(raster: &Raster, grid: &ExportGrid, mask: &AreaMask) -> Vec<f32> {
    let source = &raster.grid;
    let Some(band) = raster.bands.first() else {
        return vec![f32::NAN; grid.width * grid.height];
    };

    let mut out = Vec::with_capacity(grid.width * grid.height);
    for row in 0..grid.height {
        for col in 0..grid.width {
            let (lon, lat) = grid.pixel_center(col, row);
            let value = if mask.contains(lon, lat) {
                let src_col = ((lon - source.min_lon) / source.pixel_size).floor();
                let src_row = ((source.max_lat - lat) / source.pixel_size).floor();
                if src_col >= 0.0
                    && src_row >= 0.0
                    && (src_col as usize) < source.width
                    && (src_row as usize) < source.height
                {
                    band.data[src_row as usize * source.width + src_col as usize]
                } else {
                    f32::NAN
                }
            } else {
                f32::NAN
            };
            out.push(value);
        }
    }
    out
}

/// Write `data` as a GeoTIFF at `destination`.
///
/// The file is written beside the destination and renamed into place so a
/// reader never observes a partial file.
pub(crate) fn write_geotiff(grid: &ExportGrid, data: &[f32], destination: &Path) -> Result<()> {
    let partial = partial_path(destination);
    let result = encode(grid, data, &partial).and_then(|_| {
        fs::rename(&partial, destination).map_err(|e| export_error(destination, e.to_string()))
    });

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn encode(grid: &ExportGrid, data: &[f32], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| export_error(path, e.to_string()))?;
    let mut encoder =
        TiffEncoder::new(BufWriter::new(file)).map_err(|e| export_error(path, e.to_string()))?;

    let mut image = encoder
        .new_image::<colortype::Gray32Float>(grid.width as u32, grid.height as u32)
        .map_err(|e| export_error(path, e.to_string()))?;

    let scale = [grid.pixel_size, grid.pixel_size, 0.0];
    let tiepoint = [0.0, 0.0, 0.0, grid.min_lon, grid.max_lat, 0.0];

    let tags = image.encoder();
    tags.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| export_error(path, e.to_string()))?;
    tags.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| export_error(path, e.to_string()))?;
    tags.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), &WGS84_GEO_KEYS[..])
        .map_err(|e| export_error(path, e.to_string()))?;

    image.write_data(data).map_err(|e| export_error(path, e.to_string()))?;
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    destination.with_file_name(name)
}

fn export_error(path: &Path, reason: String) -> FieldsenseError {
    FieldsenseError::ExportFailure {
        output: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        reason,
    }
}
