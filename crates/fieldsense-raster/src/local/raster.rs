//! Pixel grids held by the in-process engine.
//!
//! Rasters are row-major with row 0 at the northern edge. Missing data is
//! stored as NaN.

use chrono::NaiveDate;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{BandExpression, BoundingBox, Collection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::spatial::AreaMask;

/// Geographic placement of a pixel grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Longitude of the western edge
    pub min_lon: f64,
    /// Latitude of the northern edge
    pub max_lat: f64,
    /// Pixel edge length in degrees
    pub pixel_size: f64,
    pub width: usize,
    pub height: usize,
}

impl GridSpec {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lon: self.min_lon,
            min_lat: self.max_lat - self.pixel_size * self.height as f64,
            max_lon: self.min_lon + self.pixel_size * self.width as f64,
            max_lat: self.max_lat,
        }
    }

    /// Longitude/latitude of the centre of the pixel at `index`
    pub fn pixel_center(&self, index: usize) -> (f64, f64) {
        let col = index % self.width;
        let row = index / self.width;
        (
            self.min_lon + (col as f64 + 0.5) * self.pixel_size,
            self.max_lat - (row as f64 + 0.5) * self.pixel_size,
        )
    }

    /// Indices of the pixels whose centres fall inside `mask`
    pub fn pixels_in(&self, mask: &AreaMask) -> Vec<usize> {
        (0..self.len())
            .filter(|&i| {
                let (lon, lat) = self.pixel_center(i);
                mask.contains(lon, lat)
            })
            .collect()
    }

    fn same_grid(&self, other: &GridSpec) -> bool {
        self.width == other.width
            && self.height == other.height
            && (self.min_lon - other.min_lon).abs() < 1e-12
            && (self.max_lat - other.max_lat).abs() < 1e-12
            && (self.pixel_size - other.pixel_size).abs() < 1e-15
    }
}

/// A named band of pixel values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterBand {
    pub name: String,
    pub data: Vec<f32>,
}

/// A multi-band pixel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub grid: GridSpec,
    pub bands: Vec<RasterBand>,
}

impl Raster {
    pub fn new(grid: GridSpec, bands: Vec<RasterBand>) -> Result<Self> {
        let raster = Self { grid, bands };
        raster.validate()?;
        Ok(raster)
    }

    /// Raster whose bands each hold one value everywhere
    pub fn constant(grid: GridSpec, bands: &[(&str, f32)]) -> Self {
        Self {
            grid,
            bands: bands
                .iter()
                .map(|(name, value)| RasterBand {
                    name: name.to_string(),
                    data: vec![*value; grid.len()],
                })
                .collect(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.is_empty() || !(self.grid.pixel_size > 0.0) {
            return Err(FieldsenseError::engine("raster grid has no pixels"));
        }
        for band in &self.bands {
            if band.data.len() != self.grid.len() {
                return Err(FieldsenseError::engine(format!(
                    "band {} has {} values, grid has {} pixels",
                    band.name,
                    band.data.len(),
                    self.grid.len()
                )));
            }
        }
        Ok(())
    }

    pub fn band_names(&self) -> Vec<String> {
        self.bands.iter().map(|b| b.name.clone()).collect()
    }

    pub fn band(&self, name: &str) -> Option<&RasterBand> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub(crate) fn ensure_same_grid(&self, other: &Raster) -> Result<()> {
        if self.grid.same_grid(&other.grid) {
            Ok(())
        } else {
            Err(FieldsenseError::engine("rasters are not on the same pixel grid"))
        }
    }

    /// Per-pixel median of several co-registered rasters
    pub fn median_of(rasters: &[&Raster]) -> Result<Raster> {
        let first = rasters
            .first()
            .ok_or_else(|| FieldsenseError::engine("cannot composite an empty scene set"))?;

        for other in &rasters[1..] {
            first.ensure_same_grid(other)?;
        }

        let mut bands = Vec::with_capacity(first.bands.len());
        for band in &first.bands {
            let sources = rasters
                .iter()
                .map(|r| {
                    r.band(&band.name).map(|b| b.data.as_slice()).ok_or_else(|| {
                        FieldsenseError::engine(format!("scene is missing band {}", band.name))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut samples = Vec::with_capacity(sources.len());
            let data = (0..first.grid.len())
                .map(|i| {
                    samples.clear();
                    samples.extend(sources.iter().map(|s| s[i]).filter(|v| v.is_finite()));
                    median(&mut samples)
                })
                .collect();

            bands.push(RasterBand { name: band.name.clone(), data });
        }

        Ok(Raster { grid: first.grid, bands })
    }

    /// Evaluate a band expression into a new single-band raster
    pub fn evaluate(&self, expression: &BandExpression, output_band: &str) -> Result<Raster> {
        let lookup: HashMap<&str, &[f32]> =
            self.bands.iter().map(|b| (b.name.as_str(), b.data.as_slice())).collect();

        for name in expression.referenced_bands() {
            if !lookup.contains_key(name) {
                return Err(FieldsenseError::engine(format!(
                    "expression references unknown band {}",
                    name
                )));
            }
        }

        let data = (0..self.grid.len())
            .map(|i| eval(expression, &lookup, i) as f32)
            .collect();

        Ok(Raster {
            grid: self.grid,
            bands: vec![RasterBand { name: output_band.to_string(), data }],
        })
    }

    /// Copy with every pixel failing `keep` set to NaN
    pub fn masked(&self, keep: impl Fn(usize) -> bool) -> Raster {
        let keep: Vec<bool> = (0..self.grid.len()).map(keep).collect();
        Raster {
            grid: self.grid,
            bands: self
                .bands
                .iter()
                .map(|b| RasterBand {
                    name: b.name.clone(),
                    data: b
                        .data
                        .iter()
                        .zip(&keep)
                        .map(|(v, k)| if *k { *v } else { f32::NAN })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Pixels of `candidates` where every band holds data
    pub fn valid_pixels(&self, candidates: &[usize]) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|&i| self.bands.iter().all(|b| b.data[i].is_finite()))
            .collect()
    }
}

fn median(samples: &mut [f32]) -> f32 {
    if samples.is_empty() {
        return f32::NAN;
    }
    samples.sort_by(|a, b| a.total_cmp(b));
    let mid = samples.len() / 2;
    if samples.len() % 2 == 1 {
        samples[mid]
    } else {
        ((f64::from(samples[mid - 1]) + f64::from(samples[mid])) / 2.0) as f32
    }
}

fn eval(expression: &BandExpression, bands: &HashMap<&str, &[f32]>, i: usize) -> f64 {
    let read = |name: &str| bands.get(name).map(|data| f64::from(data[i])).unwrap_or(f64::NAN);

    match expression {
        BandExpression::Band { name } => read(name),
        BandExpression::Constant { value } => *value,
        BandExpression::Add { left, right } => eval(left, bands, i) + eval(right, bands, i),
        BandExpression::Subtract { left, right } => eval(left, bands, i) - eval(right, bands, i),
        BandExpression::Multiply { left, right } => eval(left, bands, i) * eval(right, bands, i),
        BandExpression::Divide { left, right } => {
            let denominator = eval(right, bands, i);
            if denominator == 0.0 {
                f64::NAN
            } else {
                eval(left, bands, i) / denominator
            }
        }
        BandExpression::NormalizedDifference { a, b } => {
            let (a, b) = (read(a), read(b));
            if a + b == 0.0 {
                f64::NAN
            } else {
                (a - b) / (a + b)
            }
        }
        BandExpression::UnitScale { input, low, high } => {
            if high == low {
                f64::NAN
            } else {
                (eval(input, bands, i) - low) / (high - low)
            }
        }
        BandExpression::Clamp { input, min, max } => eval(input, bands, i).clamp(*min, *max),
    }
}

/// One acquisition in the in-process catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub collection: Collection,
    pub acquired: NaiveDate,
    /// Cloudy pixel percentage, 0..100
    #[serde(default)]
    pub cloud_cover: f64,
    #[serde(default)]
    pub polarisations: Vec<String>,
    #[serde(default)]
    pub instrument_mode: Option<String>,
    pub raster: Raster,
}
