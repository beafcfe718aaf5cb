//! Handles and descriptions exchanged with a raster engine.
//!
//! None of these types own pixel data. They name imagery held by the engine
//! and describe the operations to apply to it.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

use crate::error::{FieldsenseError, Result};

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalWindow {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

impl TemporalWindow {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Result<Self> {
        if start_date > end_date {
            return Err(FieldsenseError::InvalidRequest {
                reason: format!("window start {} is after end {}", start_date, end_date),
            });
        }
        Ok(Self { start_date, end_date })
    }

    /// Window covering the `days` days that end on `end_date`
    pub fn looking_back(end_date: NaiveDate, days: u32) -> Self {
        Self {
            start_date: end_date - Duration::days(i64::from(days)),
            end_date,
        }
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

impl fmt::Display for TemporalWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start_date, self.end_date)
    }
}

/// Imagery collections the pipeline draws from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    /// Sentinel-2 multispectral (optical)
    Sentinel2,
    /// Sentinel-1 ground range detected (radar)
    Sentinel1Grd,
}

impl Collection {
    /// Catalog identifier understood by the raster engine
    pub fn asset_id(&self) -> &'static str {
        match self {
            Collection::Sentinel2 => "COPERNICUS/S2",
            Collection::Sentinel1Grd => "COPERNICUS/S1_GRD",
        }
    }
}

/// Metadata filters applied when selecting scenes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneFilter {
    /// Keep scenes whose cloudy pixel percentage is strictly below this value
    pub max_cloud_cover: Option<f64>,
    /// Keep scenes carrying this polarisation channel (e.g. "VV")
    pub polarisation: Option<String>,
    /// Keep scenes acquired in this instrument mode (e.g. "IW")
    pub instrument_mode: Option<String>,
}

impl SceneFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_cloud_cover(mut self, percent: f64) -> Self {
        self.max_cloud_cover = Some(percent);
        self
    }

    pub fn polarisation(mut self, channel: impl Into<String>) -> Self {
        self.polarisation = Some(channel.into());
        self
    }

    pub fn instrument_mode(mut self, mode: impl Into<String>) -> Self {
        self.instrument_mode = Some(mode.into());
        self
    }
}

/// Identifier of an engine-side object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageId(pub Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a filtered set of scenes held by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSet {
    pub id: ImageId,
    pub collection: Collection,
}

/// Handle to a raster held by the engine, tagged with its band names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandImage {
    pub id: ImageId,
    pub bands: Vec<String>,
}

impl BandImage {
    pub fn new(id: ImageId, bands: Vec<String>) -> Self {
        Self { id, bands }
    }

    /// Name of the only band of a single-band image
    pub fn band_name(&self) -> Result<&str> {
        match self.bands.as_slice() {
            [name] => Ok(name.as_str()),
            bands => Err(FieldsenseError::engine(format!(
                "expected a single-band image, found bands {:?}",
                bands
            ))),
        }
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.bands.iter().any(|b| b == name)
    }
}

/// Per-pixel band algebra
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BandExpression {
    Band { name: String },
    Constant { value: f64 },
    Add { left: Box<BandExpression>, right: Box<BandExpression> },
    Subtract { left: Box<BandExpression>, right: Box<BandExpression> },
    Multiply { left: Box<BandExpression>, right: Box<BandExpression> },
    Divide { left: Box<BandExpression>, right: Box<BandExpression> },
    /// `(a - b) / (a + b)`
    NormalizedDifference { a: String, b: String },
    /// Linear rescale of `[low, high]` onto `[0, 1]`, unclamped
    UnitScale { input: Box<BandExpression>, low: f64, high: f64 },
    Clamp { input: Box<BandExpression>, min: f64, max: f64 },
}

impl BandExpression {
    pub fn band(name: impl Into<String>) -> Self {
        BandExpression::Band { name: name.into() }
    }

    pub fn constant(value: f64) -> Self {
        BandExpression::Constant { value }
    }

    pub fn normalized_difference(a: impl Into<String>, b: impl Into<String>) -> Self {
        BandExpression::NormalizedDifference { a: a.into(), b: b.into() }
    }

    pub fn add(self, other: BandExpression) -> Self {
        BandExpression::Add { left: Box::new(self), right: Box::new(other) }
    }

    pub fn subtract(self, other: BandExpression) -> Self {
        BandExpression::Subtract { left: Box::new(self), right: Box::new(other) }
    }

    pub fn multiply(self, other: BandExpression) -> Self {
        BandExpression::Multiply { left: Box::new(self), right: Box::new(other) }
    }

    pub fn divide(self, other: BandExpression) -> Self {
        BandExpression::Divide { left: Box::new(self), right: Box::new(other) }
    }

    pub fn unit_scale(self, low: f64, high: f64) -> Self {
        BandExpression::UnitScale { input: Box::new(self), low, high }
    }

    pub fn clamp(self, min: f64, max: f64) -> Self {
        BandExpression::Clamp { input: Box::new(self), min, max }
    }

    /// Names of every band the expression reads
    pub fn referenced_bands(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_bands(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_bands<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            BandExpression::Band { name } => out.push(name),
            BandExpression::Constant { .. } => {}
            BandExpression::Add { left, right }
            | BandExpression::Subtract { left, right }
            | BandExpression::Multiply { left, right }
            | BandExpression::Divide { left, right } => {
                left.collect_bands(out);
                right.collect_bands(out);
            }
            BandExpression::NormalizedDifference { a, b } => {
                out.push(a);
                out.push(b);
            }
            BandExpression::UnitScale { input, .. } | BandExpression::Clamp { input, .. } => {
                input.collect_bands(out)
            }
        }
    }
}

/// Region reducers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Mean,
    Covariance,
    Min,
    Max,
}

/// Output of a region reduction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionStats {
    /// One scalar per band (mean, min, max)
    PerBand {
        pixel_count: u64,
        values: BTreeMap<String, f64>,
    },
    /// Band-by-band covariance, rows and columns in `bands` order
    Covariance {
        pixel_count: u64,
        bands: Vec<String>,
        matrix: Vec<Vec<f64>>,
    },
}

impl RegionStats {
    pub fn pixel_count(&self) -> u64 {
        match self {
            RegionStats::PerBand { pixel_count, .. } => *pixel_count,
            RegionStats::Covariance { pixel_count, .. } => *pixel_count,
        }
    }

    /// Scalar value of a band, for per-band reductions
    pub fn band_value(&self, band: &str) -> Option<f64> {
        match self {
            RegionStats::PerBand { values, .. } => values.get(band).copied(),
            RegionStats::Covariance { .. } => None,
        }
    }
}

/// Eigen-decomposition of a symmetric matrix.
///
/// `vectors[i]` is the unit eigenvector paired with `values[i]`. No ordering
/// is implied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenDecomposition {
    pub values: Vec<f64>,
    pub vectors: Vec<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        assert!(TemporalWindow::new(date(2025, 7, 8), date(2025, 7, 1)).is_err());
        assert!(TemporalWindow::new(date(2025, 7, 8), date(2025, 7, 8)).is_ok());
    }

    #[test]
    fn test_looking_back() {
        let window = TemporalWindow::looking_back(date(2025, 7, 8), 14);
        assert_eq!(window.start_date(), date(2025, 6, 24));
        assert_eq!(window.days(), 14);
        assert!(window.contains(date(2025, 7, 1)));
        assert!(!window.contains(date(2025, 7, 9)));
    }

    #[test]
    fn test_referenced_bands() {
        let expr = BandExpression::normalized_difference("B8", "B4")
            .add(BandExpression::band("B8").divide(BandExpression::band("B2")));
        assert_eq!(expr.referenced_bands(), vec!["B2", "B4", "B8"]);
    }

    #[test]
    fn test_expression_wire_format() {
        let expr = BandExpression::band("VV").unit_scale(-25.0, 0.0).clamp(0.0, 1.0);
        let json = serde_json::to_value(&expr).unwrap();
        assert_eq!(json["op"], "clamp");
        assert_eq!(json["input"]["op"], "unit_scale");
        assert_eq!(json["input"]["input"]["name"], "VV");
    }

    #[test]
    fn test_single_band_name() {
        let image = BandImage::new(ImageId::new(), vec!["NDVI".to_string()]);
        assert_eq!(image.band_name().unwrap(), "NDVI");

        let stack = BandImage::new(ImageId::new(), vec!["NDVI".to_string(), "NDRE".to_string()]);
        assert!(stack.band_name().is_err());
    }
}
