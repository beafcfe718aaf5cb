//! Synthetic imagery shared by the pipeline tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use fieldsense_analysis::{AnalysisPipeline, FixedClock};
use fieldsense_core::config::AnalysisSettings;
use fieldsense_core::models::{AnalysisRequest, AreaOfInterest, Collection, FieldId, Geometry};
use fieldsense_raster::{GridSpec, LocalRasterEngine, Raster, RasterBand, Scene};
use fieldsense_store::MemoryMetadataStore;
use std::path::Path;
use std::sync::Arc;

pub const SIZE: usize = 10;
pub const PIXEL: f64 = 0.0001;
pub const MIN_LON: f64 = 10.0;
pub const MIN_LAT: f64 = 45.0;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
}

pub fn days_ago(days: i64) -> NaiveDate {
    today() - Duration::days(days)
}

pub fn grid() -> GridSpec {
    GridSpec {
        min_lon: MIN_LON,
        max_lat: MIN_LAT + PIXEL * SIZE as f64,
        pixel_size: PIXEL,
        width: SIZE,
        height: SIZE,
    }
}

/// The area covered by `grid()`
pub fn area() -> AreaOfInterest {
    let extent = PIXEL * SIZE as f64;
    AreaOfInterest::new(Geometry::rectangle(MIN_LON, MIN_LAT, MIN_LON + extent, MIN_LAT + extent))
        .unwrap()
}

pub fn field() -> FieldId {
    FieldId::new("farm-01").unwrap()
}

pub fn request() -> AnalysisRequest {
    AnalysisRequest::new(field(), area())
}

fn band(name: &str, value: impl Fn(usize, usize) -> f32) -> RasterBand {
    let data = (0..SIZE * SIZE).map(|i| value(i % SIZE, i / SIZE)).collect();
    RasterBand { name: name.to_string(), data }
}

/// Optical scene whose reflectances vary across the grid
pub fn optical(id: &str, acquired: NaiveDate) -> Scene {
    let raster = Raster::new(
        grid(),
        vec![
            band("B2", |_, row| 0.05 + 0.004 * row as f32),
            band("B4", |col, row| 0.12 - 0.006 * col as f32 + 0.002 * ((col * row) % 3) as f32),
            band("B5", |col, row| 0.15 + 0.003 * row as f32 - 0.001 * col as f32),
            band("B8", |col, row| 0.30 + 0.04 * col as f32 + 0.01 * row as f32),
        ],
    )
    .unwrap();
    optical_scene(id, acquired, raster)
}

/// Optical scene with the given reflectance everywhere
pub fn flat_optical(id: &str, acquired: NaiveDate, b2: f32, b4: f32, b5: f32, b8: f32) -> Scene {
    let raster = Raster::constant(grid(), &[("B2", b2), ("B4", b4), ("B5", b5), ("B8", b8)]);
    optical_scene(id, acquired, raster)
}

fn optical_scene(id: &str, acquired: NaiveDate, raster: Raster) -> Scene {
    Scene {
        id: id.to_string(),
        collection: Collection::Sentinel2,
        acquired,
        cloud_cover: 5.0,
        polarisations: Vec::new(),
        instrument_mode: None,
        raster,
    }
}

/// VV/IW radar scene with backscatter rising from west to east
pub fn radar(id: &str, acquired: NaiveDate) -> Scene {
    let raster = Raster::new(grid(), vec![band("VV", |col, _| -18.0 + 1.0 * col as f32)]).unwrap();
    radar_scene(id, acquired, raster)
}

pub fn flat_radar(id: &str, acquired: NaiveDate, vv: f32) -> Scene {
    radar_scene(id, acquired, Raster::constant(grid(), &[("VV", vv)]))
}

fn radar_scene(id: &str, acquired: NaiveDate, raster: Raster) -> Scene {
    Scene {
        id: id.to_string(),
        collection: Collection::Sentinel1Grd,
        acquired,
        cloud_cover: 0.0,
        polarisations: vec!["VV".to_string(), "VH".to_string()],
        instrument_mode: Some("IW".to_string()),
        raster,
    }
}

pub fn engine(scenes: Vec<Scene>) -> Arc<LocalRasterEngine> {
    Arc::new(LocalRasterEngine::with_scenes(scenes).unwrap())
}

pub fn settings(export_dir: &Path) -> AnalysisSettings {
    AnalysisSettings {
        export_dir: export_dir.to_path_buf(),
        ..AnalysisSettings::default()
    }
}

/// Pipeline over `scenes` and `store`, pinned to `today()`
pub fn pipeline(
    scenes: Vec<Scene>,
    store: &MemoryMetadataStore,
    export_dir: &Path,
) -> AnalysisPipeline {
    AnalysisPipeline::new(engine(scenes), Arc::new(store.clone()), &settings(export_dir))
        .unwrap()
        .with_clock(Arc::new(FixedClock(today())))
}

/// Sorted names of every entry in `dir`
pub fn published_files(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
