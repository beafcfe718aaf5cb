//! In-process raster engine for development and testing.
//!
//! Scenes live in memory as co-registered pixel grids. Intermediate images
//! and scene sets are kept until released.
//!
//! This implementation uses `RwLock::unwrap()` intentionally. Lock poisoning
//! only occurs when another thread panicked while holding the lock, which is
//! an unrecoverable state. For production workloads, use a remote engine.

mod export;
mod raster;

pub use raster::{GridSpec, Raster, RasterBand, Scene};

use async_trait::async_trait;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, EigenDecomposition, ImageId, Reducer,
    RegionStats, SceneFilter, SceneSet, TemporalWindow,
};
use nalgebra::{DMatrix, SymmetricEigen};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::ports::RasterEngine;
use crate::spatial::AreaMask;

/// In-memory implementation of RasterEngine
#[derive(Debug, Clone, Default)]
pub struct LocalRasterEngine {
    catalog: Arc<RwLock<Vec<Scene>>>,
    scene_sets: Arc<RwLock<HashMap<ImageId, Vec<usize>>>>,
    images: Arc<RwLock<HashMap<ImageId, Raster>>>,
}

impl LocalRasterEngine {
    /// Create an engine with an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine over the given scenes
    pub fn with_scenes(scenes: Vec<Scene>) -> Result<Self> {
        let engine = Self::new();
        for scene in scenes {
            engine.add_scene(scene)?;
        }
        Ok(engine)
    }

    /// Load a JSON array of scenes
    pub fn from_catalog_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let scenes: Vec<Scene> = serde_json::from_str(&content).map_err(|e| {
            FieldsenseError::Serialization(format!(
                "invalid scene catalog {}: {}",
                path.display(),
                e
            ))
        })?;

        tracing::info!(path = %path.display(), scenes = scenes.len(), "Loaded scene catalog");
        Self::with_scenes(scenes)
    }

    /// Add a scene to the catalog
    pub fn add_scene(&self, scene: Scene) -> Result<()> {
        scene.raster.validate()?;
        self.catalog.write().unwrap().push(scene);
        Ok(())
    }

    /// Number of intermediate images currently held
    pub fn image_count(&self) -> usize {
        self.images.read().unwrap().len()
    }

    /// Number of filtered scene sets currently held
    pub fn scene_set_count(&self) -> usize {
        self.scene_sets.read().unwrap().len()
    }

    fn image(&self, image: &BandImage) -> Result<Raster> {
        self.images
            .read()
            .unwrap()
            .get(&image.id)
            .cloned()
            .ok_or_else(|| FieldsenseError::engine(format!("unknown image {}", image.id)))
    }

    /// Register a raster and return its handle
    pub fn insert_raster(&self, raster: Raster) -> BandImage {
        let id = ImageId::new();
        let bands = raster.band_names();
        self.images.write().unwrap().insert(id, raster);
        BandImage::new(id, bands)
    }

    fn scene_indices(&self, scenes: &SceneSet) -> Result<Vec<usize>> {
        self.scene_sets
            .read()
            .unwrap()
            .get(&scenes.id)
            .cloned()
            .ok_or_else(|| FieldsenseError::engine(format!("unknown scene set {}", scenes.id)))
    }
}

fn scene_matches(
    scene: &Scene,
    collection: Collection,
    mask: &AreaMask,
    window: &TemporalWindow,
    filter: &SceneFilter,
) -> bool {
    if scene.collection != collection || !window.contains(scene.acquired) {
        return false;
    }
    if let Some(max) = filter.max_cloud_cover {
        if !(scene.cloud_cover < max) {
            return false;
        }
    }
    if let Some(channel) = &filter.polarisation {
        if !scene.polarisations.iter().any(|p| p == channel) {
            return false;
        }
    }
    if let Some(mode) = &filter.instrument_mode {
        if scene.instrument_mode.as_deref() != Some(mode.as_str()) {
            return false;
        }
    }
    mask.intersects_rect(&scene.raster.grid.bounding_box())
}

fn per_band(raster: &Raster, pixels: &[usize], reduce: impl Fn(&[f64]) -> f64) -> RegionStats {
    let mut values = BTreeMap::new();
    if !pixels.is_empty() {
        for band in &raster.bands {
            let samples: Vec<f64> = pixels.iter().map(|&i| f64::from(band.data[i])).collect();
            values.insert(band.name.clone(), reduce(&samples));
        }
    }
    RegionStats::PerBand { pixel_count: pixels.len() as u64, values }
}

/// Sample covariance of the bands over the given pixels
fn covariance(raster: &Raster, pixels: &[usize]) -> RegionStats {
    let n = pixels.len();
    let k = raster.bands.len();
    let mut matrix = vec![vec![0.0; k]; k];

    if n >= 2 {
        let means: Vec<f64> = raster
            .bands
            .iter()
            .map(|b| pixels.iter().map(|&i| f64::from(b.data[i])).sum::<f64>() / n as f64)
            .collect();

        for a in 0..k {
            for b in a..k {
                let sum: f64 = pixels
                    .iter()
                    .map(|&i| {
                        (f64::from(raster.bands[a].data[i]) - means[a])
                            * (f64::from(raster.bands[b].data[i]) - means[b])
                    })
                    .sum();
                let value = sum / (n - 1) as f64;
                matrix[a][b] = value;
                matrix[b][a] = value;
            }
        }
    }

    RegionStats::Covariance { pixel_count: n as u64, bands: raster.band_names(), matrix }
}

#[async_trait]
impl RasterEngine for LocalRasterEngine {
    fn name(&self) -> &str {
        "local"
    }

    async fn filter_scenes(
        &self,
        collection: Collection,
        area: &AreaOfInterest,
        window: &TemporalWindow,
        filter: &SceneFilter,
    ) -> Result<SceneSet> {
        let mask = AreaMask::new(area);
        let indices: Vec<usize> = self
            .catalog
            .read()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, scene)| scene_matches(scene, collection, &mask, window, filter))
            .map(|(i, _)| i)
            .collect();

        let id = ImageId::new();
        tracing::debug!(
            collection = collection.asset_id(),
            window = %window,
            scenes = indices.len(),
            "Filtered scenes"
        );
        self.scene_sets.write().unwrap().insert(id, indices);
        Ok(SceneSet { id, collection })
    }

    async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize> {
        Ok(self.scene_indices(scenes)?.len())
    }

    async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage> {
        let indices = self.scene_indices(scenes)?;
        let composite = {
            let catalog = self.catalog.read().unwrap();
            let rasters: Vec<&Raster> = indices.iter().map(|&i| &catalog[i].raster).collect();
            Raster::median_of(&rasters)?
        };
        Ok(self.insert_raster(composite))
    }

    async fn band_math(
        &self,
        image: &BandImage,
        expression: &BandExpression,
        output_band: &str,
    ) -> Result<BandImage> {
        let source = self.image(image)?;
        let result = source.evaluate(expression, output_band)?;
        Ok(self.insert_raster(result))
    }

    async fn stack(&self, images: &[BandImage]) -> Result<BandImage> {
        let mut rasters = images.iter().map(|i| self.image(i));
        let mut stacked = rasters
            .next()
            .ok_or_else(|| FieldsenseError::engine("cannot stack zero images"))??;

        for raster in rasters {
            let raster = raster?;
            stacked.ensure_same_grid(&raster)?;
            for band in raster.bands {
                if stacked.band(&band.name).is_some() {
                    return Err(FieldsenseError::engine(format!(
                        "duplicate band {} in stack",
                        band.name
                    )));
                }
                stacked.bands.push(band);
            }
        }

        Ok(self.insert_raster(stacked))
    }

    async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage> {
        let source = self.image(image)?;
        let mask = AreaMask::new(area);
        let clipped = source.masked(|i| {
            let (lon, lat) = source.grid.pixel_center(i);
            mask.contains(lon, lat)
        });
        Ok(self.insert_raster(clipped))
    }

    async fn clip_to_extent(
        &self,
        image: &BandImage,
        reference: &BandImage,
    ) -> Result<BandImage> {
        let source = self.image(image)?;
        let reference = self.image(reference)?;
        source.ensure_same_grid(&reference)?;

        let clipped = source.masked(|i| reference.bands.iter().any(|b| b.data[i].is_finite()));
        Ok(self.insert_raster(clipped))
    }

    async fn region_reduce(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        reducer: Reducer,
        scale_meters: f64,
    ) -> Result<RegionStats> {
        let raster = self.image(image)?;
        let mask = AreaMask::new(area);
        let pixels = raster.valid_pixels(&raster.grid.pixels_in(&mask));

        tracing::trace!(?reducer, scale_meters, pixels = pixels.len(), "Reducing region");

        let stats = match reducer {
            Reducer::Mean => {
                per_band(&raster, &pixels, |s| s.iter().sum::<f64>() / s.len() as f64)
            }
            Reducer::Min => per_band(&raster, &pixels, |s| s.iter().copied().fold(f64::INFINITY, f64::min)),
            Reducer::Max => {
                per_band(&raster, &pixels, |s| s.iter().copied().fold(f64::NEG_INFINITY, f64::max))
            }
            Reducer::Covariance => covariance(&raster, &pixels),
        };
        Ok(stats)
    }

    async fn eigen_decompose(&self, matrix: &[Vec<f64>]) -> Result<EigenDecomposition> {
        let n = matrix.len();
        if n == 0 || matrix.iter().any(|row| row.len() != n) {
            return Err(FieldsenseError::engine("eigen decomposition needs a square matrix"));
        }
        if matrix.iter().flatten().any(|v| !v.is_finite()) {
            return Err(FieldsenseError::degenerate(
                "eigen decomposition",
                "matrix contains non-finite entries",
            ));
        }

        let eigen = SymmetricEigen::new(DMatrix::from_fn(n, n, |r, c| matrix[r][c]));
        let values = eigen.eigenvalues.iter().copied().collect();
        let vectors = eigen
            .eigenvectors
            .column_iter()
            .map(|column| column.iter().copied().collect())
            .collect();

        Ok(EigenDecomposition { values, vectors })
    }

    async fn export_raster(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        resolution_meters: f64,
        destination: &Path,
    ) -> Result<()> {
        if !(resolution_meters > 0.0) {
            return Err(FieldsenseError::engine("export resolution must be positive"));
        }
        image.band_name()?;

        let raster = self.image(image)?;
        let mask = AreaMask::new(area);
        let grid = export::ExportGrid::covering(&mask, resolution_meters)?;
        let data = export::resample(&raster, &grid, &mask);

        export::write_geotiff(&grid, &data, destination)?;
        tracing::debug!(
            path = %destination.display(),
            width = grid.width,
            height = grid.height,
            "Exported raster"
        );
        Ok(())
    }

    async fn release(&self, handles: &[ImageId]) -> Result<()> {
        let mut images = self.images.write().unwrap();
        let mut scene_sets = self.scene_sets.write().unwrap();
        for id in handles {
            images.remove(id);
            scene_sets.remove(id);
        }
        Ok(())
    }
}
