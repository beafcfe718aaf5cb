//! Engine handles created during one pipeline run.
//!
//! This implementation uses `Mutex::unwrap()` intentionally. The handle list
//! is only pushed to, so poisoning means a panic in this module, which is an
//! unrecoverable state.

use async_trait::async_trait;
use fieldsense_core::error::Result;
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, EigenDecomposition, ImageId, Reducer,
    RegionStats, SceneFilter, SceneSet, TemporalWindow,
};
use fieldsense_raster::RasterEngine;
use std::path::Path;
use std::sync::Mutex;

/// Engine view that remembers every image and scene set it hands out, so
/// the run can release them with `finish`
pub struct RunScope<'a> {
    inner: &'a dyn RasterEngine,
    handles: Mutex<Vec<ImageId>>,
}

impl<'a> RunScope<'a> {
    pub fn new(inner: &'a dyn RasterEngine) -> Self {
        Self { inner, handles: Mutex::new(Vec::new()) }
    }

    pub fn handle_count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }

    fn track(&self, id: ImageId) {
        self.handles.lock().unwrap().push(id);
    }

    fn track_image(&self, image: Result<BandImage>) -> Result<BandImage> {
        if let Ok(image) = &image {
            self.track(image.id);
        }
        image
    }

    /// Release every tracked handle.
    ///
    /// Failures are logged and never change the outcome of the run.
    pub async fn finish(self) {
        let handles = self.handles.into_inner().unwrap();
        if handles.is_empty() {
            return;
        }
        match self.inner.release(&handles).await {
            Ok(()) => tracing::debug!(handles = handles.len(), "Released engine handles"),
            Err(e) => tracing::warn!(
                engine = self.inner.name(),
                handles = handles.len(),
                error = %e,
                "Failed to release engine handles"
            ),
        }
    }
}

#[async_trait]
impl<'a> RasterEngine for RunScope<'a> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn filter_scenes(
        &self,
        collection: Collection,
        area: &AreaOfInterest,
        window: &TemporalWindow,
        filter: &SceneFilter,
    ) -> Result<SceneSet> {
        let scenes = self.inner.filter_scenes(collection, area, window, filter).await?;
        self.track(scenes.id);
        Ok(scenes)
    }

    async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize> {
        self.inner.count_scenes(scenes).await
    }

    async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage> {
        self.track_image(self.inner.composite_median(scenes).await)
    }

    async fn band_math(
        &self,
        image: &BandImage,
        expression: &BandExpression,
        output_band: &str,
    ) -> Result<BandImage> {
        self.track_image(self.inner.band_math(image, expression, output_band).await)
    }

    async fn stack(&self, images: &[BandImage]) -> Result<BandImage> {
        self.track_image(self.inner.stack(images).await)
    }

    async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage> {
        self.track_image(self.inner.clip(image, area).await)
    }

    async fn clip_to_extent(
        &self,
        image: &BandImage,
        reference: &BandImage,
    ) -> Result<BandImage> {
        self.track_image(self.inner.clip_to_extent(image, reference).await)
    }

    async fn region_reduce(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        reducer: Reducer,
        scale_meters: f64,
    ) -> Result<RegionStats> {
        self.inner.region_reduce(image, area, reducer, scale_meters).await
    }

    async fn eigen_decompose(&self, matrix: &[Vec<f64>]) -> Result<EigenDecomposition> {
        self.inner.eigen_decompose(matrix).await
    }

    async fn export_raster(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        resolution_meters: f64,
        destination: &Path,
    ) -> Result<()> {
        self.inner.export_raster(image, area, resolution_meters, destination).await
    }

    async fn release(&self, handles: &[ImageId]) -> Result<()> {
        self.inner.release(handles).await
    }
}
