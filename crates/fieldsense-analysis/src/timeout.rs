//! Per-call deadline around a raster engine.

use async_trait::async_trait;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, EigenDecomposition, ImageId,
    Reducer, RegionStats, SceneFilter, SceneSet, TemporalWindow,
};
use fieldsense_raster::RasterEngine;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Wraps an engine so every call fails with `EngineUnavailable` once it
/// exceeds the deadline
pub struct TimedEngine {
    inner: Arc<dyn RasterEngine>,
    timeout: Duration,
}

impl TimedEngine {
    pub fn new(inner: Arc<dyn RasterEngine>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    engine = self.inner.name(),
                    operation,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Raster engine call timed out"
                );
                Err(FieldsenseError::engine(format!(
                    "{} did not finish within {:?}",
                    operation, self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl RasterEngine for TimedEngine {
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
        self.bounded("filter_scenes", self.inner.filter_scenes(collection, area, window, filter))
            .await
    }

    async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize> {
        self.bounded("count_scenes", self.inner.count_scenes(scenes)).await
    }

    async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage> {
        self.bounded("composite_median", self.inner.composite_median(scenes)).await
    }

    async fn band_math(
        &self,
        image: &BandImage,
        expression: &BandExpression,
        output_band: &str,
    ) -> Result<BandImage> {
        self.bounded("band_math", self.inner.band_math(image, expression, output_band)).await
    }

    async fn stack(&self, images: &[BandImage]) -> Result<BandImage> {
        self.bounded("stack", self.inner.stack(images)).await
    }

    async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage> {
        self.bounded("clip", self.inner.clip(image, area)).await
    }

    async fn clip_to_extent(
        &self,
        image: &BandImage,
        reference: &BandImage,
    ) -> Result<BandImage> {
        self.bounded("clip_to_extent", self.inner.clip_to_extent(image, reference)).await
    }

    async fn region_reduce(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        reducer: Reducer,
        scale_meters: f64,
    ) -> Result<RegionStats> {
        self.bounded(
            "region_reduce",
            self.inner.region_reduce(image, area, reducer, scale_meters),
        )
        .await
    }

    async fn eigen_decompose(&self, matrix: &[Vec<f64>]) -> Result<EigenDecomposition> {
        self.bounded("eigen_decompose", self.inner.eigen_decompose(matrix)).await
    }

    async fn export_raster(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        resolution_meters: f64,
        destination: &Path,
    ) -> Result<()> {
        self.bounded(
            "export_raster",
            self.inner.export_raster(image, area, resolution_meters, destination),
        )
        .await
    }

    async fn release(&self, handles: &[ImageId]) -> Result<()> {
        self.bounded("release", self.inner.release(handles)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsense_raster::LocalRasterEngine;

    /// Engine whose eigen decomposition never returns
    struct StalledEngine(LocalRasterEngine);

    #[async_trait]
    impl RasterEngine for StalledEngine {
        fn name(&self) -> &str {
            "stalled"
        }

        async fn filter_scenes(
            &self,
            collection: Collection,
            area: &AreaOfInterest,
            window: &TemporalWindow,
            filter: &SceneFilter,
        ) -> Result<SceneSet> {
            self.0.filter_scenes(collection, area, window, filter).await
        }

        async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize> {
            self.0.count_scenes(scenes).await
        }

        async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage> {
            self.0.composite_median(scenes).await
        }

        async fn band_math(
            &self,
            image: &BandImage,
            expression: &BandExpression,
            output_band: &str,
        ) -> Result<BandImage> {
            self.0.band_math(image, expression, output_band).await
        }

        async fn stack(&self, images: &[BandImage]) -> Result<BandImage> {
            self.0.stack(images).await
        }

        async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage> {
            self.0.clip(image, area).await
        }

        async fn clip_to_extent(
            &self,
            image: &BandImage,
            reference: &BandImage,
        ) -> Result<BandImage> {
            self.0.clip_to_extent(image, reference).await
        }

        async fn region_reduce(
            &self,
            image: &BandImage,
            area: &AreaOfInterest,
            reducer: Reducer,
            scale_meters: f64,
        ) -> Result<RegionStats> {
            self.0.region_reduce(image, area, reducer, scale_meters).await
        }

        async fn eigen_decompose(&self, _matrix: &[Vec<f64>]) -> Result<EigenDecomposition> {
            std::future::pending().await
        }

        async fn export_raster(
            &self,
            image: &BandImage,
            area: &AreaOfInterest,
            resolution_meters: f64,
            destination: &Path,
        ) -> Result<()> {
            self.0.export_raster(image, area, resolution_meters, destination).await
        }

        async fn release(&self, handles: &[ImageId]) -> Result<()> {
            self.0.release(handles).await
        }
    }

    #[tokio::test]
    async fn test_stalled_call_becomes_engine_unavailable() {
        let engine = TimedEngine::new(
            Arc::new(StalledEngine(LocalRasterEngine::new())),
            Duration::from_millis(20),
        );

        let err = engine.eigen_decompose(&[vec![1.0]]).await.unwrap_err();
        assert!(matches!(err, FieldsenseError::EngineUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_fast_calls_pass_through() {
        let engine =
            TimedEngine::new(Arc::new(LocalRasterEngine::new()), Duration::from_secs(5));
        let decomposition = engine.eigen_decompose(&[vec![3.0]]).await.unwrap();
        assert_eq!(decomposition.values, vec![3.0]);
        assert_eq!(engine.name(), "local");
    }
}
