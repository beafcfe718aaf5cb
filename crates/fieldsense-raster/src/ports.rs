//! Raster engine port definition

use async_trait::async_trait;
use fieldsense_core::error::Result;
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, EigenDecomposition, ImageId,
    Reducer, RegionStats, SceneFilter, SceneSet, TemporalWindow,
};
use std::path::Path;

/// Port for an engine that evaluates band algebra and region statistics on
/// imagery it holds.
///
/// Every method may block on the network for a long time; callers bound
/// them with a timeout.
#[async_trait]
pub trait RasterEngine: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Select scenes of a collection intersecting `area` inside `window`
    async fn filter_scenes(
        &self,
        collection: Collection,
        area: &AreaOfInterest,
        window: &TemporalWindow,
        filter: &SceneFilter,
    ) -> Result<SceneSet>;

    /// Number of scenes in a filtered set
    async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize>;

    /// Per-pixel median across the scenes of a set
    async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage>;

    /// Evaluate `expression` against the bands of `image` into a single band
    /// named `output_band`
    async fn band_math(
        &self,
        image: &BandImage,
        expression: &BandExpression,
        output_band: &str,
    ) -> Result<BandImage>;

    /// Concatenate the bands of several images, in order
    async fn stack(&self, images: &[BandImage]) -> Result<BandImage>;

    /// Mask every pixel outside `area`
    async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage>;

    /// Mask every pixel where `reference` has no data
    async fn clip_to_extent(&self, image: &BandImage, reference: &BandImage)
        -> Result<BandImage>;

    /// Aggregate the pixels of `image` inside `area`
    async fn region_reduce(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        reducer: Reducer,
        scale_meters: f64,
    ) -> Result<RegionStats>;

    /// Eigen-decompose a symmetric matrix given as rows
    async fn eigen_decompose(&self, matrix: &[Vec<f64>]) -> Result<EigenDecomposition>;

    /// Render a single-band image over `area` to `destination`
    async fn export_raster(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        resolution_meters: f64,
        destination: &Path,
    ) -> Result<()>;

    /// Forget images and scene sets the caller no longer needs. Unknown
    /// handles are ignored.
    async fn release(&self, handles: &[ImageId]) -> Result<()>;
}
