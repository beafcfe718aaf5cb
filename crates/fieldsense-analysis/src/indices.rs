//! Vegetation and moisture indices.

use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, SceneFilter, TemporalWindow,
};
use fieldsense_raster::RasterEngine;

pub const NDVI: &str = "NDVI";
pub const NDRE: &str = "NDRE";
pub const CI: &str = "CI";
pub const SMI: &str = "SMI";

/// Backscatter range in dB mapped onto 0..1 moisture
pub const VV_DB_RANGE: (f64, f64) = (-25.0, 0.0);

/// The four single-band index images of one analysis, clipped to the area
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSet {
    pub ndvi: BandImage,
    pub ndre: BandImage,
    pub ci: BandImage,
    pub smi: BandImage,
}

impl IndexSet {
    /// The three optical indices in stacking order
    pub fn optical(&self) -> [BandImage; 3] {
        [self.ndvi.clone(), self.ndre.clone(), self.ci.clone()]
    }
}

/// Derives NDVI, NDRE and CI from Sentinel-2 and SMI from Sentinel-1
#[derive(Debug, Clone)]
pub struct IndexComputer {
    cloud_cover_threshold: f64,
}

impl IndexComputer {
    pub fn new(cloud_cover_threshold: f64) -> Self {
        Self { cloud_cover_threshold }
    }

    pub fn ndvi_expression() -> BandExpression {
        BandExpression::normalized_difference("B8", "B4")
    }

    pub fn ndre_expression() -> BandExpression {
        BandExpression::normalized_difference("B8", "B5")
    }

    pub fn ci_expression() -> BandExpression {
        BandExpression::band("B8").divide(BandExpression::band("B2"))
    }

    pub fn smi_expression() -> BandExpression {
        BandExpression::band("VV").unit_scale(VV_DB_RANGE.0, VV_DB_RANGE.1).clamp(0.0, 1.0)
    }

    /// Compute every index over `area` within `window`.
    ///
    /// The optical and radar branches share nothing and run concurrently.
    pub async fn compute(
        &self,
        engine: &dyn RasterEngine,
        area: &AreaOfInterest,
        window: &TemporalWindow,
    ) -> Result<IndexSet> {
        let ((ndvi, ndre, ci), smi) =
            tokio::try_join!(self.optical(engine, area, window), self.radar(engine, area, window))?;

        Ok(IndexSet { ndvi, ndre, ci, smi })
    }

    async fn optical(
        &self,
        engine: &dyn RasterEngine,
        area: &AreaOfInterest,
        window: &TemporalWindow,
    ) -> Result<(BandImage, BandImage, BandImage)> {
        let filter = SceneFilter::new().max_cloud_cover(self.cloud_cover_threshold);
        let scenes = engine.filter_scenes(Collection::Sentinel2, area, window, &filter).await?;
        let composite = engine.composite_median(&scenes).await?;
        let clipped = engine.clip(&composite, area).await?;

        let (ndvi_expr, ndre_expr, ci_expr) =
            (Self::ndvi_expression(), Self::ndre_expression(), Self::ci_expression());
        let (ndvi, ndre, ci) = tokio::try_join!(
            engine.band_math(&clipped, &ndvi_expr, NDVI),
            engine.band_math(&clipped, &ndre_expr, NDRE),
            engine.band_math(&clipped, &ci_expr, CI),
        )?;

        tracing::debug!(%window, "Computed optical indices");
        Ok((ndvi, ndre, ci))
    }

    async fn radar(
        &self,
        engine: &dyn RasterEngine,
        area: &AreaOfInterest,
        window: &TemporalWindow,
    ) -> Result<BandImage> {
        let filter = SceneFilter::new().polarisation("VV").instrument_mode("IW");
        let scenes = engine.filter_scenes(Collection::Sentinel1Grd, area, window, &filter).await?;

        // the window was chosen on optical coverage alone
        if engine.count_scenes(&scenes).await? == 0 {
            return Err(FieldsenseError::NoImageryAvailable {
                horizon_days: u32::try_from(window.days()).unwrap_or(u32::MAX),
            });
        }

        let composite = engine.composite_median(&scenes).await?;
        let smi = engine.band_math(&composite, &Self::smi_expression(), SMI).await?;
        let clipped = engine.clip(&smi, area).await?;

        tracing::debug!(%window, "Computed moisture index");
        Ok(clipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expressions_reference_expected_bands() {
        assert_eq!(IndexComputer::ndvi_expression().referenced_bands(), vec!["B4", "B8"]);
        assert_eq!(IndexComputer::ndre_expression().referenced_bands(), vec!["B5", "B8"]);
        assert_eq!(IndexComputer::ci_expression().referenced_bands(), vec!["B2", "B8"]);
        assert_eq!(IndexComputer::smi_expression().referenced_bands(), vec!["VV"]);
    }
}
