//! Soil organic carbon proxy.

use fieldsense_core::error::Result;
use fieldsense_core::models::{BandExpression, BandImage};
use fieldsense_raster::RasterEngine;
use serde::{Deserialize, Serialize};

use crate::indices::{IndexSet, CI, NDRE, NDVI, SMI};

pub const CARBON: &str = "carbon";

/// Weights of the carbon blend.
///
/// These are a fixed heuristic, not a calibrated soil model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonWeights {
    pub ndvi: f64,
    pub ndre: f64,
    pub ci: f64,
    pub smi: f64,
}

impl Default for CarbonWeights {
    fn default() -> Self {
        Self { ndvi: 0.4, ndre: 0.3, ci: 0.2, smi: 0.1 }
    }
}

impl CarbonWeights {
    pub fn sum(&self) -> f64 {
        self.ndvi + self.ndre + self.ci + self.smi
    }

    /// `ndvi·NDVI + ndre·NDRE + ci·CI + smi·SMI`, summed left to right
    pub fn expression(&self) -> BandExpression {
        let term = |band: &str, weight: f64| {
            BandExpression::band(band).multiply(BandExpression::constant(weight))
        };
        term(NDVI, self.ndvi)
            .add(term(NDRE, self.ndre))
            .add(term(CI, self.ci))
            .add(term(SMI, self.smi))
    }
}

/// Blends the four indices into the carbon layer
#[derive(Debug, Clone, Default)]
pub struct CompositeScorer {
    weights: CarbonWeights,
}

impl CompositeScorer {
    pub fn new(weights: CarbonWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> CarbonWeights {
        self.weights
    }

    /// Carbon layer restricted to where NDVI has data
    pub async fn score(&self, engine: &dyn RasterEngine, indices: &IndexSet) -> Result<BandImage> {
        let stacked = engine
            .stack(&[
                indices.ndvi.clone(),
                indices.ndre.clone(),
                indices.ci.clone(),
                indices.smi.clone(),
            ])
            .await?;
        let carbon = engine.band_math(&stacked, &self.weights.expression(), CARBON).await?;
        engine.clip_to_extent(&carbon, &indices.ndvi).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let weights = CarbonWeights::default();
        assert_eq!((weights.ndvi, weights.ndre, weights.ci, weights.smi), (0.4, 0.3, 0.2, 0.1));
        assert!((weights.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_expression_reads_all_indices() {
        let bands = CarbonWeights::default().expression();
        assert_eq!(bands.referenced_bands(), vec![CI, NDRE, NDVI, SMI]);
    }
}
