//! Crop stress from the first principal component of the optical indices.
//!
//! NDVI, NDRE and CI are stacked, centred on their area means and reduced to
//! a 3x3 covariance matrix. The indices are projected onto the leading
//! eigenvector and the projection is rescaled so the area minimum maps to 0
//! and the maximum to 100.

use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, EigenDecomposition, Reducer, RegionStats,
};
use fieldsense_raster::RasterEngine;

use crate::indices::{IndexSet, CI, NDRE, NDVI};

const STAGE: &str = "stress scoring";

/// Band order of the stacked optical indices
pub const STACK_ORDER: [&str; 3] = [NDVI, NDRE, CI];

pub const PC1: &str = "PC1";
pub const STRESS: &str = "stress";

/// Smallest leading eigenvalue treated as real variance
pub const EIGENVALUE_EPSILON: f64 = 1e-12;

/// Smallest PC1 spread that can be rescaled
pub const RANGE_EPSILON: f64 = 1e-9;

/// Leading eigenpair of the index covariance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipalComponent {
    pub eigenvalue: f64,
    /// Loadings on NDVI, NDRE and CI; the largest-magnitude loading is positive
    pub loadings: [f64; 3],
    /// Share of the total variance carried by this component
    pub explained_variance: f64,
}

/// Select the principal component from an unordered decomposition.
///
/// Eigenpairs are sorted by eigenvalue, largest first, before the leading one
/// is taken.
pub fn principal_component(decomposition: &EigenDecomposition) -> Result<PrincipalComponent> {
    let EigenDecomposition { values, vectors } = decomposition;
    if values.len() != STACK_ORDER.len()
        || vectors.len() != values.len()
        || vectors.iter().any(|v| v.len() != STACK_ORDER.len())
    {
        return Err(FieldsenseError::degenerate(
            STAGE,
            format!("expected 3 eigenpairs, got {} values and {} vectors", values.len(), vectors.len()),
        ));
    }
    if values.iter().chain(vectors.iter().flatten()).any(|v| !v.is_finite()) {
        return Err(FieldsenseError::degenerate(STAGE, "eigen decomposition is not finite"));
    }

    let mut pairs: Vec<(f64, &Vec<f64>)> = values.iter().copied().zip(vectors.iter()).collect();
    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));
    let (eigenvalue, vector) = pairs[0];

    if eigenvalue <= EIGENVALUE_EPSILON {
        return Err(FieldsenseError::degenerate(
            STAGE,
            format!("indices have no spatial variance (leading eigenvalue {:e})", eigenvalue),
        ));
    }

    let mut loadings = [vector[0], vector[1], vector[2]];
    let dominant = loadings
        .iter()
        .copied()
        .fold(0.0_f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
    if dominant < 0.0 {
        loadings.iter_mut().for_each(|w| *w = -*w);
    }

    let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
    Ok(PrincipalComponent { eigenvalue, loadings, explained_variance: eigenvalue / total })
}

/// Scored stress layer with the statistics that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct StressLayer {
    pub image: BandImage,
    pub component: PrincipalComponent,
    pub pc1_min: f64,
    pub pc1_max: f64,
}

/// Runs the PCA stress algorithm on a raster engine
#[derive(Debug, Clone)]
pub struct StressScorer {
    scale_meters: f64,
}

impl StressScorer {
    /// `scale_meters` is the pixel size region reductions are computed at
    pub fn new(scale_meters: f64) -> Self {
        Self { scale_meters }
    }

    pub async fn score(
        &self,
        engine: &dyn RasterEngine,
        indices: &IndexSet,
        area: &AreaOfInterest,
    ) -> Result<StressLayer> {
        let optical = indices.optical();
        let stacked = engine.stack(&optical).await?;

        let means = engine.region_reduce(&stacked, area, Reducer::Mean, self.scale_meters).await?;
        if means.pixel_count() == 0 {
            return Err(FieldsenseError::degenerate(STAGE, "no valid pixels inside the area"));
        }

        let mut centred = Vec::with_capacity(optical.len());
        for (image, band) in optical.iter().zip(STACK_ORDER) {
            let mean = finite(means.band_value(band), &format!("mean of {}", band))?;
            let expression = BandExpression::band(band).subtract(BandExpression::constant(mean));
            centred.push(engine.band_math(image, &expression, band).await?);
        }
        let centred = engine.stack(&centred).await?;

        let covariance =
            engine.region_reduce(&centred, area, Reducer::Covariance, self.scale_meters).await?;
        let matrix = covariance_matrix(covariance)?;

        let decomposition = engine.eigen_decompose(&matrix).await?;
        let component = principal_component(&decomposition)?;
        tracing::debug!(
            eigenvalue = component.eigenvalue,
            explained_variance = component.explained_variance,
            loadings = ?component.loadings,
            "Selected principal component"
        );

        let [w0, w1, w2] = component.loadings;
        let projection = BandExpression::band(NDVI)
            .multiply(BandExpression::constant(w0))
            .add(BandExpression::band(NDRE).multiply(BandExpression::constant(w1)))
            .add(BandExpression::band(CI).multiply(BandExpression::constant(w2)));
        let pc1 = engine.band_math(&stacked, &projection, PC1).await?;

        let (low, high) = tokio::try_join!(
            engine.region_reduce(&pc1, area, Reducer::Min, self.scale_meters),
            engine.region_reduce(&pc1, area, Reducer::Max, self.scale_meters),
        )?;
        let pc1_min = finite(low.band_value(PC1), "minimum of PC1")?;
        let pc1_max = finite(high.band_value(PC1), "maximum of PC1")?;

        let spread = pc1_max - pc1_min;
        if !(spread > RANGE_EPSILON) {
            return Err(FieldsenseError::degenerate(
                STAGE,
                format!("PC1 is flat over the area (min {}, max {})", pc1_min, pc1_max),
            ));
        }

        let rescale = BandExpression::band(PC1)
            .subtract(BandExpression::constant(pc1_min))
            .divide(BandExpression::constant(spread))
            .multiply(BandExpression::constant(100.0))
            .clamp(0.0, 100.0);
        let stress = engine.band_math(&pc1, &rescale, STRESS).await?;
        let image = engine.clip(&stress, area).await?;

        Ok(StressLayer { image, component, pc1_min, pc1_max })
    }
}

fn finite(value: Option<f64>, what: &str) -> Result<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(v) => Err(FieldsenseError::degenerate(STAGE, format!("{} is {}", what, v))),
        None => Err(FieldsenseError::degenerate(STAGE, format!("{} is undefined", what))),
    }
}

fn covariance_matrix(stats: RegionStats) -> Result<Vec<Vec<f64>>> {
    match stats {
        RegionStats::Covariance { pixel_count, bands, matrix } => {
            if bands != STACK_ORDER {
                return Err(FieldsenseError::engine(format!(
                    "covariance bands {:?} do not match stack order {:?}",
                    bands, STACK_ORDER
                )));
            }
            if pixel_count < 2 {
                return Err(FieldsenseError::degenerate(
                    STAGE,
                    format!("covariance needs at least 2 pixels, found {}", pixel_count),
                ));
            }
            if matrix.iter().flatten().any(|v| !v.is_finite()) {
                return Err(FieldsenseError::degenerate(STAGE, "covariance is not finite"));
            }
            Ok(matrix)
        }
        RegionStats::PerBand { .. } => {
            Err(FieldsenseError::engine("engine returned per-band statistics for covariance"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decomposition(values: [f64; 3], vectors: [[f64; 3]; 3]) -> EigenDecomposition {
        EigenDecomposition { values: values.to_vec(), vectors: vectors.iter().map(|v| v.to_vec()).collect() }
    }

    #[test]
    fn test_selects_largest_regardless_of_order() {
        let d = decomposition(
            [0.5, 3.0, 1.0],
            [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        );
        let pc = principal_component(&d).unwrap();
        assert_eq!(pc.eigenvalue, 3.0);
        assert_eq!(pc.loadings, [0.0, 1.0, 0.0]);
        assert!((pc.explained_variance - 3.0 / 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_sign_is_normalised() {
        let d = decomposition(
            [2.0, 1.0, 0.1],
            [[-0.8, 0.6, 0.0], [0.6, 0.8, 0.0], [0.0, 0.0, 1.0]],
        );
        let pc = principal_component(&d).unwrap();
        assert_eq!(pc.loadings, [0.8, -0.6, 0.0]);
    }

    #[test]
    fn test_zero_variance_is_degenerate() {
        let d = decomposition([0.0; 3], [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        let err = principal_component(&d).unwrap_err();
        assert!(matches!(err, FieldsenseError::DegenerateStatistics { .. }));
    }

    #[test]
    fn test_malformed_decomposition_is_degenerate() {
        let d = EigenDecomposition { values: vec![1.0, 2.0], vectors: vec![vec![1.0, 0.0]; 2] };
        assert!(principal_component(&d).is_err());

        let d = decomposition([f64::NAN, 1.0, 0.5], [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert!(principal_component(&d).is_err());
    }

    #[test]
    fn test_covariance_matrix_checks() {
        let bands: Vec<String> = STACK_ORDER.iter().map(|b| b.to_string()).collect();
        let ok = RegionStats::Covariance {
            pixel_count: 10,
            bands: bands.clone(),
            matrix: vec![vec![1.0; 3]; 3],
        };
        assert!(covariance_matrix(ok).is_ok());

        let single = RegionStats::Covariance { pixel_count: 1, bands, matrix: vec![vec![0.0; 3]; 3] };
        assert!(matches!(
            covariance_matrix(single),
            Err(FieldsenseError::DegenerateStatistics { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_leading_eigenvalue_is_maximum(
            values in prop::array::uniform3(0.001f64..1000.0),
            rotation in 0usize..3,
        ) {
            let mut shuffled = values;
            shuffled.rotate_left(rotation);
            let d = decomposition(shuffled, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

            let pc = principal_component(&d).unwrap();
            let max = values.iter().copied().fold(f64::MIN, f64::max);
            prop_assert_eq!(pc.eigenvalue, max);
            prop_assert!(pc.explained_variance > 0.0 && pc.explained_variance <= 1.0);

            let position = shuffled.iter().position(|v| *v == max).unwrap();
            prop_assert_eq!(pc.loadings[position], 1.0);
        }

        #[test]
        fn prop_dominant_loading_is_positive(v in prop::array::uniform3(-1.0f64..1.0)) {
            prop_assume!(v.iter().any(|x| x.abs() > 1e-6));
            let d = decomposition([5.0, 1.0, 0.5], [v, [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
            let pc = principal_component(&d).unwrap();
            let dominant = pc.loadings.iter().copied().fold(0.0f64, |a, x| if x.abs() > a.abs() { x } else { a });
            prop_assert!(dominant > 0.0);
        }
    }
}
