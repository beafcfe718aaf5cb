//! Stress and carbon layers over randomly generated fields.

mod common;

use common::*;
use fieldsense_analysis::{CompositeScorer, IndexComputer, StressScorer};
use fieldsense_core::error::FieldsenseError;
use fieldsense_core::models::{Collection, Reducer, TemporalWindow};
use fieldsense_raster::{Raster, RasterBand, RasterEngine, Scene};
use proptest::prelude::*;

fn random_optical(b2: Vec<f32>, b4: Vec<f32>, b5: Vec<f32>, b8: Vec<f32>) -> Scene {
    let bands = [("B2", b2), ("B4", b4), ("B5", b5), ("B8", b8)]
        .into_iter()
        .map(|(name, data)| RasterBand { name: name.to_string(), data })
        .collect();
    Scene {
        id: "s2-random".to_string(),
        collection: Collection::Sentinel2,
        acquired: days_ago(2),
        cloud_cover: 1.0,
        polarisations: Vec::new(),
        instrument_mode: None,
        raster: Raster::new(grid(), bands).unwrap(),
    }
}

fn reflectance(low: f32, high: f32) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(low..high, SIZE * SIZE)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_stress_is_bounded_and_spans_full_range(
        b2 in reflectance(0.02, 0.1),
        b4 in reflectance(0.01, 0.15),
        b5 in reflectance(0.05, 0.2),
        b8 in reflectance(0.2, 0.9),
    ) {
        let engine = engine(vec![random_optical(b2, b4, b5, b8), radar("s1", days_ago(2))]);
        let window = TemporalWindow::looking_back(today(), 14);

        let outcome: Result<(f64, f64, f64, f64), FieldsenseError> = runtime().block_on(async {
            let indices = IndexComputer::new(20.0).compute(engine.as_ref(), &area(), &window).await?;
            let layer = StressScorer::new(10.0).score(engine.as_ref(), &indices, &area()).await?;
            let carbon = CompositeScorer::default().score(engine.as_ref(), &indices).await?;

            let min = engine.region_reduce(&layer.image, &area(), Reducer::Min, 10.0).await?;
            let max = engine.region_reduce(&layer.image, &area(), Reducer::Max, 10.0).await?;
            let carbon_min = engine.region_reduce(&carbon, &area(), Reducer::Min, 10.0).await?;
            let carbon_max = engine.region_reduce(&carbon, &area(), Reducer::Max, 10.0).await?;
            Ok((
                min.band_value("stress").unwrap_or(f64::NAN),
                max.band_value("stress").unwrap_or(f64::NAN),
                carbon_min.band_value("carbon").unwrap_or(f64::NAN),
                carbon_max.band_value("carbon").unwrap_or(f64::NAN),
            ))
        });

        match outcome {
            Ok((min, max, carbon_min, carbon_max)) => {
                prop_assert_eq!(min, 0.0);
                prop_assert_eq!(max, 100.0);
                prop_assert!(carbon_min.is_finite() && carbon_max.is_finite());
                prop_assert!(carbon_min <= carbon_max);
            }
            // a random field can still collapse onto one value
            Err(FieldsenseError::DegenerateStatistics { .. }) => {}
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }
}
