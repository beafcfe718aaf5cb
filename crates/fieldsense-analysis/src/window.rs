//! Temporal window search.

use chrono::NaiveDate;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{AreaOfInterest, Collection, SceneFilter, TemporalWindow};
use fieldsense_raster::RasterEngine;

/// Picks the shortest look-back window that contains usable optical imagery.
///
/// Candidates are tried shortest first; the longest candidate is the search
/// horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSelector {
    candidates: Vec<u32>,
    cloud_cover_threshold: f64,
}

impl WindowSelector {
    /// Build a selector over look-back lengths in days, sorted and
    /// deduplicated
    pub fn new(candidates: impl IntoIterator<Item = u32>, cloud_cover_threshold: f64) -> Result<Self> {
        let mut candidates: Vec<u32> = candidates.into_iter().collect();
        candidates.sort_unstable();
        candidates.dedup();

        if candidates.is_empty() {
            return Err(FieldsenseError::ConfigInvalid {
                key: "window_days".to_string(),
                reason: "at least one look-back window is required".to_string(),
            });
        }
        if candidates[0] == 0 {
            return Err(FieldsenseError::ConfigInvalid {
                key: "window_days".to_string(),
                reason: "look-back windows must be at least one day".to_string(),
            });
        }

        Ok(Self { candidates, cloud_cover_threshold })
    }

    pub fn candidates(&self) -> &[u32] {
        &self.candidates
    }

    /// Longest window searched before giving up
    pub fn horizon_days(&self) -> u32 {
        self.candidates.last().copied().unwrap_or_default()
    }

    /// Scene filter applied to the optical collection
    pub fn optical_filter(&self) -> SceneFilter {
        SceneFilter::new().max_cloud_cover(self.cloud_cover_threshold)
    }

    /// Return the first candidate window ending `today` with at least one
    /// scene over `area`
    pub async fn select(
        &self,
        engine: &dyn RasterEngine,
        area: &AreaOfInterest,
        today: NaiveDate,
    ) -> Result<TemporalWindow> {
        let filter = self.optical_filter();

        for &days in &self.candidates {
            let window = TemporalWindow::looking_back(today, days);
            let scenes = engine.filter_scenes(Collection::Sentinel2, area, &window, &filter).await?;
            let count = engine.count_scenes(&scenes).await?;

            tracing::debug!(days, %window, scenes = count, "Checked imagery window");
            if count > 0 {
                return Ok(window);
            }
        }

        Err(FieldsenseError::NoImageryAvailable { horizon_days: self.horizon_days() })
    }
}
