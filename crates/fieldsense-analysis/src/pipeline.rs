//! End-to-end analysis of one field.
//!
//! ```text
//! START -> CACHE_CHECK -> CACHED_RETURN
//!                      -> WINDOW_SEARCH -> INDEX_COMPUTE -> STRESS_SCORE
//!                         -> COMPOSITE_SCORE -> EXPORT -> PERSIST -> RETURN
//! ```
//!
//! The first failing stage ends the run with its error. Nothing is recorded,
//! and exports of the run are withdrawn, including ones already published
//! when the store write fails.

use fieldsense_core::config::AnalysisSettings;
use fieldsense_core::error::Result;
use fieldsense_core::models::{
    AnalysisRequest, AnalysisResult, AreaOfInterest, BandImage, FieldId, OutputKind,
    TemporalWindow,
};
use fieldsense_raster::RasterEngine;
use fieldsense_store::MetadataStore;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ResultCache;
use crate::clock::{Clock, SystemClock};
use crate::composite::{CarbonWeights, CompositeScorer};
use crate::export::{ExportGuard, ExportLayout};
use crate::indices::IndexComputer;
use crate::lock::KeyedLocks;
use crate::scope::RunScope;
use crate::stress::{PrincipalComponent, StressScorer};
use crate::timeout::TimedEngine;
use crate::window::WindowSelector;

/// Pipeline stages, as they appear in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CacheCheck,
    WindowSearch,
    IndexCompute,
    StressScore,
    CompositeScore,
    Export,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::CacheCheck => "cache_check",
            Stage::WindowSearch => "window_search",
            Stage::IndexCompute => "index_compute",
            Stage::StressScore => "stress_score",
            Stage::CompositeScore => "composite_score",
            Stage::Export => "export",
            Stage::Persist => "persist",
        })
    }
}

/// Details of a run that computed fresh outputs
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeSummary {
    pub window: TemporalWindow,
    pub component: PrincipalComponent,
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Served from an earlier run on the same day
    pub cached: bool,
    /// Present when this run computed the outputs
    pub computed: Option<ComputeSummary>,
}

/// Orchestrates cache check, imagery search, scoring, export and persistence
pub struct AnalysisPipeline {
    engine: TimedEngine,
    cache: ResultCache,
    windows: WindowSelector,
    indices: IndexComputer,
    stress: StressScorer,
    composite: CompositeScorer,
    layout: ExportLayout,
    resolution_meters: f64,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks,
}

impl AnalysisPipeline {
    pub fn new(
        engine: Arc<dyn RasterEngine>,
        store: Arc<dyn MetadataStore>,
        settings: &AnalysisSettings,
    ) -> Result<Self> {
        Ok(Self {
            engine: TimedEngine::new(engine, settings.engine_timeout),
            cache: ResultCache::new(store),
            windows: WindowSelector::new(
                settings.window_days.iter().copied(),
                settings.cloud_cover_threshold,
            )?,
            indices: IndexComputer::new(settings.cloud_cover_threshold),
            stress: StressScorer::new(settings.resolution_meters),
            composite: CompositeScorer::new(CarbonWeights::default()),
            layout: ExportLayout::new(settings.export_dir.clone(), settings.url_prefix.clone()),
            resolution_meters: settings.resolution_meters,
            clock: Arc::new(SystemClock),
            locks: KeyedLocks::new(),
        })
    }

    /// Use `clock` for the analysis date
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the window candidates
    pub fn with_window_selector(mut self, windows: WindowSelector) -> Self {
        self.windows = windows;
        self
    }

    pub fn layout(&self) -> &ExportLayout {
        &self.layout
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run the pipeline for one request
    pub async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome> {
        let field_id = &request.field_id;
        let area = &request.area_of_interest;
        let today = self.clock.today();
        let started = Instant::now();

        tracing::info!(
            field_id = %field_id,
            date = %today,
            engine = self.engine.name(),
            "Starting analysis"
        );

        let _guard = self.locks.acquire(field_id, today).await;

        let cached = stage(field_id, Stage::CacheCheck, self.cache.lookup(field_id, today)).await?;
        if let Some(result) = cached {
            tracing::info!(field_id = %field_id, date = %today, "Returning cached analysis");
            return Ok(AnalysisOutcome { result, cached: true, computed: None });
        }

        let scope = RunScope::new(&self.engine);
        let computed = self.compute(&scope, field_id, area, today).await;
        scope.finish().await;
        let (result, summary) = computed?;

        tracing::info!(
            field_id = %field_id,
            date = %today,
            window = %summary.window,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );
        Ok(AnalysisOutcome { result, cached: false, computed: Some(summary) })
    }

    async fn compute(
        &self,
        engine: &RunScope<'_>,
        field_id: &FieldId,
        area: &AreaOfInterest,
        today: chrono::NaiveDate,
    ) -> Result<(AnalysisResult, ComputeSummary)> {
        let window =
            stage(field_id, Stage::WindowSearch, self.windows.select(engine, area, today)).await?;
        let indices =
            stage(field_id, Stage::IndexCompute, self.indices.compute(engine, area, &window))
                .await?;
        let stress =
            stage(field_id, Stage::StressScore, self.stress.score(engine, &indices, area)).await?;
        let carbon =
            stage(field_id, Stage::CompositeScore, self.composite.score(engine, &indices)).await?;

        let layers = [
            (OutputKind::Moisture, &indices.smi),
            (OutputKind::Stress, &stress.image),
            (OutputKind::Carbon, &carbon),
        ];
        let guard =
            stage(field_id, Stage::Export, self.export(engine, field_id, area, today, &layers))
                .await?;

        let result = stage(field_id, Stage::Persist, async {
            let published = guard.publish()?;
            let result = self.cache.store(field_id, today, published.outputs()).await?;
            published.commit();
            Ok(result)
        })
        .await?;

        Ok((result, ComputeSummary { window, component: stress.component }))
    }

    async fn export(
        &self,
        engine: &dyn RasterEngine,
        field_id: &FieldId,
        area: &AreaOfInterest,
        today: chrono::NaiveDate,
        layers: &[(OutputKind, &BandImage)],
    ) -> Result<ExportGuard> {
        self.layout.prepare().await?;

        let mut guard = self.layout.stage(field_id, today);
        for (kind, image) in layers {
            let path = guard.staging_path(*kind);
            engine.export_raster(image, area, self.resolution_meters, &path).await?;
            tracing::debug!(field_id = %field_id, %kind, path = %path.display(), "Staged export");
        }
        Ok(guard)
    }
}

/// Run one stage, logging its start and its failure
async fn stage<T>(
    field_id: &FieldId,
    stage: Stage,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tracing::debug!(field_id = %field_id, %stage, "Entering stage");
    let started = Instant::now();

    match work.await {
        Ok(value) => {
            tracing::debug!(
                field_id = %field_id,
                %stage,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stage finished"
            );
            Ok(value)
        }
        Err(e) => {
            tracing::error!(
                field_id = %field_id,
                %stage,
                category = ?e.category(),
                error = %e,
                "Analysis failed"
            );
            Err(e)
        }
    }
}
