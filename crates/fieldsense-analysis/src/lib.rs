//! FieldSense Analysis - Per-field agronomic indicators
//!
//! This crate turns an area of interest into three raster layers (soil
//! moisture, crop stress and a soil carbon proxy), exports them and records
//! them so later requests on the same day are served from cache.

pub mod cache;
pub mod clock;
pub mod composite;
pub mod export;
pub mod indices;
pub mod lock;
pub mod pipeline;
pub mod scope;
pub mod stress;
pub mod timeout;
pub mod window;

pub use cache::ResultCache;
pub use clock::{Clock, FixedClock, SystemClock};
pub use composite::{CarbonWeights, CompositeScorer};
pub use export::{ExportGuard, ExportLayout, PublishedExports};
pub use indices::{IndexComputer, IndexSet};
pub use pipeline::{AnalysisOutcome, AnalysisPipeline, ComputeSummary, Stage};
pub use scope::RunScope;
pub use stress::{principal_component, PrincipalComponent, StressLayer, StressScorer};
pub use timeout::TimedEngine;
pub use window::WindowSelector;
