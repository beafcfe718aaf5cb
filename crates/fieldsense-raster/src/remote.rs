//! HTTP client for a remote raster engine.
//!
//! Every operation is a `POST {base_url}/v1/{operation}` with a JSON body.
//! Exports answer with the GeoTIFF bytes; everything else answers JSON.

use async_trait::async_trait;
use fieldsense_core::error::{FieldsenseError, Result};
use fieldsense_core::models::{
    AreaOfInterest, BandExpression, BandImage, Collection, EigenDecomposition, ImageId,
    Reducer, RegionStats, SceneFilter, SceneSet, TemporalWindow,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ports::RasterEngine;

/// Remote implementation of RasterEngine
pub struct HttpRasterEngine {
    /// Base URL of the engine (e.g., "http://localhost:8600")
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpRasterEngine {
    /// Create a client whose requests give up after `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FieldsenseError::engine(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url: base_url.into().trim_end_matches('/').to_string(), client })
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}/v1/{}", self.base_url, operation)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.endpoint(operation))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                FieldsenseError::engine(format!(
                    "Failed to reach raster engine at {}: {}",
                    self.base_url, e
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(engine_error(operation, status.as_u16(), error_text));
        }
        Ok(response)
    }

    async fn call<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        operation: &str,
        body: &B,
    ) -> Result<R> {
        self.send(operation, body).await?.json().await.map_err(|e| {
            FieldsenseError::engine(format!("Failed to parse {} response: {}", operation, e))
        })
    }
}

/// Map a failed engine response to an error.
///
/// The engine answers 422 when the statistics it was asked for are undefined.
fn engine_error(operation: &str, status: u16, body: String) -> FieldsenseError {
    if status == 422 {
        FieldsenseError::degenerate(operation, body)
    } else {
        FieldsenseError::engine(format!("{} failed ({}): {}", operation, status, body))
    }
}

#[derive(Debug, Serialize)]
struct FilterRequest<'a> {
    collection: &'a str,
    area: &'a AreaOfInterest,
    start_date: chrono::NaiveDate,
    end_date: chrono::NaiveDate,
    filter: &'a SceneFilter,
}

#[derive(Debug, Deserialize)]
struct HandleResponse {
    id: ImageId,
}

#[derive(Debug, Serialize)]
struct ReleaseRequest<'a> {
    handles: &'a [ImageId],
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
struct BandMathRequest<'a> {
    image: &'a BandImage,
    expression: &'a BandExpression,
    output_band: &'a str,
}

#[derive(Debug, Serialize)]
struct ClipRequest<'a> {
    image: &'a BandImage,
    area: &'a AreaOfInterest,
}

#[derive(Debug, Serialize)]
struct ClipToExtentRequest<'a> {
    image: &'a BandImage,
    reference: &'a BandImage,
}

#[derive(Debug, Serialize)]
struct ReduceRequest<'a> {
    image: &'a BandImage,
    area: &'a AreaOfInterest,
    reducer: Reducer,
    scale_meters: f64,
}

#[derive(Debug, Serialize)]
struct ExportRequest<'a> {
    image: &'a BandImage,
    area: &'a AreaOfInterest,
    resolution_meters: f64,
    format: &'a str,
}

#[async_trait]
impl RasterEngine for HttpRasterEngine {
    fn name(&self) -> &str {
        "http"
    }

    async fn filter_scenes(
        &self,
        collection: Collection,
        area: &AreaOfInterest,
        window: &TemporalWindow,
        filter: &SceneFilter,
    ) -> Result<SceneSet> {
        let request = FilterRequest {
            collection: collection.asset_id(),
            area,
            start_date: window.start_date(),
            end_date: window.end_date(),
            filter,
        };
        let handle: HandleResponse = self.call("filter", &request).await?;
        Ok(SceneSet { id: handle.id, collection })
    }

    async fn count_scenes(&self, scenes: &SceneSet) -> Result<usize> {
        let response: CountResponse = self.call("count", scenes).await?;
        Ok(response.count)
    }

    async fn composite_median(&self, scenes: &SceneSet) -> Result<BandImage> {
        self.call("median", scenes).await
    }

    async fn band_math(
        &self,
        image: &BandImage,
        expression: &BandExpression,
        output_band: &str,
    ) -> Result<BandImage> {
        self.call("band_math", &BandMathRequest { image, expression, output_band }).await
    }

    async fn stack(&self, images: &[BandImage]) -> Result<BandImage> {
        self.call("stack", images).await
    }

    async fn clip(&self, image: &BandImage, area: &AreaOfInterest) -> Result<BandImage> {
        self.call("clip", &ClipRequest { image, area }).await
    }

    async fn clip_to_extent(
        &self,
        image: &BandImage,
        reference: &BandImage,
    ) -> Result<BandImage> {
        self.call("clip_to_extent", &ClipToExtentRequest { image, reference }).await
    }

    async fn region_reduce(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        reducer: Reducer,
        scale_meters: f64,
    ) -> Result<RegionStats> {
        self.call("reduce", &ReduceRequest { image, area, reducer, scale_meters }).await
    }

    async fn eigen_decompose(&self, matrix: &[Vec<f64>]) -> Result<EigenDecomposition> {
        self.call("eigen", matrix).await
    }

    async fn export_raster(
        &self,
        image: &BandImage,
        area: &AreaOfInterest,
        resolution_meters: f64,
        destination: &Path,
    ) -> Result<()> {
        let request = ExportRequest { image, area, resolution_meters, format: "GeoTIFF" };
        let bytes = self.send("export", &request).await?.bytes().await.map_err(|e| {
            FieldsenseError::engine(format!("Failed to download export: {}", e))
        })?;

        let partial = destination.with_extension("tif.partial");
        let write = async {
            tokio::fs::write(&partial, &bytes).await?;
            tokio::fs::rename(&partial, destination).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(FieldsenseError::ExportFailure {
                output: destination
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: destination.to_path_buf(),
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    async fn release(&self, handles: &[ImageId]) -> Result<()> {
        if handles.is_empty() {
            return Ok(());
        }
        self.send("release", &ReleaseRequest { handles }).await?;
        Ok(())
    }
}
