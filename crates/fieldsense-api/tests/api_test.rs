//! HTTP surface tests over the in-process engine and store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use fieldsense_analysis::{AnalysisPipeline, FixedClock};
use fieldsense_api::{create_router, AppState};
use fieldsense_core::config::AnalysisSettings;
use fieldsense_core::models::Collection;
use fieldsense_raster::{GridSpec, LocalRasterEngine, Raster, RasterBand, Scene};
use fieldsense_store::MemoryMetadataStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const SIZE: usize = 8;
const PIXEL: f64 = 0.0001;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 8).unwrap()
}

fn grid() -> GridSpec {
    GridSpec {
        min_lon: 36.8,
        max_lat: -1.3 + PIXEL * SIZE as f64,
        pixel_size: PIXEL,
        width: SIZE,
        height: SIZE,
    }
}

fn area() -> Value {
    let (w, s) = (36.8, -1.3);
    let (e, n) = (w + PIXEL * SIZE as f64, s + PIXEL * SIZE as f64);
    json!({ "type": "Polygon", "coordinates": [[[w, s], [e, s], [e, n], [w, n], [w, s]]] })
}

fn band(name: &str, value: impl Fn(usize, usize) -> f32) -> RasterBand {
    RasterBand {
        name: name.to_string(),
        data: (0..SIZE * SIZE).map(|i| value(i % SIZE, i / SIZE)).collect(),
    }
}

fn scenes() -> Vec<Scene> {
    let optical = Raster::new(
        grid(),
        vec![
            band("B2", |_, row| 0.05 + 0.005 * row as f32),
            band("B4", |col, row| 0.12 - 0.008 * col as f32 + 0.003 * ((col + row) % 2) as f32),
            band("B5", |col, row| 0.14 + 0.004 * row as f32 - 0.002 * col as f32),
            band("B8", |col, row| 0.35 + 0.05 * col as f32 + 0.01 * row as f32),
        ],
    )
    .unwrap();
    let radar = Raster::new(grid(), vec![band("VV", |col, _| -16.0 + col as f32)]).unwrap();

    vec![
        Scene {
            id: "s2".to_string(),
            collection: Collection::Sentinel2,
            acquired: today() - chrono::Duration::days(5),
            cloud_cover: 3.0,
            polarisations: Vec::new(),
            instrument_mode: None,
            raster: optical,
        },
        Scene {
            id: "s1".to_string(),
            collection: Collection::Sentinel1Grd,
            acquired: today() - chrono::Duration::days(6),
            cloud_cover: 0.0,
            polarisations: vec!["VV".to_string()],
            instrument_mode: Some("IW".to_string()),
            raster: radar,
        },
    ]
}

struct TestApp {
    router: Router,
    store: MemoryMetadataStore,
    _dir: tempfile::TempDir,
}

fn app(scenes: Vec<Scene>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let store = MemoryMetadataStore::new();
    let settings = AnalysisSettings {
        export_dir: dir.path().to_path_buf(),
        ..AnalysisSettings::default()
    };

    let engine = Arc::new(LocalRasterEngine::with_scenes(scenes).unwrap());
    let pipeline = AnalysisPipeline::new(engine, Arc::new(store.clone()), &settings)
        .unwrap()
        .with_clock(Arc::new(FixedClock(today())));
    let state = AppState::new(Arc::new(pipeline), Arc::new(store.clone()));

    TestApp { router: create_router(Arc::new(state)), store, _dir: dir }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn post_json(router: &Router, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/run-analysis")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let (status, bytes) = send(router, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_run_analysis_then_cached() {
    let app = app(scenes());
    let body = json!({ "field_id": "farm-01", "area_of_interest": area() });

    let (status, first) = post_json(&app.router, body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{}", first);
    assert_eq!(first["status"], "success");
    assert_eq!(first["cached"], false);
    assert_eq!(first["outputs"]["stress"], "/analysis_files/farm-01_stress_2025-07-08.tif");
    assert_eq!(first["outputs"].as_object().unwrap().len(), 3);
    assert_eq!(first["files"], first["outputs"]);

    let (status, second) = post_json(&app.router, body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(second["outputs"], first["outputs"]);
    assert_eq!(app.store.record_count(), 1);
}

#[tokio::test]
async fn test_exported_file_is_served() {
    let app = app(scenes());
    let (status, body) =
        post_json(&app.router, json!({ "farm_id": "farm-01", "coords": area() })).await;
    assert_eq!(status, StatusCode::OK);

    let url = body["outputs"]["carbon"].as_str().unwrap().to_string();
    let request = Request::builder().uri(url).body(Body::empty()).unwrap();
    let (status, bytes) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(!bytes.is_empty());
}

#[tokio::test]
async fn test_missing_field_id_is_bad_request() {
    let app = app(scenes());
    let (status, body) = post_json(&app.router, json!({ "area_of_interest": area() })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["category"], "invalid_input");
}

#[tokio::test]
async fn test_point_geometry_is_bad_request() {
    let app = app(scenes());
    let point = json!({ "type": "Point", "coordinates": [36.8, -1.3] });
    let (status, body) =
        post_json(&app.router, json!({ "field_id": "farm-01", "area_of_interest": point })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid area_of_interest");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = app(scenes());
    let request = Request::builder()
        .method("POST")
        .uri("/run-analysis")
        .header("content-type", "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let (status, _) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_imagery_is_unprocessable() {
    let app = app(Vec::new());
    let (status, body) =
        post_json(&app.router, json!({ "field_id": "farm-01", "area_of_interest": area() })).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["category"], "no_data");
    assert_eq!(app.store.record_count(), 0);
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let app = app(scenes());
    app.store.set_unavailable(true);

    let (status, body) =
        post_json(&app.router, json!({ "field_id": "farm-01", "area_of_interest": area() })).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["category"], "storage");

    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, bytes) = send(&app.router, request).await;
    let health: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "degraded");
}

#[tokio::test]
async fn test_health_ok() {
    let app = app(scenes());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, bytes) = send(&app.router, request).await;
    let health: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store"], "memory");
    assert_eq!(health["engine"], "local");
}
