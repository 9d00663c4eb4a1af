// API integration tests that verify HTTP endpoints
// Tests the axum router against fixture workbooks with real HTTP requests

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{sample_workbook, text, write_workbook, SAMPLE_BLOCK_WIDTH, SAMPLE_ROWS};
use forecast_service::api::{create_router, AppState};
use forecast_service::cache::ForecastCache;
use forecast_service::forecast::BlockParser;
use forecast_service::importers::WorkbookLoader;
use forecast_service::services::ForecastService;
use http_body_util::BodyExt; // For `.collect()`
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt; // For `oneshot`

fn router_for(path: &Path) -> Router {
    let loader = WorkbookLoader::new(path).with_parser(BlockParser::new(SAMPLE_BLOCK_WIDTH));
    let forecast_service = ForecastService::new(loader, Arc::new(ForecastCache::new()));
    create_router(AppState { forecast_service })
}

async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, "GET", uri).await
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_summary_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"], SAMPLE_ROWS);
    assert_eq!(json["indicators"], 3);
    assert_eq!(json["authorities"], 2);
    assert_eq!(json["first_year"], 2024);
    assert_eq!(json["last_year"], 2026);
    assert!(json["loaded_at"].is_string());
}

#[tokio::test]
async fn test_forecasts_use_normalized_field_names() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/forecasts?indicator=KPIF&authority=KI").await;

    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let first = rows[0].as_object().unwrap();
    let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["Authority", "Indicator", "Value", "Year"]);
    assert_eq!(first["Indicator"], "KPIF");
    assert_eq!(first["Authority"], "KI");
    assert_eq!(first["Year"], 2024);
    assert_eq!(first["Value"], 2.8);
}

#[tokio::test]
async fn test_forecasts_year_filter() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/forecasts?from=2026").await;

    assert_eq!(status, StatusCode::OK);
    let rows = json.as_array().unwrap();
    // Only KI has 2026 values, and not for Arbetslöshet
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r["Year"] == 2026 && r["Authority"] == "KI"));
}

#[tokio::test]
async fn test_indicators_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/indicators").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!(["Arbetslöshet", "BNP", "KPIF"]));
}

#[tokio::test]
async fn test_authorities_endpoint_decodes_path() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/indicators/Arbetsl%C3%B6shet/authorities").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!(["KI", "Riksbanken"]));
}

#[tokio::test]
async fn test_authorities_unknown_indicator() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/indicators/Inflation/authorities").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "unknown_indicator");
    assert_eq!(json["message"], "Unknown indicator: Inflation");
}

#[tokio::test]
async fn test_chart_with_selection() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(
        app,
        "/api/v1/chart?indicator=BNP&authorities=Riksbanken,KI&from=2024&to=2025",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["indicator"], "BNP");
    assert_eq!(json["authorities"], serde_json::json!(["Riksbanken", "KI"]));
    assert_eq!(json["series"]["years"], serde_json::json!([2024, 2025]));

    let series = json["series"]["series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["authority"], "KI");
    assert_eq!(series[0]["values"], serde_json::json!([1.0, 2.0]));
    assert_eq!(series[1]["authority"], "Riksbanken");
    assert_eq!(series[1]["values"], serde_json::json!([0.8, 1.6]));

    let deltas = json["deltas"].as_array().unwrap();
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0]["authority"], "Riksbanken");
    assert_eq!(deltas[1]["authority"], "KI");
    assert_eq!(deltas[1]["delta"], 1.0);
    assert_eq!(deltas[1]["delta_pct"], 100.0);
}

#[tokio::test]
async fn test_chart_defaults() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/chart").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["indicator"], "Arbetslöshet");
    assert_eq!(json["authorities"], serde_json::json!(["KI", "Riksbanken"]));
    assert_eq!(json["from"], 2024);
    assert_eq!(json["to"], 2025);
    assert_eq!(json["deltas"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_chart_gap_is_null() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/chart?indicator=KPIF").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["series"]["years"], serde_json::json!([2024, 2025, 2026]));
    let series = json["series"]["series"].as_array().unwrap();
    assert_eq!(series[1]["authority"], "Riksbanken");
    assert_eq!(series[1]["values"], serde_json::json!([3.0, null, null]));
    // Riksbanken has no 2026 value, so only KI gets a delta
    assert_eq!(json["deltas"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_chart_reversed_range() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = get(app, "/api/v1/chart?indicator=BNP&from=2026&to=2024").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_year_range");
}

#[tokio::test]
async fn test_missing_workbook_reports_load_failure() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&dir.path().join("missing.xlsx"));

    let (status, json) = get(app, "/api/v1/chart").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "source_unavailable");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to load forecasts"));
}

#[tokio::test]
async fn test_malformed_workbook_reports_layout_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("Prognoser.xlsx");
    let mut grid = common::sample_grid();
    grid[1].push(text("2027"));
    write_workbook(&path, "Data", &grid);
    let app = router_for(&path);

    let (status, json) = get(app, "/api/v1/indicators").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "malformed_layout");
    assert!(json["message"]
        .as_str()
        .unwrap()
        .contains("do not divide into blocks of 3"));
}

#[tokio::test]
async fn test_reload_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = router_for(&sample_workbook(dir.path()));

    let (status, json) = send(app, "POST", "/api/v1/reload").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"], SAMPLE_ROWS);
}

#[tokio::test]
async fn test_reload_picks_up_new_content() {
    let dir = TempDir::new().unwrap();
    let path = sample_workbook(dir.path());
    let app = router_for(&path);

    let (_, before) = get(app.clone(), "/api/v1/summary").await;
    assert_eq!(before["rows"], SAMPLE_ROWS);

    let mut grid = common::sample_grid();
    grid[3][5] = common::num(2.2);
    write_workbook(&path, "Data", &grid);

    let (status, after) = send(app, "POST", "/api/v1/reload").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(after["rows"], SAMPLE_ROWS + 1);
}
