mod common;

use axum::{
    Json, Router,
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use common::{CaptureMailer, spawn_app_with, test_config};
use serde_json::{Value, json};
use std::collections::HashMap;
use tokio::net::TcpListener;
use url::Url;

// Home position used by every request below.
const LAT: f64 = 10.0;
const LON: f64 = 20.0;

async fn eonet() -> Json<Value> {
    Json(json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {
                    "id": "EONET_1",
                    "title": "Far wildfire",
                    "categories": [{ "id": "wildfires", "title": "Wildfires" }],
                    "date": "2026-10-14T00:00:00Z"
                },
                "geometry": { "type": "Point", "coordinates": [25.0, 10.0] }
            },
            {
                "type": "Feature",
                "properties": {
                    "id": "EONET_2",
                    "title": "River flood",
                    "categories": [{ "id": "floods", "title": "Floods" }],
                    "date": "2026-10-15T06:00:00Z"
                },
                "geometry": { "type": "Point", "coordinates": [20.0, 10.5] }
            },
            {
                "type": "Feature",
                "properties": { "id": "EONET_3", "title": "Line event" },
                "geometry": { "type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]] }
            },
            {
                "type": "Feature",
                "properties": { "id": "EONET_4", "title": "Broken point" },
                "geometry": { "type": "Point", "coordinates": [null, 10.0] }
            }
        ]
    }))
}

async fn usgs(Query(q): Query<HashMap<String, String>>) -> Response {
    if q.get("format").map(String::as_str) != Some("geojson") || !q.contains_key("latitude") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "features": [
            {
                "id": "us7000abcd",
                "properties": { "mag": 5.2, "place": "40 km N of Somewhere", "time": 1760000000000i64, "url": "https://earthquake.usgs.gov/x" },
                "geometry": { "coordinates": [20.1, 10.3, 12.5] }
            },
            {
                "id": "us7000abce",
                "properties": { "mag": 3.4, "place": "Nearby", "time": 1760000100000i64, "url": "" },
                "geometry": { "coordinates": [20.0, 10.1, 8.0] }
            },
            {
                "id": "us7000broken",
                "properties": { "mag": "strong" },
                "geometry": { "coordinates": [20.0, 10.1] }
            }
        ]
    }))
    .into_response()
}

async fn nws(Query(q): Query<HashMap<String, String>>) -> Response {
    if q.get("event").map(String::as_str) != Some("Tsunami") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "features": [
            { "properties": { "headline": "Tsunami Advisory issued", "event": "Tsunami Advisory", "severity": "Moderate", "areaDesc": "Coast" } },
            { "properties": { "headline": 42 } }
        ]
    }))
    .into_response()
}

async fn power(Query(q): Query<HashMap<String, String>>) -> Response {
    if q.get("parameters").map(String::as_str) != Some("T2M,RH2M,PRECTOTCORR") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "properties": {
            "parameter": {
                "T2M": { "20261011": 27.1, "20261012": 26.4, "20261013": -999.0 },
                "RH2M": { "20261011": 80.0, "20261012": 91.5, "20261013": -999.0 },
                "PRECTOTCORR": { "20261011": 12.0, "20261012": 85.3, "20261013": 92.0 }
            }
        }
    }))
    .into_response()
}

async fn unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn spawn_feed_stub() -> Url {
    let app = Router::new()
        .route("/eonet", get(eonet))
        .route("/usgs", get(usgs))
        .route("/nws", get(nws))
        .route("/power", get(power))
        .route("/down", get(unavailable));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

async fn app_against(base: &Url, nws_path: &str) -> common::TestApp {
    let mut cfg = test_config();
    cfg.hazard.eonet_url = base.join("eonet").unwrap();
    cfg.hazard.usgs_url = base.join("usgs").unwrap();
    cfg.hazard.nws_url = base.join(nws_path).unwrap();
    cfg.hazard.power_url = base.join("power").unwrap();
    spawn_app_with(cfg, CaptureMailer::default()).await
}

#[tokio::test]
async fn evaluate_picks_the_worst_nearby_event() {
    let base = spawn_feed_stub().await;
    let app = app_against(&base, "nws").await;

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/hazards/evaluate?lat={LAT}&lon={LON}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // ~55 km north: inside the 100 km warning radius
    assert_eq!(body["level"], "warning");
    assert_eq!(body["type"], "flood");
    assert_eq!(body["reason"], "Floods: River flood");
    assert_eq!(body["updatedAt"], "2026-10-15T06:00:00Z");
}

#[tokio::test]
async fn evaluate_rejects_bad_coordinates() {
    let base = spawn_feed_stub().await;
    let app = app_against(&base, "nws").await;

    let (status, _) = app
        .call("GET", "/api/hazards/evaluate?lat=10", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("GET", "/api/hazards/evaluate?lat=abc&lon=20", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("GET", "/api/hazards/summary?lat=95&lon=20", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn summary_combines_all_sources() {
    let base = spawn_feed_stub().await;
    let app = app_against(&base, "nws").await;

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/hazards/summary?lat={LAT}&lon={LON}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["flood"]["status"], "critical");
    assert_eq!(body["cyclone"]["status"], "warning");
    // the last row has rain only, which still counts as a measurement
    assert_eq!(body["flood"]["latest"]["date"], "20261013");
    assert!(body["flood"]["latest"]["temperature"].is_null());

    assert_eq!(body["earthquake"]["status"], "warning");
    assert_eq!(body["earthquake"]["count"], 2);
    assert_eq!(body["earthquake"]["strongest"], 5.2);
    assert_eq!(body["earthquake"]["quakes"][0]["coords"]["depth"], 12.5);

    assert_eq!(body["tsunami"]["status"], "warning");
    assert_eq!(body["tsunami"]["count"], 1);
    assert_eq!(body["tsunami"]["mostRecent"], "Tsunami Advisory issued");

    assert_eq!(body["top"]["key"], "flood");
    assert_eq!(body["top"]["level"], "critical");
}

#[tokio::test]
async fn failed_source_is_reported_inline() {
    let base = spawn_feed_stub().await;
    let app = app_against(&base, "down").await;

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/hazards/summary?lat={LAT}&lon={LON}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tsunami"]["status"], "neutral");
    assert_eq!(body["tsunami"]["count"], 0);
    assert!(
        body["tsunami"]["error"]
            .as_str()
            .unwrap()
            .contains("503")
    );
    assert!(body["earthquake"]["error"].is_null());
}

#[tokio::test]
async fn evaluate_surfaces_upstream_outage_as_bad_gateway() {
    let base = spawn_feed_stub().await;
    let mut cfg = test_config();
    cfg.hazard.eonet_url = base.join("down").unwrap();
    let app = spawn_app_with(cfg, CaptureMailer::default()).await;

    let (status, body) = app
        .call(
            "GET",
            &format!("/api/hazards/evaluate?lat={LAT}&lon={LON}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "BAD_GATEWAY");
}
