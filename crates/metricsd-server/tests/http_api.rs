#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use metricsd_core::integrity::compute_hash;
use metricsd_core::Metric;
use metricsd_server::app_state::AppState;
use metricsd_server::config::ServerConfig;
use metricsd_server::repository::Repository;
use metricsd_server::router::build_router;
use metricsd_server::store::Store;
use tower::ServiceExt;

const KEY: &str = "shared-secret";

fn app(key: &str) -> Router {
    let mut cfg = ServerConfig::default();
    cfg.integrity.key = key.to_string();
    cfg.storage.store_file.clear();
    let repo = Repository::new(Arc::new(Store::new()), key);
    build_router(AppState::new(cfg, repo))
}

async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn path_updates_and_plain_values() {
    let app = app("");
    for _ in 0..2 {
        let (status, _) = send(&app, Method::POST, "/update/counter/PollCount/1", "").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = send(&app, Method::POST, "/update/gauge/Alloc/12.5", "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/value/counter/PollCount", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "2"));
    let (status, body) = send(&app, Method::GET, "/value/gauge/Alloc", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "12.500"));
}

#[tokio::test]
async fn path_update_status_codes() {
    let app = app("");
    let cases = [
        ("/update/gauge/Alloc/abc", StatusCode::BAD_REQUEST),
        ("/update/counter/PollCount/1.5", StatusCode::BAD_REQUEST),
        ("/update/gauge/Alloc/NaN", StatusCode::BAD_REQUEST),
        ("/update/gauge/Alloc/inf", StatusCode::BAD_REQUEST),
        ("/update/histogram/x/1", StatusCode::NOT_IMPLEMENTED),
        ("/update/gauge/Alloc/", StatusCode::NOT_IMPLEMENTED),
        ("/update/gauge/", StatusCode::NOT_FOUND),
    ];
    for (uri, want) in cases {
        let (status, _) = send(&app, Method::POST, uri, "").await;
        assert_eq!(status, want, "uri={uri}");
    }
    let (status, _) = send(&app, Method::GET, "/value/gauge/missing", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, "/value/gauge/Alloc", "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn json_update_verifies_and_returns_restamped_metric() {
    let app = app(KEY);

    let mut m = Metric::counter("PollCount", 3);
    m.hash = Some(compute_hash(&m, KEY.as_bytes()).unwrap());
    let body = serde_json::to_string(&m).unwrap();
    send(&app, Method::POST, "/update/", &body).await;
    let (status, body) = send(&app, Method::POST, "/update/", &body).await;
    assert_eq!(status, StatusCode::OK);

    let stored: Metric = serde_json::from_str(&body).unwrap();
    assert_eq!(stored.delta, Some(6));
    assert_eq!(
        stored.hash.as_deref(),
        Some(compute_hash(&Metric::counter("PollCount", 6), KEY.as_bytes()).unwrap().as_str())
    );

    let (status, body) = send(
        &app,
        Method::POST,
        "/value/",
        r#"{"id":"PollCount","type":"counter"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Metric>(&body).unwrap(), stored);
}

#[tokio::test]
async fn json_update_rejections() {
    let app = app(KEY);

    let mut tampered = Metric::gauge("Alloc", 1.0);
    tampered.hash = Some(compute_hash(&tampered, KEY.as_bytes()).unwrap());
    tampered.value = Some(2.0);
    let (status, body) = send(
        &app,
        Method::POST,
        "/update/",
        &serde_json::to_string(&tampered).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("INTEGRITY_MISMATCH"));

    let (status, body) = send(&app, Method::POST, "/update/", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("BAD_FORMAT"));

    let (status, _) = send(
        &app,
        Method::POST,
        "/update/",
        r#"{"id":"x","type":"bogus","value":1}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn bulk_update_reports_partial_content() {
    let app = app("");
    let mut batch: Vec<serde_json::Value> = (0..9)
        .map(|i| serde_json::json!({"id": format!("g{i}"), "type": "gauge", "value": i}))
        .collect();
    batch.push(serde_json::json!({"id": "b", "type": "bogus", "value": 1}));

    let (status, body) = send(
        &app,
        Method::POST,
        "/updates/",
        &serde_json::Value::Array(batch).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::PARTIAL_CONTENT);
    let body: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["error"], "PARTIAL_UPDATE");
    assert_eq!(body["applied"], 9);

    let (status, body) = send(&app, Method::GET, "/j", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Vec<Metric>>(&body).unwrap().len(), 9);
}

#[tokio::test]
async fn listing_and_ops_endpoints() {
    let app = app("");
    send(&app, Method::POST, "/update/gauge/%3Cscript%3E/1", "").await;

    let (status, html) = send(&app, Method::GET, "/", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("&lt;script&gt;"));
    assert!(!html.contains("<script>"));

    let (status, body) = send(&app, Method::GET, "/ping", "").await;
    assert_eq!((status, body.as_str()), (StatusCode::OK, "DB connected successfully"));

    let (status, _) = send(&app, Method::GET, "/healthz", "").await;
    assert_eq!(status, StatusCode::OK);

    let (status, metrics) = send(&app, Method::GET, "/metrics", "").await;
    assert_eq!(status, StatusCode::OK);
    assert!(metrics.contains(r#"metricsd_updates_total{outcome="ok",type="gauge"} 1"#));
    assert!(metrics.contains("metricsd_stored_metrics 1"));
}
