//! Metric push/query HTTP handlers.
//!
//! JSON bodies are decoded by hand rather than through the `Json` extractor
//! so malformed input maps onto `BAD_FORMAT` like every other rejection.

pub mod error;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use metricsd_core::error::MetricsError;
use metricsd_core::{Metric, MetricKind};
use serde::Deserialize;
use serde_json::json;

use crate::app_state::AppState;

pub use error::{ApiError, ApiResult};

fn decode<T: serde::de::DeserializeOwned>(body: &str) -> Result<T, MetricsError> {
    serde_json::from_str(body).map_err(|e| MetricsError::BadFormat(format!("invalid json: {e}")))
}

fn plain(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body.into(),
    )
        .into_response()
}

/// `POST /update/`
pub async fn update_json(State(state): State<AppState>, body: String) -> ApiResult<Json<Metric>> {
    let metric: Metric = decode(&body)?;
    let stored = state.repo().update(metric).await?;
    Ok(Json(stored))
}

/// `POST /update/:type/:name/:value`
pub async fn update_path(
    State(state): State<AppState>,
    Path((kind, id, raw)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let kind = MetricKind::from(kind);
    let metric = match kind {
        MetricKind::Gauge => Metric::gauge(
            id,
            raw.parse()
                .map_err(|e| MetricsError::BadFormat(format!("gauge value `{raw}`: {e}")))?,
        ),
        MetricKind::Counter => Metric::counter(
            id,
            raw.parse()
                .map_err(|e| MetricsError::BadFormat(format!("counter delta `{raw}`: {e}")))?,
        ),
        // No payload; the repository rejects the kind.
        MetricKind::Unknown(_) => Metric {
            id,
            kind,
            delta: None,
            value: None,
            hash: None,
        },
    };
    state.repo().update(metric).await?;
    Ok(plain(StatusCode::OK, ""))
}

/// `POST /update/:type/:name/` has no value segment.
pub async fn update_missing_value() -> Response {
    plain(StatusCode::NOT_IMPLEMENTED, "not implemented")
}

#[derive(Debug, Deserialize)]
struct MetricQuery {
    id: String,
    #[serde(rename = "type")]
    kind: MetricKind,
}

/// `POST /value/`
pub async fn value_json(State(state): State<AppState>, body: String) -> ApiResult<Json<Metric>> {
    let q: MetricQuery = decode(&body)?;
    Ok(Json(state.repo().get(&q.kind, &q.id)?))
}

/// `GET /value/:type/:name`
pub async fn value_path(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let metric = state.repo().get(&MetricKind::from(kind), &id)?;
    Ok(plain(StatusCode::OK, metric.display_value()?))
}

/// `POST /updates/`
pub async fn bulk_update(State(state): State<AppState>, body: String) -> ApiResult<Response> {
    let metrics: Vec<Metric> = decode(&body)?;
    let applied = state.repo().bulk_update(metrics).await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "message": "metrics updated", "applied": applied })),
    )
        .into_response())
}

/// `GET /j`
pub async fn list_json(State(state): State<AppState>) -> Json<Vec<Metric>> {
    Json(state.repo().get_all())
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `GET /`
pub async fn list_html(State(state): State<AppState>) -> Html<String> {
    let mut rows = String::new();
    for m in state.repo().get_all() {
        let value = m.display_value().unwrap_or_default();
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            escape_html(&m.id),
            m.kind,
            value
        ));
    }
    Html(format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Metrics</title></head>\n\
         <body><table>\n<tr><th>Name</th><th>Type</th><th>Value</th></tr>\n{rows}</table></body></html>\n"
    ))
}

/// `GET /ping`
pub async fn ping(State(state): State<AppState>) -> Response {
    match state.repo().ping().await {
        Ok(()) => plain(StatusCode::OK, "DB connected successfully"),
        Err(e) => {
            tracing::error!(error = %e, "backend ping failed");
            plain(StatusCode::INTERNAL_SERVER_ERROR, "DB connection failed")
        }
    }
}

pub async fn not_found() -> Response {
    plain(StatusCode::NOT_FOUND, "not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("<b>\"x\"&'"), "&lt;b&gt;&quot;x&quot;&amp;&#39;");
    }
}
