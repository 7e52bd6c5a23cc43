//! HTTP rendering of `MetricsError`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metricsd_core::error::MetricsError;
use serde_json::json;

/// Response wrapper so handlers can `?` on core results.
#[derive(Debug)]
pub struct ApiError(pub MetricsError);

impl From<MetricsError> for ApiError {
    fn from(e: MetricsError) -> Self {
        Self(e)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub fn status_of(e: &MetricsError) -> StatusCode {
    match e {
        MetricsError::BadFormat(_)
        | MetricsError::MissingPayload(_)
        | MetricsError::IntegrityMismatch { .. } => StatusCode::BAD_REQUEST,
        MetricsError::NotFound { .. } => StatusCode::NOT_FOUND,
        MetricsError::UnknownMetricType(_) => StatusCode::NOT_IMPLEMENTED,
        MetricsError::PartialUpdate { .. } => StatusCode::PARTIAL_CONTENT,
        MetricsError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        MetricsError::Backend(_)
        | MetricsError::EmptyKey
        | MetricsError::Config(_)
        | MetricsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let mut body = json!({
            "error": self.0.client_code().as_str(),
            "message": self.0.to_string(),
        });
        if let Some(applied) = self.0.applied() {
            body["applied"] = json!(applied);
        }
        (status, Json(body)).into_response()
    }
}
