//! Shared error type across metricsd crates.

use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Malformed metric or request body.
    BadFormat,
    /// Metric type is neither `gauge` nor `counter`.
    UnknownType,
    /// Hash verification failed.
    IntegrityMismatch,
    /// Metric does not exist.
    NotFound,
    /// Some metrics of a batch were rejected.
    PartialUpdate,
    /// Persistent backend failed or timed out.
    Storage,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::BadFormat => "BAD_FORMAT",
            ClientCode::UnknownType => "UNKNOWN_METRIC_TYPE",
            ClientCode::IntegrityMismatch => "INTEGRITY_MISMATCH",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::PartialUpdate => "PARTIAL_UPDATE",
            ClientCode::Storage => "STORAGE",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MetricsError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("unknown metric type `{0}`")]
    UnknownMetricType(String),
    #[error("hash mismatch for `{id}`")]
    IntegrityMismatch { id: String },
    #[error("bad metric format: {0}")]
    BadFormat(String),
    #[error("metric not found: {kind}/{id}")]
    NotFound { kind: String, id: String },
    #[error("partial update: {applied} applied, {rejected} rejected")]
    PartialUpdate { applied: usize, rejected: usize },
    #[error("hashing key is empty")]
    EmptyKey,
    #[error("empty delta and value for `{0}`")]
    MissingPayload(String),
    #[error("backend: {0}")]
    Backend(String),
    #[error("backend call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl MetricsError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            MetricsError::UnknownMetricType(_) => ClientCode::UnknownType,
            MetricsError::IntegrityMismatch { .. } => ClientCode::IntegrityMismatch,
            MetricsError::BadFormat(_) | MetricsError::MissingPayload(_) => ClientCode::BadFormat,
            MetricsError::NotFound { .. } => ClientCode::NotFound,
            MetricsError::PartialUpdate { .. } => ClientCode::PartialUpdate,
            MetricsError::Backend(_) | MetricsError::Timeout(_) => ClientCode::Storage,
            MetricsError::EmptyKey | MetricsError::Config(_) | MetricsError::Internal(_) => {
                ClientCode::Internal
            }
        }
    }

    /// Number of metrics a bulk operation still applied, if this is a partial failure.
    pub fn applied(&self) -> Option<usize> {
        match self {
            MetricsError::PartialUpdate { applied, .. } => Some(*applied),
            _ => None,
        }
    }
}
