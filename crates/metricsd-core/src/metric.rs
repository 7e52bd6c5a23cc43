//! Metric model shared by the store, the repository and the wire format.
//!
//! On the wire a metric is `{"id", "type", "delta"?, "value"?, "hash"?}`.
//! `type` is kept as a tagged [`MetricKind`]; unsupported names survive
//! decoding as [`MetricKind::Unknown`] so the repository can reject them
//! explicitly instead of failing the whole request body.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

/// Wire name of gauge metrics.
pub const GAUGE: &str = "gauge";
/// Wire name of counter metrics.
pub const COUNTER: &str = "counter";

/// Metric type discriminator.
///
/// Ordering is gauge < counter, used as a tie-break when listing by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricKind {
    /// Latest sample wins.
    Gauge,
    /// Submissions accumulate.
    Counter,
    /// Anything else a client sent. Never stored.
    Unknown(String),
}

impl MetricKind {
    pub fn as_str(&self) -> &str {
        match self {
            MetricKind::Gauge => GAUGE,
            MetricKind::Counter => COUNTER,
            MetricKind::Unknown(s) => s,
        }
    }

    /// Reject kinds other than gauge/counter.
    pub fn ensure_known(&self) -> Result<()> {
        match self {
            MetricKind::Gauge | MetricKind::Counter => Ok(()),
            MetricKind::Unknown(s) => Err(MetricsError::UnknownMetricType(s.clone())),
        }
    }
}

impl From<String> for MetricKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            GAUGE => MetricKind::Gauge,
            COUNTER => MetricKind::Counter,
            _ => MetricKind::Unknown(s),
        }
    }
}

impl From<MetricKind> for String {
    fn from(k: MetricKind) -> Self {
        match k {
            MetricKind::Unknown(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl FromStr for MetricKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(MetricKind::from(s.to_string()))
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store identity of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricKey {
    pub kind: MetricKind,
    pub id: String,
}

impl MetricKey {
    pub fn new(kind: MetricKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }
}

/// A named, typed metric value with an optional integrity hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MetricKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl Metric {
    pub fn gauge(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Gauge,
            delta: None,
            value: Some(value),
            hash: None,
        }
    }

    pub fn counter(id: impl Into<String>, delta: i64) -> Self {
        Self {
            id: id.into(),
            kind: MetricKind::Counter,
            delta: Some(delta),
            value: None,
            hash: None,
        }
    }

    pub fn key(&self) -> MetricKey {
        MetricKey::new(self.kind.clone(), self.id.clone())
    }

    /// Hash string, treating `""` the same as absent.
    pub fn hash(&self) -> Option<&str> {
        self.hash.as_deref().filter(|h| !h.is_empty())
    }

    /// Enforce "exactly one payload, matching the kind".
    ///
    /// The payload field that does not belong to the kind is dropped; a missing
    /// matching payload or a non-finite gauge value is a format error.
    pub fn normalize(mut self) -> Result<Self> {
        self.kind.ensure_known()?;
        match self.kind {
            MetricKind::Gauge => {
                match self.value {
                    None => {
                        return Err(MetricsError::BadFormat(format!(
                            "gauge `{}` has no value",
                            self.id
                        )));
                    }
                    // NaN and infinities cannot be stored or dumped as JSON.
                    Some(v) if !v.is_finite() => {
                        return Err(MetricsError::BadFormat(format!(
                            "gauge `{}` value {v} is not finite",
                            self.id
                        )));
                    }
                    Some(_) => {}
                }
                self.delta = None;
            }
            MetricKind::Counter => {
                if self.delta.is_none() {
                    return Err(MetricsError::BadFormat(format!(
                        "counter `{}` has no delta",
                        self.id
                    )));
                }
                self.value = None;
            }
            MetricKind::Unknown(_) => {}
        }
        Ok(self)
    }

    /// Plain-text rendering used by the value endpoint.
    pub fn display_value(&self) -> Result<String> {
        match self.kind {
            MetricKind::Gauge => self
                .value
                .map(|v| format!("{v:.3}"))
                .ok_or_else(|| MetricsError::MissingPayload(self.id.clone())),
            MetricKind::Counter => self
                .delta
                .map(|d| d.to_string())
                .ok_or_else(|| MetricsError::MissingPayload(self.id.clone())),
            MetricKind::Unknown(ref s) => Err(MetricsError::UnknownMetricType(s.clone())),
        }
    }
}
