//! metricsd core: metric model, integrity hashing, and error types.
//!
//! This crate defines the metric wire format, the keyed-hash rules, and the
//! error surface shared by the server and any pushing agent. It carries no
//! transport or runtime dependencies so it can be reused on both sides of the
//! push protocol.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. All fallible paths
//! surface as `MetricsError`/`Result`, so a malformed metric never takes the
//! process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod integrity;
pub mod metric;

/// Shared result type.
pub use error::{ClientCode, MetricsError, Result};
pub use metric::{Metric, MetricKey, MetricKind};
