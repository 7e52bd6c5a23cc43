//! metricsd server library entry.
//!
//! Wires the in-memory store, the repository (validation, counter merge,
//! integrity hashes), the persistent backends and the backup worker into an
//! axum HTTP service. Consumed by the binary (`main.rs`) and by integration
//! tests.

pub mod api;
pub mod app_state;
pub mod backend;
pub mod backup;
pub mod config;
pub mod obs;
pub mod ops;
pub mod repository;
pub mod router;
pub mod store;
