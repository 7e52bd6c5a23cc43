//! Axum router wiring.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{api, app_state::AppState, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::list_html))
        .route("/j", get(api::list_json))
        .route("/ping", get(api::ping))
        .route("/update/", post(api::update_json))
        .route("/update/:kind/:name/", post(api::update_missing_value))
        .route("/update/:kind/:name/:value", post(api::update_path))
        .route("/updates/", post(api::bulk_update))
        .route("/value/", post(api::value_json))
        .route("/value/:kind/:name", get(api::value_path))
        .route("/healthz", get(ops::healthz))
        .route("/metrics", get(ops::metrics))
        .fallback(api::not_found)
        .with_state(state)
}
