//! HTTP front-end for [`SimController`].

use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use otg_model::{
    CaptureRequest, Config, ControlState, MetricsRequest, MetricsResponse, Warnings,
};

use crate::engine::SimController;
use crate::error::SimError;

/// Build the controller API router.
pub fn router(sim: Arc<SimController>) -> Router {
    Router::new()
        .route("/config", post(set_config).get(get_config))
        .route("/control/state", post(set_control_state))
        .route("/monitor/metrics", post(get_metrics))
        .route("/capture", post(get_capture))
        .with_state(sim)
}

async fn set_config(
    State(sim): State<Arc<SimController>>,
    Json(config): Json<Config>,
) -> Result<Json<Warnings>, SimError> {
    sim.apply_config(config)?;
    Ok(Json(Warnings::default()))
}

async fn get_config(State(sim): State<Arc<SimController>>) -> Result<Json<Config>, SimError> {
    Ok(Json(sim.config()?))
}

async fn set_control_state(
    State(sim): State<Arc<SimController>>,
    Json(state): Json<ControlState>,
) -> Result<Json<Warnings>, SimError> {
    sim.control(&state)?;
    Ok(Json(Warnings::default()))
}

async fn get_metrics(
    State(sim): State<Arc<SimController>>,
    Json(request): Json<MetricsRequest>,
) -> Result<Json<MetricsResponse>, SimError> {
    Ok(Json(sim.metrics(&request)?))
}

async fn get_capture(
    State(sim): State<Arc<SimController>>,
    Json(request): Json<CaptureRequest>,
) -> Result<impl IntoResponse, SimError> {
    let bytes = sim.capture(&request)?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes))
}
