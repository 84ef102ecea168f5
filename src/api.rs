// =============================================================================
// Minimal control/telemetry HTTP surface
// =============================================================================
//
// GET /snapshot returns the latest published EngineSnapshot; POST /controls
// merges a partial control update onto the bus. Unauthenticated: this
// engine only ever paper-trades, so there is no exchange credential or
// real capital at risk behind these endpoints.
// =============================================================================

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;

use crate::bus::SharedBus;
use crate::types::ControlsPatch;

pub fn router(bus: Arc<SharedBus>) -> Router {
    Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/controls", post(post_controls))
        .layer(CorsLayer::permissive())
        .with_state(bus)
}

async fn get_snapshot(State(bus): State<Arc<SharedBus>>) -> Json<serde_json::Value> {
    match bus.get_snapshot() {
        Some(snap) => Json(serde_json::json!(snap)),
        None => Json(serde_json::json!({ "status": "no snapshot yet" })),
    }
}

async fn post_controls(State(bus): State<Arc<SharedBus>>, Json(patch): Json<ControlsPatch>) -> Json<serde_json::Value> {
    bus.set_controls(patch);
    Json(serde_json::json!({ "status": "ok" }))
}
