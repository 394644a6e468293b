//! Route table.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::{Value, json};

use super::error::ApiError;
use super::server::AppState;
use crate::monitor::TickReport;
use crate::scheduler::tick_once;

/// Build the router with the trigger mounted at `trigger_path`.
pub fn create_router(state: AppState, trigger_path: &str) -> Router {
    Router::new()
        .route(trigger_path, get(trigger).post(trigger))
        .route("/health", get(health))
        .with_state(state)
}

/// Run one tick and report its outcome.
async fn trigger(State(state): State<AppState>) -> Result<Json<TickReport>, ApiError> {
    let report = tick_once(&state.engine).await?;
    Ok(Json(report))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}
