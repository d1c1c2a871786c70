use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::runs::{RunRegistry, RunStatus, Trigger};

#[derive(Clone)]
pub struct AppState {
    pub runs: Arc<RunRegistry>,
}

pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/scrape", get(scrape).post(scrape))
        .route("/runs/latest", get(latest_run))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn listen(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Listening at port {}", port);
    tokio::select! {
        r = axum::serve(listener, build_routes(state)) => {
            warn!("server ended unexpectedly: {:?}", &r)
        },
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl+c interrupt, closing server");
        }
    }
    Ok(())
}

async fn home() -> Json<Value> {
    Json(json!({ "message": "Job Scraper is running!" }))
}

async fn scrape(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.runs.trigger().await {
        Trigger::Started(run_id) => (
            StatusCode::ACCEPTED,
            Json(json!({ "message": "Scraping started!", "run_id": run_id })),
        ),
        Trigger::AlreadyRunning(run_id) => (
            StatusCode::CONFLICT,
            Json(json!({ "message": "Scraping already in progress", "run_id": run_id })),
        ),
    }
}

async fn latest_run(State(state): State<AppState>) -> Result<Json<RunStatus>, StatusCode> {
    state
        .runs
        .latest()
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
