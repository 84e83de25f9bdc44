//! Router assembly for the striv HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Jobs
        .route(
            "/jobs",
            get(handlers::jobs::list_jobs).post(handlers::jobs::create_job),
        )
        .route("/jobs/evaluate", post(handlers::jobs::evaluate_job))
        .route(
            "/job/{id}",
            get(handlers::jobs::get_job).put(handlers::jobs::update_job),
        )
        .route("/job/{id}/runs", get(handlers::runs::list_job_runs))
        // Runs
        .route("/runs", get(handlers::runs::list_runs))
        .route("/runs/refresh-all", post(handlers::runs::refresh_runs))
        .route("/run/{id}", get(handlers::runs::get_run))
        // Configuration state
        .route(
            "/state",
            get(handlers::state::dump_state).post(handlers::state::load_state),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
