//! Job handlers (list, create, evaluate, get, update).

use axum::extract::{Path, State};
use axum::Json;
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ApiError;
use crate::schema::jobs::{EvaluateJobResponse, JobIdResponse};
use crate::state::AppState;

/// Lists all jobs, keyed by id.
///
/// `GET /jobs`
pub async fn list_jobs(
    State(state): State<AppState>,
) -> Result<Json<IndexMap<String, Value>>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.list_jobs()?))
}

/// Creates a job and installs it through its execution's driver.
///
/// `POST /jobs`
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<JobIdResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let id = service.create_job(body)?;
    Ok(Json(JobIdResponse { id }))
}

/// Renders a job definition without saving it, for debugging.
///
/// `POST /jobs/evaluate`
pub async fn evaluate_job(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<EvaluateJobResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let payload = service.evaluate_job(body)?;
    Ok(Json(EvaluateJobResponse { payload }))
}

/// `GET /job/{id}`
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.get_job(&id)?))
}

/// Updates an existing job. Cannot create jobs.
///
/// `PUT /job/{id}`
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<JobIdResponse>, ApiError> {
    let mut service = state.service.lock().await;
    service.update_job(&id, body)?;
    Ok(Json(JobIdResponse { id }))
}
