//! Run handlers. Listings are paginated; the next page is advertised in a
//! `Link` header.

use axum::extract::{Path, Query, State};
use axum::http::header::LINK;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use striv_store::Page;

use crate::error::ApiError;
use crate::schema::runs::{PageQuery, RefreshRunsResponse};
use crate::state::AppState;

/// Lists runs, most recent first.
///
/// `GET /runs`
pub async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = {
        let mut service = state.service.lock().await;
        service.list_runs(None, &query.to_page_request())?
    };
    paginated(page, &query, "/runs")
}

/// Lists the runs of one job, most recent first.
///
/// `GET /job/{id}/runs`
pub async fn list_job_runs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let page = {
        let mut service = state.service.lock().await;
        service.list_runs(Some(&id), &query.to_page_request())?
    };
    paginated(page, &query, &format!("/job/{id}/runs"))
}

/// `GET /run/{id}`
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.get_run(&id)?))
}

/// Pulls runs from every execution driver.
///
/// `POST /runs/refresh-all`
pub async fn refresh_runs(
    State(state): State<AppState>,
) -> Result<Json<RefreshRunsResponse>, ApiError> {
    let mut service = state.service.lock().await;
    let processed = service.refresh_runs()?;
    Ok(Json(RefreshRunsResponse { processed }))
}

fn paginated(page: Page, query: &PageQuery, path: &str) -> Result<Response, ApiError> {
    let mut response = Json(page.entities).into_response();
    if let Some(token) = page.next {
        let link = HeaderValue::from_str(&query.next_link(path, &token))
            .map_err(|err| ApiError::InternalError(err.to_string()))?;
        response.headers_mut().insert(LINK, link);
    }
    Ok(response)
}
