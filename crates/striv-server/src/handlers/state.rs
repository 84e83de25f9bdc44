//! Configuration state handlers (dump and load).

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use crate::error::ApiError;
use crate::schema::state::{StateChanges, StateDump};
use crate::state::AppState;

/// Dumps all dimensions and executions in the shape `POST /state` accepts.
///
/// `GET /state`
pub async fn dump_state(State(state): State<AppState>) -> Result<Json<StateDump>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.dump_state()?))
}

/// Replaces dimensions and/or executions with those in the body.
///
/// `POST /state`
pub async fn load_state(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<StateChanges>, ApiError> {
    let mut service = state.service.lock().await;
    Ok(Json(service.load_state(body)?))
}
