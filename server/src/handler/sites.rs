use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;

use crate::protocol::errors::ApiError;
use crate::protocol::messages::{ApiJson, SuccessResponse};
use crate::state::sites::Site;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Json<Vec<Site>> {
    Json(state.sites.list().await)
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Site>, ApiError> {
    let site = into_object(body)?;
    Ok(Json(state.sites.create(site).await))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<Json<Site>, ApiError> {
    let patch = into_object(body)?;
    state
        .sites
        .update(&id, patch)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Site not found: {id}")))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if state.sites.delete(&id).await {
        Ok(Json(SuccessResponse::ok()))
    } else {
        Err(ApiError::NotFound(format!("Site not found: {id}")))
    }
}

fn into_object(body: Value) -> Result<Site, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest(
            "site must be a JSON object".to_string(),
        )),
    }
}
