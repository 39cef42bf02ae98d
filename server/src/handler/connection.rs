use axum::extract::State;
use axum::Json;
use filebridge_core::config::ConnectConfig;
use filebridge_core::connection::SessionInfo;

use crate::protocol::errors::ApiError;
use crate::protocol::messages::{ApiJson, ConnectResponse, DisconnectRequest, SuccessResponse};
use crate::state::AppState;

/// `POST /api/connect`
pub async fn connect(
    State(state): State<AppState>,
    ApiJson(config): ApiJson<ConnectConfig>,
) -> Result<Json<ConnectResponse>, ApiError> {
    if config.host.trim().is_empty() {
        return Err(ApiError::BadRequest("host is required".to_string()));
    }
    let session = state.registry.connect(config).await?;
    Ok(Json(ConnectResponse {
        success: true,
        conn_id: session.id.clone(),
        message: format!(
            "Connected to {}:{} via {}",
            session.host,
            session.port,
            session.kind.as_str().to_uppercase()
        ),
    }))
}

/// `POST /api/disconnect`
pub async fn disconnect(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<DisconnectRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.registry.disconnect(&req.conn_id).await?;
    Ok(Json(SuccessResponse::ok()))
}

/// `GET /api/connections`
pub async fn connections(State(state): State<AppState>) -> Json<Vec<SessionInfo>> {
    Json(state.registry.sessions().await)
}
