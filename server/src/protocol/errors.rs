//! HTTP error mapping.
//!
//! Every failing route answers with `{"error": <message>, "code": <code>}`;
//! transfer failures also carry the `transferId` of the failed record.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use filebridge_core::errors::{CoreError, FileError};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Local filesystem failure from the local browsing endpoints.
    #[error("{0}")]
    Local(FileError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Core(err) => match err {
                CoreError::Connection(_) => (StatusCode::BAD_GATEWAY, "connection_failed"),
                CoreError::NotConnected(_) => (StatusCode::BAD_REQUEST, "not_connected"),
                CoreError::Unsupported(_) => (StatusCode::BAD_REQUEST, "unsupported_operation"),
                CoreError::Transfer { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "transfer_failed")
                }
                CoreError::Filesystem(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "filesystem_error")
                }
                CoreError::File(file_err) => (file_status(file_err), "file_error"),
                CoreError::Config(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            },
            ApiError::Local(file_err) => (file_status(file_err), "filesystem_error"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        }
    }
}

fn file_status(err: &FileError) -> StatusCode {
    match err {
        FileError::NotFound(_) => StatusCode::NOT_FOUND,
        FileError::PermissionDenied(_) => StatusCode::FORBIDDEN,
        FileError::NotSupported(_) => StatusCode::BAD_REQUEST,
        FileError::OperationFailed(_) | FileError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        debug!(%status, code, "Request failed: {self}");

        let mut body = json!({
            "error": self.to_string(),
            "code": code,
        });
        if let ApiError::Core(CoreError::Transfer { transfer_id, .. }) = &self {
            body["transferId"] = json!(transfer_id);
        }
        (status, Json(body)).into_response()
    }
}

impl From<FileError> for ApiError {
    fn from(err: FileError) -> Self {
        ApiError::Core(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn transfer_errors_carry_transfer_id() {
        let err = ApiError::Core(CoreError::Transfer {
            transfer_id: "t-42".into(),
            message: "boom".into(),
        });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "transfer_failed");
        assert_eq!(body["transferId"], "t-42");
        assert_eq!(body["error"], "Transfer failed: boom");
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let cases = [
            (
                ApiError::Core(CoreError::Connection("refused".into())),
                StatusCode::BAD_GATEWAY,
                "connection_failed",
            ),
            (
                ApiError::Core(CoreError::NotConnected("x".into())),
                StatusCode::BAD_REQUEST,
                "not_connected",
            ),
            (
                ApiError::from(FileError::NotSupported("chmod".into())),
                StatusCode::BAD_REQUEST,
                "unsupported_operation",
            ),
            (
                ApiError::from(FileError::NotFound("/x".into())),
                StatusCode::NOT_FOUND,
                "file_error",
            ),
            (
                ApiError::Local(FileError::PermissionDenied("/root".into())),
                StatusCode::FORBIDDEN,
                "filesystem_error",
            ),
            (
                ApiError::BadRequest("nope".into()),
                StatusCode::BAD_REQUEST,
                "invalid_request",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }
}
