use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("item not found")]
    NotFound,

    #[error("update affected 0 rows")]
    UpdateFailed,

    #[error("timeout: deadline exceeded")]
    Timeout,

    #[error("not authorized")]
    Unauthorized,

    #[error("forbidden request")]
    Forbidden,

    #[error("service {service} in outage => cause error: {message}")]
    RemoteService { service: String, message: String },

    #[error("database error: {0}")]
    Storage(#[source] sqlx::Error),

    #[error("health check services required failed")]
    HealthCheck,
}

impl AppError {
    /// Transport status for each error kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::HealthCheck => StatusCode::SERVICE_UNAVAILABLE,
            AppError::UpdateFailed | AppError::RemoteService { .. } | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Classifies a non-success reply from an upstream service by its status code.
    pub fn from_upstream_status(status: u16, service: &str, message: impl Into<String>) -> Self {
        match status {
            401 => AppError::Unauthorized,
            403 => AppError::Forbidden,
            404 => AppError::NotFound,
            _ => AppError::RemoteService {
                service: service.to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => AppError::Timeout,
            other => AppError::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// An [`AppError`] tagged with the correlation id of the request that raised it.
#[derive(Debug)]
pub struct ApiError {
    pub error: AppError,
    pub request_id: String,
}

impl ApiError {
    pub fn new(error: AppError, request_id: impl Into<String>) -> Self {
        Self {
            error,
            request_id: request_id.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status_code();

        if status.is_server_error() {
            tracing::error!(request_id = %self.request_id, error = ?self.error, "Request failed");
        } else {
            tracing::warn!(request_id = %self.request_id, error = %self.error, "Request rejected");
        }

        let body = Json(json!({
            "status": status.as_u16(),
            "message": self.error.to_string(),
            "request_id": self.request_id,
        }));

        (status, body).into_response()
    }
}
