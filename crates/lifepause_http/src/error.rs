//! HTTP error mapping for guard rejections and period endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lifepause_core::{
    AuthFailure, FreezeServiceError, FreezeValidationError, ModuleFrozen, ModuleTag,
};
use log::error;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced to HTTP clients by the freeze layers.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Mutation against a frozen module (423)
    #[error("{}", .0.message)]
    ModuleFrozen(ModuleFrozen),

    /// No usable owner identity (401)
    #[error("{}", describe_auth_failure(.0))]
    Unauthorized(AuthFailure),

    /// Unknown resource, or one owned by someone else (404)
    #[error("{0}")]
    NotFound(String),

    /// Request rejected by validation (400)
    #[error("{0}")]
    BadRequest(String),

    /// Status move not allowed from the current status (409)
    #[error("{0}")]
    Conflict(String),

    /// Storage or task failure (500)
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::ModuleFrozen(_) => StatusCode::LOCKED,
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => StatusCode::CONFLICT,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::ModuleFrozen(_) => "ModuleFrozen",
            ServerError::Unauthorized(_) => "Unauthorized",
            ServerError::NotFound(_) => "NotFound",
            ServerError::BadRequest(_) => "BadRequest",
            ServerError::Conflict(_) => "Conflict",
            ServerError::Internal(_) => "InternalError",
        }
    }

    fn module(&self) -> Option<ModuleTag> {
        match self {
            ServerError::ModuleFrozen(denial) => Some(denial.module),
            _ => None,
        }
    }
}

impl From<FreezeServiceError> for ServerError {
    fn from(value: FreezeServiceError) -> Self {
        match value {
            FreezeServiceError::NotFound(_) => ServerError::NotFound(value.to_string()),
            FreezeServiceError::Validation(
                FreezeValidationError::InvalidTransition { .. }
                | FreezeValidationError::TerminalPeriod(_),
            ) => ServerError::Conflict(value.to_string()),
            FreezeServiceError::Validation(_) => ServerError::BadRequest(value.to_string()),
            FreezeServiceError::Repo(err) => {
                error!("event=freeze_period_api module=http status=error error={err}");
                ServerError::Internal("freeze period storage failed".to_string())
            }
        }
    }
}

fn describe_auth_failure(failure: &AuthFailure) -> String {
    match failure {
        AuthFailure::MissingCredentials => "Owner identity required".to_string(),
        AuthFailure::InvalidCredentials(reason) => format!("Invalid owner identity: {reason}"),
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<ModuleTag>,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.error_code(),
            message: self.to_string(),
            module: self.module(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
