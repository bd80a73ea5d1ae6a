//! Typed errors and HTTP mapping.

use crate::store::StoreError;
use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Message shown to clients for 5xx responses outside development.
pub const SANITIZED_MESSAGE: &str = "Something went wrong";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// One offending payload field.
#[derive(Clone, Debug, PartialEq, Serialize, utoipa::ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    /// Ok when nothing was collected.
    pub fn into_result(self) -> Result<(), AppError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join(", "))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    Validation(ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("image processing: {0}")]
    Image(String),
    #[error("email delivery: {0}")]
    Email(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) | AppError::Store(StoreError::UniqueViolation { .. }) => StatusCode::CONFLICT,
            AppError::Config(_)
            | AppError::Store(_)
            | AppError::Image(_)
            | AppError::Email(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error envelope: `fail` for client errors, `error` for server errors.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

/// Unsanitized message of a 5xx response, kept in the response extensions.
#[derive(Clone, Debug)]
pub struct ErrorDetail(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            let body = ErrorBody {
                status: "error",
                message: SANITIZED_MESSAGE.to_string(),
                errors: None,
            };
            let mut response = (status, Json(body)).into_response();
            response.extensions_mut().insert(ErrorDetail(self.to_string()));
            return response;
        }
        let errors = match &self {
            AppError::Validation(v) => Some(v.0.clone()),
            _ => None,
        };
        let body = ErrorBody {
            status: "fail",
            message: self.to_string(),
            errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Development-only layer: rewrites sanitized 5xx bodies with the real error message.
pub async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDetail(detail)) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };
    let body = ErrorBody {
        status: "error",
        message: detail,
        errors: None,
    };
    (response.status(), Json(body)).into_response()
}
