use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::usecases::{checkout::CheckoutError, payment_webhook::WebhookError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("Payment provider error")]
    Upstream,

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Upstream => "UPSTREAM_ERROR",
            AppError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Display of `Internal` never includes the source error.
        let body = Json(ErrorResponse {
            code: self.code(),
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Validation(message) => AppError::BadRequest(message),
            CheckoutError::Upstream(_) => AppError::Upstream,
            CheckoutError::NotConfigured => {
                AppError::Internal(anyhow::anyhow!("payment provider is not configured"))
            }
            CheckoutError::Internal(err) => AppError::Internal(err),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::MissingSignature => AppError::BadRequest(err.to_string()),
            WebhookError::InvalidPayload(_) => AppError::BadRequest("Invalid payload".to_string()),
            WebhookError::InvalidSignature => AppError::Unauthorized,
            WebhookError::NotConfigured => {
                AppError::Internal(anyhow::anyhow!("ipn secret is not configured"))
            }
            WebhookError::Internal(err) => AppError::Internal(err),
        }
    }
}
