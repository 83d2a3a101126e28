// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The API error envelope.
//!
//! Every caller-visible failure serializes as
//! `{"success": false, "error": {"code", "message", "fields"?}}` with the
//! status code implied by the error class. Validation errors carry
//! field-level detail when available; nothing else leaks internals.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use courier_core::CourierError;

/// Wire shape of the error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
}

/// Caller-visible API failures.
#[derive(Debug)]
pub enum ApiError {
    Validation {
        message: String,
        fields: Option<BTreeMap<String, String>>,
    },
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    InvalidState(String),
    RateLimited(String),
    Internal(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
            fields: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidState(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            // The Forbidden case (disabled account) shares the code with 401.
            ApiError::Unauthorized(_) | ApiError::Forbidden(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidState(_) => "INVALID_STATE",
            ApiError::RateLimited(_) => "RATE_LIMIT_EXCEEDED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (message, fields) = match &self {
            ApiError::Validation { message, fields } => (message.clone(), fields.clone()),
            ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::InvalidState(m)
            | ApiError::RateLimited(m)
            | ApiError::Internal(m) => (m.clone(), None),
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
                fields,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<CourierError> for ApiError {
    fn from(err: CourierError) -> Self {
        match err {
            CourierError::NotFound => ApiError::NotFound("Resource not found".to_string()),
            CourierError::InvalidState(message) => ApiError::InvalidState(message),
            other => {
                tracing::error!(error = %other, "request failed");
                ApiError::Internal("Failed to process request".to_string())
            }
        }
    }
}
