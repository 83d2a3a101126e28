// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key authentication middleware.
//!
//! The `X-API-Key` header is hashed (SHA-256 hex) and looked up against the
//! users table. Authenticated requests carry the [`User`] in request
//! extensions for downstream handlers and the rate limiter.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing::error;

use courier_core::{hash_api_key, CourierError, User};

use crate::error::ApiError;
use crate::server::GatewayState;

/// Validate the `X-API-Key` header and attach the user to the request.
pub async fn auth_middleware(
    State(state): State<GatewayState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let api_key = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if api_key.is_empty() {
        return Err(ApiError::Unauthorized("Missing X-API-Key header".into()));
    }

    let hash = hash_api_key(&api_key);
    let user: User = match state.users.get_by_api_key_hash(&hash).await {
        Ok(user) => user,
        Err(CourierError::NotFound) => {
            return Err(ApiError::Unauthorized("Invalid API key".into()));
        }
        Err(e) => {
            error!(error = %e, "failed to authenticate request");
            return Err(ApiError::Internal("Failed to authenticate".into()));
        }
    };

    if !user.is_active {
        return Err(ApiError::Forbidden("Account is disabled".into()));
    }

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
