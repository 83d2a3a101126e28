// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the message API and the public endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::error;

use courier_core::types::{
    format_timestamp, Message, MessageStatus, Platform, SendMessageRequest, User,
};
use courier_storage::MessageFilter;

use crate::error::ApiError;
use crate::server::GatewayState;

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

/// Response body for POST /api/v1/messages/send.
#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message_id: String,
    pub recipients_count: usize,
    pub estimated_delivery: String,
    pub request_id: String,
}

/// Request body for POST /api/v1/messages/bulk.
///
/// Entries deserialize individually so one malformed entry fails that index
/// instead of the whole request.
#[derive(Debug, Deserialize)]
pub struct BulkSendRequest {
    pub messages: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct BulkResult {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkResult>,
}

/// Aggregated per-recipient counts for a message.
#[derive(Debug, Default, Serialize)]
pub struct DeliverySummary {
    pub queued: usize,
    pub processing: usize,
    pub sent: usize,
    pub delivered: usize,
    pub failed: usize,
    pub pending: usize,
}

#[derive(Debug, Serialize)]
pub struct RecipientStatus {
    pub recipient: String,
    pub status: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MessageStatusDetail {
    pub message_id: String,
    pub subject: String,
    pub platform: String,
    pub total_recipients: usize,
    pub summary: DeliverySummary,
    pub recipients: Vec<RecipientStatus>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MessageStatusResponse {
    pub success: bool,
    pub message_id: String,
    pub status: MessageStatusDetail,
}

/// Query parameters for GET /api/v1/messages.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub platform: Option<String>,
    pub status: Option<i64>,
    pub from: Option<chrono::DateTime<chrono::Utc>>,
    pub to: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct ListMessagesResponse {
    pub success: bool,
    pub messages: Vec<Message>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub success: bool,
    pub message_id: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
}

/// POST /api/v1/messages/send
pub async fn send_message(
    State(state): State<GatewayState>,
    Extension(user): Extension<User>,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::validation(e.body_text()))?;

    req.validate().map_err(|fields| ApiError::Validation {
        message: "invalid request".to_string(),
        fields: Some(fields),
    })?;

    let outcome = state.service.send_message(&user.id, &req).await?;

    Ok((
        StatusCode::CREATED,
        Json(SendResponse {
            success: true,
            message_id: outcome.message_id,
            recipients_count: outcome.recipients_count,
            estimated_delivery: outcome.estimated_delivery,
            request_id: outcome.request_id,
        }),
    ))
}

/// POST /api/v1/messages/bulk
pub async fn bulk_send(
    State(state): State<GatewayState>,
    Extension(user): Extension<User>,
    body: Result<Json<BulkSendRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::validation(e.body_text()))?;
    if req.messages.is_empty() {
        return Err(ApiError::validation("messages must not be empty"));
    }

    let mut results = Vec::with_capacity(req.messages.len());
    for (index, entry) in req.messages.into_iter().enumerate() {
        let parsed: Result<SendMessageRequest, _> = serde_json::from_value(entry);
        let req = match parsed {
            Ok(req) => req,
            Err(e) => {
                results.push(BulkResult {
                    index,
                    success: false,
                    message_id: None,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        if let Err(fields) = req.validate() {
            let detail = fields
                .iter()
                .map(|(field, message)| format!("{field}: {message}"))
                .collect::<Vec<_>>()
                .join("; ");
            results.push(BulkResult {
                index,
                success: false,
                message_id: None,
                error: Some(detail),
            });
            continue;
        }

        match state.service.send_message(&user.id, &req).await {
            Ok(outcome) => results.push(BulkResult {
                index,
                success: true,
                message_id: Some(outcome.message_id),
                error: None,
            }),
            Err(e) => {
                error!(index, error = %e, "bulk: failed to send message");
                results.push(BulkResult {
                    index,
                    success: false,
                    message_id: None,
                    error: Some("Failed to process request".to_string()),
                });
            }
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    let total = results.len();
    Ok((
        StatusCode::CREATED,
        Json(BulkResponse {
            success: true,
            total,
            successful,
            failed: total - successful,
            results,
        }),
    ))
}

/// GET /api/v1/messages/{id}
pub async fn get_message_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_message_id(&id)?;

    let msg = state
        .messages
        .get_by_id(&id)
        .await
        .map_err(message_lookup_error)?;
    let recipients = state.recipients.get_by_message_id(&id).await?;

    let mut summary = DeliverySummary::default();
    let mut statuses = Vec::with_capacity(recipients.len());
    for r in &recipients {
        match r.status {
            MessageStatus::Queued => summary.queued += 1,
            MessageStatus::Processing => summary.processing += 1,
            MessageStatus::Sent => summary.sent += 1,
            MessageStatus::Delivered => summary.delivered += 1,
            MessageStatus::Failed => summary.failed += 1,
            MessageStatus::Pending => summary.pending += 1,
            MessageStatus::Cancelled | MessageStatus::Scheduled => {}
        }
        statuses.push(RecipientStatus {
            recipient: r.recipient.clone(),
            status: r.status.code(),
            sent_at: r.sent_at.clone(),
            delivered_at: r.delivered_at.clone(),
        });
    }

    Ok(Json(MessageStatusResponse {
        success: true,
        message_id: msg.id.clone(),
        status: MessageStatusDetail {
            message_id: msg.id.clone(),
            subject: msg.subject.clone(),
            platform: msg.platform.to_string(),
            total_recipients: recipients.len(),
            summary,
            recipients: statuses,
            created_at: msg.created_at,
        },
    }))
}

/// GET /api/v1/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Extension(user): Extension<User>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::validation(e.body_text()))?;

    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(ApiError::validation("page must be at least 1"));
    }
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(ApiError::validation(format!(
            "limit must be between 1 and {MAX_PAGE_SIZE}"
        )));
    }

    let platform = match &query.platform {
        None => None,
        Some(raw) => Some(raw.parse::<Platform>().map_err(|_| {
            ApiError::validation(format!("unknown platform {raw:?}"))
        })?),
    };
    let status = match query.status {
        None => None,
        Some(code) => Some(MessageStatus::from_code(code).ok_or_else(|| {
            ApiError::validation(format!("unknown status code {code}"))
        })?),
    };

    let filter = MessageFilter {
        platform,
        status,
        from: query.from.as_ref().map(format_timestamp),
        to: query.to.as_ref().map(format_timestamp),
    };

    let (messages, total) = state.messages.list(&user.id, filter, page, limit).await?;
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(ListMessagesResponse {
        success: true,
        messages,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    }))
}

/// DELETE /api/v1/messages/{id}
pub async fn cancel_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_message_id(&id)?;

    state
        .service
        .cancel_message(&id)
        .await
        .map_err(message_lookup_error)?;

    Ok(Json(CancelResponse {
        success: true,
        message_id: id,
        status: "cancelled".to_string(),
    }))
}

/// GET /health
pub async fn health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
    })
}

/// GET /metrics
pub async fn metrics(State(state): State<GatewayState>) -> impl IntoResponse {
    match &state.health.prometheus_render {
        Some(render) => (StatusCode::OK, render()),
        None => (StatusCode::NOT_FOUND, "metrics not enabled\n".to_string()),
    }
}

/// GET /version
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn parse_message_id(raw: &str) -> Result<String, ApiError> {
    uuid::Uuid::parse_str(raw)
        .map(|id| id.to_string())
        .map_err(|_| ApiError::validation("Invalid message ID format"))
}

fn message_lookup_error(err: courier_core::CourierError) -> ApiError {
    match err {
        courier_core::CourierError::NotFound => {
            ApiError::NotFound("Message not found".to_string())
        }
        other => other.into(),
    }
}
