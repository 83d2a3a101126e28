// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider webhook reconciliation.
//!
//! Callbacks correlate on the provider id recorded at send time and feed
//! the same rank-guarded status transition the worker uses, so duplicates
//! and out-of-order callbacks are harmless. Response discipline: 5xx only
//! for internal storage failures (the provider should retry); anything
//! wrong with the payload itself gets 200 so the provider stops.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Form, Json};
use serde::Deserialize;
use tracing::{error, info, warn};

use courier_core::types::MessageStatus;
use courier_core::CourierError;

use crate::server::GatewayState;

/// Twilio form-encoded status callback.
#[derive(Debug, Deserialize)]
pub struct TwilioCallback {
    #[serde(rename = "MessageSid", default)]
    pub message_sid: String,
    #[serde(rename = "MessageStatus", default)]
    pub message_status: String,
}

fn map_twilio_status(status: &str) -> Option<MessageStatus> {
    match status {
        "sent" => Some(MessageStatus::Sent),
        "delivered" => Some(MessageStatus::Delivered),
        "undelivered" | "failed" => Some(MessageStatus::Failed),
        _ => None,
    }
}

/// POST /webhooks/twilio
pub async fn twilio_webhook(
    State(state): State<GatewayState>,
    Form(callback): Form<TwilioCallback>,
) -> StatusCode {
    let sid = callback.message_sid;
    let status = callback.message_status.to_lowercase();

    if sid.is_empty() || status.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    let Some(internal) = map_twilio_status(&status) else {
        warn!(sid = sid.as_str(), status = status.as_str(), "unknown twilio status, ignoring");
        return StatusCode::OK;
    };

    let recipient = match state.recipients.get_by_provider_id(&sid).await {
        Ok(recipient) => recipient,
        Err(CourierError::NotFound) => {
            warn!(sid = sid.as_str(), "twilio webhook: no recipient for SID");
            // Ack so the provider does not retry.
            return StatusCode::OK;
        }
        Err(e) => {
            error!(sid = sid.as_str(), error = %e, "twilio webhook: recipient lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if let Err(e) = state
        .recipients
        .update_status(&recipient.id, internal, Some(sid.clone()), None)
        .await
    {
        error!(sid = sid.as_str(), error = %e, "twilio webhook: status update failed");
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    info!(
        sid = sid.as_str(),
        status = status.as_str(),
        recipient_id = recipient.id.as_str(),
        "twilio webhook: recipient status updated"
    );
    StatusCode::OK
}

/// One entry of the SendGrid event webhook payload.
#[derive(Debug, Deserialize)]
pub struct SendGridEvent {
    #[serde(default)]
    pub sg_message_id: String,
    #[serde(default)]
    pub event: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

fn map_sendgrid_event(event: &str) -> Option<MessageStatus> {
    match event {
        "delivered" => Some(MessageStatus::Delivered),
        "bounce" | "dropped" => Some(MessageStatus::Failed),
        _ => None,
    }
}

/// SendGrid appends a ".filter..." suffix to `sg_message_id`; strip it
/// before lookup.
fn clean_sendgrid_message_id(id: &str) -> &str {
    match id.find(".filter") {
        Some(idx) => &id[..idx],
        None => id,
    }
}

/// POST /webhooks/sendgrid
pub async fn sendgrid_webhook(
    State(state): State<GatewayState>,
    Json(events): Json<Vec<SendGridEvent>>,
) -> StatusCode {
    for event in &events {
        // Unhandled event types (open, click, ...) are skipped.
        let Some(internal) = map_sendgrid_event(event.event.as_str()) else {
            continue;
        };

        let provider_id = clean_sendgrid_message_id(&event.sg_message_id);
        if provider_id.is_empty() {
            continue;
        }

        let recipient = match state.recipients.get_by_provider_id(provider_id).await {
            Ok(recipient) => recipient,
            Err(CourierError::NotFound) => {
                warn!(sg_message_id = provider_id, "sendgrid webhook: recipient not found");
                continue;
            }
            Err(e) => {
                error!(sg_message_id = provider_id, error = %e, "sendgrid webhook: lookup failed");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        };

        if let Err(e) = state
            .recipients
            .update_status(
                &recipient.id,
                internal,
                Some(provider_id.to_string()),
                event.reason.clone(),
            )
            .await
        {
            error!(sg_message_id = provider_id, error = %e, "sendgrid webhook: status update failed");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }

        info!(
            sg_message_id = provider_id,
            event = event.event.as_str(),
            recipient_id = recipient.id.as_str(),
            "sendgrid webhook: recipient status updated"
        );
    }

    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twilio_status_mapping_table() {
        assert_eq!(map_twilio_status("sent"), Some(MessageStatus::Sent));
        assert_eq!(map_twilio_status("delivered"), Some(MessageStatus::Delivered));
        assert_eq!(map_twilio_status("undelivered"), Some(MessageStatus::Failed));
        assert_eq!(map_twilio_status("failed"), Some(MessageStatus::Failed));
        assert_eq!(map_twilio_status("queued"), None);
    }

    #[test]
    fn sendgrid_event_mapping_table() {
        assert_eq!(map_sendgrid_event("delivered"), Some(MessageStatus::Delivered));
        assert_eq!(map_sendgrid_event("bounce"), Some(MessageStatus::Failed));
        assert_eq!(map_sendgrid_event("dropped"), Some(MessageStatus::Failed));
        assert_eq!(map_sendgrid_event("open"), None);
        assert_eq!(map_sendgrid_event("click"), None);
    }

    #[test]
    fn filter_suffix_is_stripped() {
        assert_eq!(
            clean_sendgrid_message_id("abc123.filter0001.recv"),
            "abc123"
        );
        assert_eq!(clean_sendgrid_message_id("abc123"), "abc123");
        assert_eq!(clean_sendgrid_message_id(".filterX"), "");
    }

    #[test]
    fn sendgrid_event_tolerates_missing_fields() {
        let event: SendGridEvent = serde_json::from_str(r#"{"event":"open"}"#).unwrap();
        assert_eq!(event.event, "open");
        assert!(event.sg_message_id.is_empty());
        assert!(event.reason.is_none());
        assert_eq!(event.timestamp, 0);
    }
}
