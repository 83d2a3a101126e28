// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Router-level tests for the gateway: auth, validation, rate limiting,
//! message endpoints, and webhook reconciliation.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use tower::ServiceExt;

use courier_config::model::RateLimitConfig;
use courier_core::types::{MessageStatus, Platform};
use courier_gateway::{
    build_router, GatewayState, HealthState, MemoryCounterStore, RateLimitState,
};
use courier_test_utils::{TestHarness, TEST_API_KEY};

fn state_for(harness: &TestHarness, rate_config: RateLimitConfig) -> GatewayState {
    GatewayState {
        service: Arc::new(harness.service.clone()),
        users: harness.users.clone(),
        messages: harness.messages.clone(),
        recipients: harness.recipients.clone(),
        rate_limit: RateLimitState {
            store: Arc::new(MemoryCounterStore::new()),
            config: rate_config,
        },
        health: HealthState {
            start_time: Instant::now(),
            prometheus_render: None,
        },
    }
}

fn default_state(harness: &TestHarness) -> GatewayState {
    state_for(harness, RateLimitConfig::default())
}

async fn call(
    state: &GatewayState,
    method: Method,
    uri: &str,
    api_key: Option<&str>,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value, HeaderMap) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json, headers)
}

fn send_body(to: Vec<&str>) -> serde_json::Value {
    serde_json::json!({
        "subject": "S",
        "message": "B",
        "from": "X",
        "to": to,
        "platform": "sms"
    })
}

// ---- Authentication ----

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        None,
        Some(send_body(vec!["+1"])),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    // No rows were written.
    let (rows, total) = harness
        .messages
        .list(&harness.user.id, Default::default(), 1, 20)
        .await
        .unwrap();
    assert!(rows.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn invalid_api_key_is_unauthorized() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::GET,
        "/api/v1/messages",
        Some("wrong-key"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid API key");
}

#[tokio::test]
async fn disabled_account_is_forbidden() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let now = courier_core::types::now_timestamp();
    harness
        .users
        .insert(&courier_core::User {
            id: "u-disabled".into(),
            email: "disabled@example.com".into(),
            api_key_hash: courier_core::hash_api_key("disabled-key"),
            role: "user".into(),
            rate_limit_tier: "free".into(),
            is_active: false,
            created_at: now.clone(),
            updated_at: now,
        })
        .await
        .unwrap();

    let (status, body, _) = call(
        &state,
        Method::GET,
        "/api/v1/messages",
        Some("disabled-key"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(body["error"]["message"], "Account is disabled");
}

// ---- Send ----

#[tokio::test]
async fn send_persists_and_stages_events() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(send_body(vec!["+15550001111", "+15550002222"])),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["recipients_count"], 2);
    assert!(body["message_id"].as_str().is_some());
    assert!(body["request_id"].as_str().is_some());
    assert!(body["estimated_delivery"].as_str().is_some());

    let message_id = body["message_id"].as_str().unwrap();
    let msg = harness.messages.get_by_id(message_id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Queued);

    let recipients = harness.recipients.get_by_message_id(message_id).await.unwrap();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.iter().all(|r| r.status == MessageStatus::Pending));

    assert_eq!(
        harness
            .broker
            .count(Platform::Sms.routing_key(), "pending")
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn send_rejects_invalid_request_with_field_detail() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(send_body(vec![])),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["to"].as_str().is_some());

    let (_, total) = harness
        .messages
        .list(&harness.user.id, Default::default(), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn send_rejects_unknown_platform() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let mut body = send_body(vec!["+1"]);
    body["platform"] = serde_json::json!("pigeon");
    let (status, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(body),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ---- Bulk ----

#[tokio::test]
async fn bulk_reports_per_index_results() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/bulk",
        Some(TEST_API_KEY),
        Some(serde_json::json!({
            "messages": [
                send_body(vec!["+1"]),
                send_body(vec![]),
                send_body(vec!["+2"]),
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 3);
    assert_eq!(body["successful"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][0]["success"], true);
    assert_eq!(body["results"][1]["success"], false);
    assert_eq!(body["results"][1]["index"], 1);
    assert!(body["results"][1]["error"].as_str().unwrap().contains("to"));
    assert_eq!(body["results"][2]["success"], true);

    // Only the two valid entries became rows.
    let (_, total) = harness
        .messages
        .list(&harness.user.id, Default::default(), 1, 20)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

// ---- Status and listing ----

#[tokio::test]
async fn get_message_status_aggregates_recipients() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (_, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(send_body(vec!["+1", "+2", "+3"])),
    )
    .await;
    let message_id = body["message_id"].as_str().unwrap().to_string();

    // Drive one recipient to sent so the summary is mixed.
    let recipients = harness.recipients.get_by_message_id(&message_id).await.unwrap();
    harness
        .recipients
        .update_status(&recipients[0].id, MessageStatus::Sent, Some("SM1".into()), None)
        .await
        .unwrap();

    let (status, body, _) = call(
        &state,
        Method::GET,
        &format!("/api/v1/messages/{message_id}"),
        Some(TEST_API_KEY),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"]["total_recipients"], 3);
    assert_eq!(body["status"]["summary"]["pending"], 2);
    assert_eq!(body["status"]["summary"]["sent"], 1);
    assert_eq!(body["status"]["recipients"].as_array().unwrap().len(), 3);
    assert_eq!(body["status"]["platform"], "sms");
}

#[tokio::test]
async fn get_message_status_handles_bad_ids() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(
        &state,
        Method::GET,
        "/api/v1/messages/not-a-uuid",
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let ghost = uuid::Uuid::new_v4();
    let (status, body, _) = call(
        &state,
        Method::GET,
        &format!("/api/v1/messages/{ghost}"),
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn list_messages_paginates() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    for i in 0..3 {
        call(
            &state,
            Method::POST,
            "/api/v1/messages/send",
            Some(TEST_API_KEY),
            Some(send_body(vec![&format!("+1555000{i:04}")])),
        )
        .await;
    }

    let (status, body, _) = call(
        &state,
        Method::GET,
        "/api/v1/messages?page=1&limit=2",
        Some(TEST_API_KEY),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["total_pages"], 2);
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);

    let (status, body, _) = call(
        &state,
        Method::GET,
        "/api/v1/messages?limit=500",
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

// ---- Cancel ----

#[tokio::test]
async fn cancel_only_applies_to_scheduled_messages() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let mut scheduled = send_body(vec!["+1"]);
    scheduled["scheduled_at"] =
        serde_json::json!((chrono::Utc::now() + chrono::Duration::hours(1)).to_rfc3339());
    let (_, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(scheduled),
    )
    .await;
    let scheduled_id = body["message_id"].as_str().unwrap().to_string();

    let (status, body, _) = call(
        &state,
        Method::DELETE,
        &format!("/api/v1/messages/{scheduled_id}"),
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    let msg = harness.messages.get_by_id(&scheduled_id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Cancelled);

    // Cancelling an immediate (queued) message conflicts.
    let (_, body, _) = call(
        &state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(send_body(vec!["+1"])),
    )
    .await;
    let queued_id = body["message_id"].as_str().unwrap().to_string();

    let (status, body, _) = call(
        &state,
        Method::DELETE,
        &format!("/api/v1/messages/{queued_id}"),
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_STATE");

    let msg = harness.messages.get_by_id(&queued_id).await.unwrap();
    assert_eq!(msg.status, MessageStatus::Queued);
}

// ---- Rate limiting ----

#[tokio::test]
async fn rate_limit_admits_limit_then_rejects() {
    let harness = TestHarness::new().await.unwrap();
    let mut config = RateLimitConfig::default();
    config.tiers.insert("free".to_string(), 2);
    let state = state_for(&harness, config);

    for expected_remaining in [1, 0] {
        let (status, _, headers) = call(
            &state,
            Method::GET,
            "/api/v1/messages",
            Some(TEST_API_KEY),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-ratelimit-limit"], "2");
        assert_eq!(
            headers["x-ratelimit-remaining"],
            expected_remaining.to_string().as_str()
        );
        assert!(headers.contains_key("x-ratelimit-reset"));
    }

    let (status, body, headers) = call(
        &state,
        Method::GET,
        "/api/v1/messages",
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");
    assert_eq!(headers["x-ratelimit-remaining"], "0");
}

#[tokio::test]
async fn rate_limit_disabled_skips_headers() {
    let harness = TestHarness::new().await.unwrap();
    let config = RateLimitConfig {
        enabled: false,
        ..RateLimitConfig::default()
    };
    let state = state_for(&harness, config);

    let (status, _, headers) = call(
        &state,
        Method::GET,
        "/api/v1/messages",
        Some(TEST_API_KEY),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key("x-ratelimit-limit"));
}

// ---- Webhooks ----

async fn ingest_and_mark_sent(
    harness: &TestHarness,
    state: &GatewayState,
    platform: &str,
    provider_id: &str,
) -> String {
    let mut body = send_body(vec!["target"]);
    body["platform"] = serde_json::json!(platform);
    let (_, response, _) = call(
        state,
        Method::POST,
        "/api/v1/messages/send",
        Some(TEST_API_KEY),
        Some(body),
    )
    .await;
    let message_id = response["message_id"].as_str().unwrap().to_string();

    let recipients = harness.recipients.get_by_message_id(&message_id).await.unwrap();
    harness
        .recipients
        .update_status(
            &recipients[0].id,
            MessageStatus::Sent,
            Some(provider_id.to_string()),
            None,
        )
        .await
        .unwrap();
    recipients[0].id.clone()
}

async fn post_form(state: &GatewayState, uri: &str, body: &str) -> StatusCode {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    build_router(state.clone())
        .oneshot(request)
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn twilio_delivered_callback_transitions_recipient() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);
    let recipient_id = ingest_and_mark_sent(&harness, &state, "sms", "SID1").await;

    let status = post_form(
        &state,
        "/webhooks/twilio",
        "MessageSid=SID1&MessageStatus=delivered",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let recipient = harness.recipients.get_by_provider_id("SID1").await.unwrap();
    assert_eq!(recipient.id, recipient_id);
    assert_eq!(recipient.status, MessageStatus::Delivered);
    assert!(recipient.delivered_at.is_some());
    assert!(recipient.sent_at.is_some());
}

#[tokio::test]
async fn twilio_duplicate_and_late_callbacks_are_idempotent() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);
    ingest_and_mark_sent(&harness, &state, "sms", "SID2").await;

    for _ in 0..2 {
        let status = post_form(
            &state,
            "/webhooks/twilio",
            "MessageSid=SID2&MessageStatus=delivered",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    // A stale "sent" callback after delivered must not regress.
    let status = post_form(
        &state,
        "/webhooks/twilio",
        "MessageSid=SID2&MessageStatus=sent",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let recipient = harness.recipients.get_by_provider_id("SID2").await.unwrap();
    assert_eq!(recipient.status, MessageStatus::Delivered);
}

#[tokio::test]
async fn twilio_unknown_sid_and_status_are_acked() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    // Unknown provider id: 200 so the provider does not retry.
    let status = post_form(
        &state,
        "/webhooks/twilio",
        "MessageSid=SID-ghost&MessageStatus=delivered",
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Unknown status string: acknowledged no-op.
    ingest_and_mark_sent(&harness, &state, "sms", "SID3").await;
    let status = post_form(
        &state,
        "/webhooks/twilio",
        "MessageSid=SID3&MessageStatus=queued",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let recipient = harness.recipients.get_by_provider_id("SID3").await.unwrap();
    assert_eq!(recipient.status, MessageStatus::Sent);

    // Missing fields: bad request.
    let status = post_form(&state, "/webhooks/twilio", "MessageSid=SID3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn sendgrid_events_reconcile_with_filter_suffix() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);
    ingest_and_mark_sent(&harness, &state, "email", "sg-abc").await;

    let (status, _, _) = call(
        &state,
        Method::POST,
        "/webhooks/sendgrid",
        None,
        Some(serde_json::json!([
            { "sg_message_id": "sg-abc.filter0001.recv", "event": "delivered",
              "email": "target", "timestamp": 1700000000 },
            { "sg_message_id": "sg-ghost", "event": "bounce",
              "email": "ghost@example.com", "timestamp": 1700000000, "reason": "mailbox full" },
            { "sg_message_id": "sg-abc", "event": "open",
              "email": "target", "timestamp": 1700000001 }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let recipient = harness.recipients.get_by_provider_id("sg-abc").await.unwrap();
    assert_eq!(recipient.status, MessageStatus::Delivered);
    assert!(recipient.delivered_at.is_some());
}

#[tokio::test]
async fn sendgrid_bounce_marks_failed_with_reason() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);
    ingest_and_mark_sent(&harness, &state, "email", "sg-bounce").await;

    let (status, _, _) = call(
        &state,
        Method::POST,
        "/webhooks/sendgrid",
        None,
        Some(serde_json::json!([
            { "sg_message_id": "sg-bounce", "event": "bounce",
              "email": "target", "timestamp": 1700000000, "reason": "550 user unknown" }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let recipient = harness
        .recipients
        .get_by_provider_id("sg-bounce")
        .await
        .unwrap();
    assert_eq!(recipient.status, MessageStatus::Failed);
    assert_eq!(recipient.error_message.as_deref(), Some("550 user unknown"));
}

// ---- Public endpoints ----

#[tokio::test]
async fn health_and_version_are_public() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, body, _) = call(&state, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].as_str().is_some());

    let (status, body, _) = call(&state, Method::GET, "/version", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn metrics_endpoint_reports_absence_without_recorder() {
    let harness = TestHarness::new().await.unwrap();
    let state = default_state(&harness);

    let (status, _, _) = call(&state, Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
