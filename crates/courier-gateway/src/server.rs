// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Public routes (health, metrics, version, provider webhooks) are
//! unauthenticated; the `/api/v1` message routes run behind the API-key
//! auth middleware and the per-user rate limiter.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::Request;
use axum::middleware as axum_middleware;
use axum::middleware::Next;
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use courier_config::model::ServerConfig;
use courier_core::CourierError;
use courier_dispatch::DispatchService;
use courier_metrics::record_http_request;
use courier_storage::{MessageRepository, RecipientRepository, UserRepository};

use crate::auth::auth_middleware;
use crate::ratelimit::{rate_limit_middleware, RateLimitState};
use crate::{handlers, webhooks};

/// State for the unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub service: Arc<DispatchService>,
    pub users: UserRepository,
    pub messages: MessageRepository,
    pub recipients: RecipientRepository,
    pub rate_limit: RateLimitState,
    pub health: HealthState,
}

/// Assemble the full route tree over the given state.
///
/// Exposed separately from [`start_server`] so tests can drive the router
/// without binding a socket.
pub fn build_router(state: GatewayState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/version", get(handlers::version))
        .route("/webhooks/twilio", post(webhooks::twilio_webhook))
        .route("/webhooks/sendgrid", post(webhooks::sendgrid_webhook))
        .with_state(state.clone());

    // Layer order: auth is added last, so it runs first and the rate
    // limiter can key on the authenticated user.
    let api_routes = Router::new()
        .route("/messages/send", post(handlers::send_message))
        .route("/messages/bulk", post(handlers::bulk_send))
        .route("/messages", get(handlers::list_messages))
        .route(
            "/messages/{id}",
            get(handlers::get_message_status).delete(handlers::cancel_message),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(axum_middleware::from_fn(track_metrics))
}

/// Record request count and latency for every response.
async fn track_metrics(request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    record_http_request(
        &method,
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Bind and serve until `cancel` fires, then drain in-flight requests.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    cancel: CancellationToken,
) -> Result<(), CourierError> {
    let app = build_router(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    info!(addr = addr.as_str(), "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| CourierError::Internal(format!("gateway server error: {e}")))?;

    info!("gateway stopped");
    Ok(())
}
