// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Email delivery via the SendGrid v3 API.
//!
//! SendGrid takes a JSON POST with Bearer auth and returns the message id in
//! the `X-Message-Id` response header.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::error;

use courier_core::{CourierError, Platform, SendReceipt, Sender};

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

/// SendGrid credentials, environment-only.
#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: String,
    pub from_email: String,
}

impl SendGridConfig {
    /// Read credentials from `SENDGRID_API_KEY` and `SENDGRID_FROM_EMAIL`.
    /// Returns `None` when the API key is unset, which makes the channel
    /// fall back to the mock adapter.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("SENDGRID_API_KEY").ok()?;
        if api_key.is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            from_email: std::env::var("SENDGRID_FROM_EMAIL").unwrap_or_default(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    personalizations: Vec<Personalization<'a>>,
    from: EmailAddress<'a>,
    subject: &'a str,
    content: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: Vec<EmailAddress<'a>>,
}

#[derive(Debug, Serialize)]
struct EmailAddress<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

/// Sends email through SendGrid.
pub struct SendGridSender {
    config: SendGridConfig,
    client: reqwest::Client,
    base_url: String,
}

impl SendGridSender {
    pub fn new(config: SendGridConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CourierError::Adapter {
                message: format!("failed to build sendgrid HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            config,
            client,
            base_url: SENDGRID_API_BASE.to_string(),
        })
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }
}

#[async_trait]
impl Sender for SendGridSender {
    fn platform(&self) -> Platform {
        Platform::Email
    }

    async fn send(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<SendReceipt, CourierError> {
        let payload = MailRequest {
            personalizations: vec![Personalization {
                to: vec![EmailAddress { email: to }],
            }],
            from: EmailAddress {
                email: &self.config.from_email,
            },
            subject,
            content: vec![Content {
                content_type: "text/plain",
                value: body,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CourierError::Adapter {
                message: format!("sendgrid request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            error!(to, status = status.as_u16(), "sendgrid send failed");
            return Err(CourierError::Adapter {
                message: format!("sendgrid error: status {status}"),
                source: None,
            });
        }

        // SendGrid returns the message id in the X-Message-Id header.
        let provider_id = response
            .headers()
            .get("X-Message-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| format!("sg-{to}"));

        Ok(SendReceipt { provider_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_sender(base_url: String) -> SendGridSender {
        SendGridSender::new(SendGridConfig {
            api_key: "SG.key".into(),
            from_email: "noreply@example.com".into(),
        })
        .unwrap()
        .with_base_url(base_url)
    }

    #[tokio::test]
    async fn accepted_send_returns_header_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.key"))
            .and(body_partial_json(serde_json::json!({
                "subject": "Greetings",
                "from": { "email": "noreply@example.com" }
            })))
            .respond_with(
                ResponseTemplate::new(202).insert_header("X-Message-Id", "sg-msg-1"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sender = make_sender(server.uri());
        let receipt = sender
            .send("dev@example.com", "Greetings", "Hello")
            .await
            .unwrap();
        assert_eq!(receipt.provider_id, "sg-msg-1");
    }

    #[tokio::test]
    async fn missing_message_id_header_falls_back() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let sender = make_sender(server.uri());
        let receipt = sender.send("dev@example.com", "S", "B").await.unwrap();
        assert_eq!(receipt.provider_id, "sg-dev@example.com");
    }

    #[tokio::test]
    async fn rejection_is_an_adapter_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let sender = make_sender(server.uri());
        let err = sender.send("dev@example.com", "S", "B").await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }
}
