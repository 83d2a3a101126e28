// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS delivery via the Twilio REST API.
//!
//! Twilio takes a form-encoded POST with HTTP Basic auth and answers with a
//! JSON body carrying the message SID, the provider id later webhooks
//! correlate on.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::error;

use courier_core::{CourierError, Platform, SendReceipt, Sender};

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio credentials, environment-only.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub phone_number: String,
}

impl TwilioConfig {
    /// Read credentials from `TWILIO_ACCOUNT_SID`, `TWILIO_AUTH_TOKEN`, and
    /// `TWILIO_PHONE_NUMBER`. Returns `None` when the account SID is unset,
    /// which makes the channel fall back to the mock adapter.
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok()?;
        if account_sid.is_empty() {
            return None;
        }
        Some(Self {
            account_sid,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            phone_number: std::env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        })
    }
}

/// Sends SMS messages through Twilio.
pub struct TwilioSender {
    config: TwilioConfig,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TwilioResponse {
    sid: Option<String>,
    error_code: Option<i64>,
    error_message: Option<String>,
}

impl TwilioSender {
    pub fn new(config: TwilioConfig) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CourierError::Adapter {
                message: format!("failed to build twilio HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            config,
            client,
            base_url: TWILIO_API_BASE.to_string(),
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
impl Sender for TwilioSender {
    fn platform(&self) -> Platform {
        Platform::Sms
    }

    async fn send(
        &self,
        to: &str,
        _subject: &str,
        body: &str,
    ) -> Result<SendReceipt, CourierError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.base_url, self.config.account_sid
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&[
                ("To", to),
                ("From", self.config.phone_number.as_str()),
                ("Body", body),
            ])
            .send()
            .await
            .map_err(|e| CourierError::Adapter {
                message: format!("twilio request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        let parsed: TwilioResponse =
            response.json().await.map_err(|e| CourierError::Adapter {
                message: format!("failed to decode twilio response: {e}"),
                source: Some(Box::new(e)),
            })?;

        if status.as_u16() >= 400 || parsed.error_code.is_some() {
            let reason = parsed
                .error_message
                .unwrap_or_else(|| format!("status {status}"));
            error!(to, status = status.as_u16(), reason = reason.as_str(), "twilio send failed");
            return Err(CourierError::Adapter {
                message: format!("twilio error: {reason}"),
                source: None,
            });
        }

        let provider_id = parsed.sid.ok_or_else(|| CourierError::Adapter {
            message: "twilio response carried no message SID".into(),
            source: None,
        })?;

        Ok(SendReceipt { provider_id })
    }
}
