//! Twilio Messages API client.

use super::{MessageReceipt, SmsProvider};
use crate::config::MessagingConfig;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Sends SMS through Twilio's REST API.
pub struct TwilioSms {
    /// Account SID, also the basic-auth user.
    account_sid: String,
    /// Auth token.
    auth_token: SecretString,
    /// Sender number.
    from_number: String,
    /// API base URL.
    api_base: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioSms {
    /// Default API base.
    pub const DEFAULT_API_BASE: &'static str = "https://api.twilio.com";

    /// Request timeout.
    pub const TIMEOUT: Duration = Duration::from_secs(20);

    /// Creates a Twilio client against the public API.
    ///
    /// Falls back to a default HTTP client if the configured one cannot be
    /// built.
    ///
    /// # Arguments
    ///
    /// * `account_sid` - Twilio account SID, also used as the basic-auth user
    /// * `auth_token` - Twilio auth token
    /// * `from_number` - Sending number in E.164 form
    #[must_use]
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: SecretString,
        from_number: impl Into<String>,
    ) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Self::TIMEOUT)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("Failed to build Twilio HTTP client: {err}");
                reqwest::blocking::Client::new()
            });
        Self {
            account_sid: account_sid.into(),
            auth_token,
            from_number: from_number.into(),
            api_base: Self::DEFAULT_API_BASE.to_string(),
            client,
        }
    }

    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConfigured`] naming the first missing credential.
    pub fn from_config(config: &MessagingConfig) -> Result<Self> {
        let missing = |what: &str| Error::NotConfigured(format!("twilio {what}"));
        let sid = config.account_sid.clone().ok_or_else(|| missing("account_sid"))?;
        let token = config.auth_token.clone().ok_or_else(|| missing("auth_token"))?;
        let from = config.from_number.clone().ok_or_else(|| missing("from_number"))?;
        Ok(Self::new(sid, token, from).with_api_base(config.api_base.clone()))
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Messages endpoint for this account.
    #[must_use]
    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base, self.account_sid
        )
    }
}

impl SmsProvider for TwilioSms {
    fn name(&self) -> &'static str {
        "twilio"
    }

    fn send(&self, to: &str, body: &str) -> Result<MessageReceipt> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else {
                    "request"
                };
                tracing::error!(provider = "twilio", error = %e, error_kind, "SMS request failed");
                Error::operation("sms_send", format!("{error_kind} error: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|err| {
                    err.message
                        .map(|m| err.code.map_or_else(|| m.clone(), |c| format!("{c}: {m}")))
                })
                .unwrap_or(body);
            tracing::warn!(provider = "twilio", status = %status, detail = %detail, "SMS rejected");
            return Err(Error::operation(
                "sms_send",
                format!("HTTP {status}: {detail}"),
            ));
        }

        let message: MessageResponse = response
            .json()
            .map_err(|e| Error::operation("sms_response", e))?;
        Ok(MessageReceipt { sid: message.sid })
    }
}
