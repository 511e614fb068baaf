//! Webhook payload and single-attempt sender.

use std::time::Duration;

use http::HeaderValue;
use http::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::outbox::WebhookEvent;
use crate::time::unix_seconds;

use super::{DeliveryError, HttpClient, HttpRequest};

/// JSON body POSTed to webhook endpoints.
///
/// ```json
/// {"event": "Connected", "timestamp": 1700000000, "data": {"jid": "123@s"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Event type name.
    pub event: String,
    /// Event creation time in Unix seconds.
    pub timestamp: i64,
    /// Opaque event data.
    pub data: Value,
}

impl From<&WebhookEvent> for WebhookPayload {
    fn from(event: &WebhookEvent) -> Self {
        Self {
            event: event.event_type.clone(),
            timestamp: unix_seconds(event.created_at),
            data: event.payload.clone(),
        }
    }
}

/// Stateless webhook sender.
///
/// Each call to [`WebhookSender::send`] issues exactly one POST with a JSON
/// body, fixed `Content-Type`/`User-Agent` headers, and a bounded timeout.
/// A response status below 400 counts as delivered.
///
/// # Example
///
/// ```
/// use chat_relay::webhook::{ReqwestClient, WebhookSender};
/// use std::time::Duration;
///
/// let sender = WebhookSender::new(ReqwestClient::new())
///     .with_timeout(Duration::from_secs(5));
/// assert_eq!(sender.timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct WebhookSender<H> {
    client: H,
    user_agent: HeaderValue,
    timeout: Duration,
}

impl<H> WebhookSender<H> {
    /// Default `User-Agent` header value.
    pub const DEFAULT_USER_AGENT: &'static str = "chat-relay-webhook/1.0";

    /// Default per-attempt timeout (10 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a sender with the default user agent and timeout.
    #[must_use]
    pub const fn new(client: H) -> Self {
        Self {
            client,
            user_agent: HeaderValue::from_static(Self::DEFAULT_USER_AGENT),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the `User-Agent` header value.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: HeaderValue) -> Self {
        self.user_agent = user_agent;
        self
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the per-attempt timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the `User-Agent` header value.
    #[must_use]
    pub const fn user_agent(&self) -> &HeaderValue {
        &self.user_agent
    }
}

impl<H: HttpClient> WebhookSender<H> {
    /// Builds the POST request for `payload`.
    fn build_request(
        &self,
        url: &str,
        payload: &WebhookPayload,
    ) -> Result<HttpRequest, DeliveryError> {
        let url = url::Url::parse(url).map_err(|e| DeliveryError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let body = serde_json::to_vec(payload)?;

        Ok(HttpRequest::post(url)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_header(USER_AGENT, self.user_agent.clone())
            .with_body(body)
            .with_timeout(self.timeout))
    }

    /// Delivers `payload` to `url` once.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError`] if the URL is invalid, the transport fails,
    /// or the endpoint answers with status 400 or above.
    pub async fn send(&self, url: &str, payload: &WebhookPayload) -> Result<(), DeliveryError> {
        let request = self.build_request(url, payload)?;
        let response = self.client.request(request).await?;

        if response.status.as_u16() < 400 {
            return Ok(());
        }

        Err(DeliveryError::Rejected {
            status: response.status,
            body: response.body_text().map(ToString::to_string),
        })
    }
}
