//! Webhook delivery over HTTP.
//!
//! This module provides:
//! - HTTP request/response value types ([`HttpRequest`], [`HttpResponse`])
//! - An HTTP client abstraction ([`HttpClient`]) and its reqwest implementation ([`ReqwestClient`])
//! - The webhook wire format ([`WebhookPayload`])
//! - A single-attempt sender ([`WebhookSender`])
//!
//! Retries are not handled here; the dispatcher re-polls pending rows.

mod client;
mod error;
mod http;
mod sender;

#[cfg(test)]
pub(crate) mod mock;


pub use client::ReqwestClient;
pub use error::{DeliveryError, HttpError};
pub use http::{HttpClient, HttpRequest, HttpResponse};
pub use sender::{WebhookPayload, WebhookSender};
