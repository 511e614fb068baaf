//! Recording HTTP client for tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Mock HTTP client that replays a scripted sequence of outcomes.
///
/// Once the script is exhausted, every further request gets `fallback`.
#[derive(Debug)]
pub struct MockHttpClient {
    script: Mutex<VecDeque<Result<HttpResponse, HttpError>>>,
    fallback: http::StatusCode,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockHttpClient {
    /// Answers every request with `status`.
    pub fn always(status: u16) -> Self {
        Self::scripted(Vec::new(), status)
    }

    /// Replays `script`, then answers with `fallback`.
    pub fn scripted(script: Vec<Result<HttpResponse, HttpError>>, fallback: u16) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: http::StatusCode::from_u16(fallback).unwrap(),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Makes every request take `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Copies of every request received, in order.
    pub fn captured_requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Parsed JSON bodies of every request received.
    pub fn captured_bodies(&self) -> Vec<serde_json::Value> {
        self.captured_requests()
            .iter()
            .map(|r| serde_json::from_slice(r.body.as_deref().unwrap_or_default()).unwrap())
            .collect()
    }
}

impl HttpClient for MockHttpClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(req);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(HttpResponse::with_status(self.fallback)))
    }
}

impl HttpClient for std::sync::Arc<MockHttpClient> {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        (**self).request(req).await
    }
}
