// src/gitlab/testing.rs
// =============================================================================
// In-memory `Transport` for tests.
//
// Responses are scripted per exact URL. Every call is recorded, and the fake
// keeps track of how many requests were in flight at once so tests can check
// pool widths. URLs without a script answer with a transport failure.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::error::FetchError;
use super::fetch::{RawResponse, Transport};

enum Script {
    Respond(RawResponse),
    Fail(String),
}

#[derive(Default)]
pub struct FakeTransport {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<String>>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn respond(&self, url: &str, status: u16, total_pages: Option<&str>, body: &[u8]) {
        self.scripts.lock().unwrap().insert(
            url.to_string(),
            Script::Respond(RawResponse {
                status,
                total_pages: total_pages.map(str::to_string),
                body: body.to_vec(),
            }),
        );
    }

    pub fn respond_json(&self, url: &str, total_pages: Option<&str>, body: serde_json::Value) {
        self.respond(url, 200, total_pages, body.to_string().as_bytes());
    }

    pub fn fail(&self, url: &str, message: &str) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), Script::Fail(message.to_string()));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = match self.scripts.lock().unwrap().get(url) {
            Some(Script::Respond(raw)) => Ok(raw.clone()),
            Some(Script::Fail(message)) => Err(FetchError::transport(url, message.as_str())),
            None => Err(FetchError::transport(url, "no route scripted")),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
