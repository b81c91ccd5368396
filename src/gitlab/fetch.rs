// src/gitlab/fetch.rs
// =============================================================================
// The page fetcher: exactly one GET per call.
//
// A listing endpoint may be split over several pages; GitLab tells us how many
// in the `x-total-pages` response header. A missing header means "this is the
// only page" and is not an error. A header that is present but not a number is
// a decode error.
//
// The network sits behind the `Transport` trait so the walker above can be
// driven by the real HTTP client or by an in-memory fake in tests. Nothing in
// this file logs, caches or retries.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;

use super::error::FetchError;

/// Response header carrying the total page count.
pub const TOTAL_PAGES_HEADER: &str = "x-total-pages";

/// Request header carrying the personal access token.
pub const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// What a transport hands back for one request, before any interpretation.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Raw value of `x-total-pages`, if the header was sent.
    pub total_pages: Option<String>,
    pub body: Vec<u8>,
}

/// One decoded-enough response: status, body and the declared page count.
#[derive(Debug, Clone)]
pub struct Page {
    pub status: u16,
    pub body: Vec<u8>,
    /// `None` when the endpoint did not paginate.
    pub total_pages: Option<u32>,
}

impl Page {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single authenticated GET.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError>;
}

/// `Transport` backed by a shared reqwest client.
///
/// The token is installed as a default header, so every request made through
/// this client is authenticated.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        let mut token_value =
            HeaderValue::from_str(token).context("GITLAB_TOKEN is not a valid header value")?;
        token_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token_value);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<RawResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        let status = response.status().as_u16();
        let total_pages = response
            .headers()
            .get(TOTAL_PAGES_HEADER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::transport(url, e))?;

        Ok(RawResponse {
            status,
            total_pages,
            body: body.to_vec(),
        })
    }
}

/// Fetches one page and reads its declared page count.
pub async fn fetch_page(transport: &dyn Transport, url: &str) -> Result<Page, FetchError> {
    let raw = transport.get(url).await?;
    let total_pages = parse_total_pages(url, raw.total_pages.as_deref())?;

    Ok(Page {
        status: raw.status,
        body: raw.body,
        total_pages,
    })
}

/// An absent or blank header means a single page.
fn parse_total_pages(url: &str, header: Option<&str>) -> Result<Option<u32>, FetchError> {
    let value = match header.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(value) => value,
    };

    value.parse::<u32>().map(Some).map_err(|e| {
        FetchError::decode(
            format!("{} header of {}", TOTAL_PAGES_HEADER, url),
            e,
            value.as_bytes(),
        )
    })
}
