//! HTTP fetching for the prober.
//!
//! The `Fetcher` trait is the seam between the retry state machine and the
//! network: the reqwest-backed `HttpFetcher` is used at runtime, tests plug in
//! scripted implementations.

use crate::error::{FetchResult, ProbeError};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;
use std::time::Duration;

/// Upper bound on the body bytes kept per response.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Longest title kept after cleanup.
const MAX_TITLE_CHARS: usize = 256;

/// Bytes of body inspected when looking for challenge markers.
const CHALLENGE_SCAN_BYTES: usize = 512;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// A structurally valid HTTP response, reduced to what classification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResponse {
    /// Final status code (after redirects).
    pub status: u16,
    /// URL the response was served from.
    pub final_url: String,
    /// Cleaned-up `<title>` text, if the page has one.
    pub title: Option<String>,
    /// Body, decoded lossily and capped at [`MAX_BODY_BYTES`].
    pub body: String,
}

impl PageResponse {
    pub fn new(status: u16, final_url: impl Into<String>) -> Self {
        Self {
            status,
            final_url: final_url.into(),
            title: None,
            body: String::new(),
        }
    }

    /// Set the body and derive the title from it.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self.title = extract_title(&self.body);
        self
    }

    /// A success response that carries no content at all.
    ///
    /// 204 is the one success status where an empty body is expected.
    pub fn is_empty(&self) -> bool {
        (200..300).contains(&self.status) && self.status != 204 && self.body.trim().is_empty()
    }

    /// Return the first challenge marker found in the title or body head.
    pub fn challenge_marker<'a>(&self, markers: &'a [String]) -> Option<&'a str> {
        let title = self.title.as_deref().unwrap_or_default().to_lowercase();
        let head = truncate_at_char_boundary(&self.body, CHALLENGE_SCAN_BYTES).to_lowercase();

        markers
            .iter()
            .map(String::as_str)
            .find(|m| !m.is_empty() && (title.contains(m) || head.contains(m)))
    }
}

/// Performs one HTTP request for the prober.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` once. Timeouts are applied by the caller as well, so
    /// implementations may rely on it.
    async fn fetch(&self, url: &Url) -> FetchResult<PageResponse>;
}

/// reqwest-backed fetcher.
///
/// Follows up to 10 redirects and accepts invalid certificates, which are
/// common on recon targets.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ProbeError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> FetchResult<PageResponse> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout
            } else {
                ProbeError::Body(e.to_string())
            }
        })? {
            let room = MAX_BODY_BYTES.saturating_sub(bytes.len());
            bytes.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if bytes.len() >= MAX_BODY_BYTES {
                break;
            }
        }

        Ok(PageResponse::new(status, final_url).with_body(String::from_utf8_lossy(&bytes)))
    }
}

fn map_request_error(e: reqwest::Error) -> ProbeError {
    if e.is_timeout() {
        ProbeError::Timeout
    } else if e.is_connect() {
        ProbeError::Connect(e.to_string())
    } else {
        ProbeError::Request(e.to_string())
    }
}

fn title_regex() -> Option<&'static Regex> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    TITLE
        .get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").ok())
        .as_ref()
}

/// Extract and clean the text of the first `<title>` element.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = title_regex()?.captures(html)?.get(1)?.as_str();

    let decoded = raw
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&");

    let collapsed = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    Some(collapsed.chars().take(MAX_TITLE_CHARS).collect())
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
