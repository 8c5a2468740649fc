//! Candidate endpoint records.
//!
//! A `UrlRecord` keeps the input line verbatim next to its parsed form.
//! Everything derived from it (path without query, extension, common prefix)
//! is computed on demand and never written back into the record.

use reqwest::Url;
use std::fmt;

/// One candidate endpoint read from a URL list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    raw: String,
    url: Url,
}

/// Error type for URL record parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlRecordError {
    #[error("empty line")]
    Empty,
    #[error("not an absolute URL: {0}")]
    Invalid(String),
    #[error("unsupported scheme '{1}' in {0}")]
    UnsupportedScheme(String, String),
}

impl UrlRecord {
    /// Parse one input line into a record.
    ///
    /// Surrounding whitespace is not part of the record; everything else is
    /// kept exactly as written.
    pub fn parse(line: &str) -> Result<Self, UrlRecordError> {
        let raw = line.trim();
        if raw.is_empty() {
            return Err(UrlRecordError::Empty);
        }

        let url = Url::parse(raw).map_err(|_| UrlRecordError::Invalid(raw.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(UrlRecordError::UnsupportedScheme(
                raw.to_string(),
                url.scheme().to_string(),
            ));
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The record exactly as it appeared in the input.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed URL used for requests.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Path with any query-like tail (`?`, `&`, `;`) and trailing slashes removed.
    pub fn path_without_query(&self) -> String {
        let path = self.url.path();
        let cut = path.find(['?', '&', ';']).unwrap_or(path.len());
        path[..cut].trim_end_matches('/').to_string()
    }

    /// Lower-cased file extension of the last path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let path = self.path_without_query();
        let segment = path.rsplit('/').next()?;
        let (stem, ext) = segment.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Scheme, authority and the parent directory of the path.
    ///
    /// `https://example.com/blog/2024/post` → `https://example.com/blog/2024`,
    /// a single segment is kept as is and an empty path yields the origin.
    pub fn common_prefix(&self) -> String {
        let path = self.path_without_query();
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
        let origin = self.origin();

        match parts.len() {
            0 => origin,
            1 => format!("{}/{}", origin, parts[0]),
            n => format!("{}/{}", origin, parts[..n - 1].join("/")),
        }
    }

    fn origin(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}://{}:{}", self.url.scheme(), self.host(), port),
            None => format!("{}://{}", self.url.scheme(), self.host()),
        }
    }
}

impl fmt::Display for UrlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
