//! Liveness classification of HTTP responses.

use crate::types::KeywordSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Liveness verdict for one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    /// The server answered with status 404.
    RealNotFound,
    /// The server answered, but the page title says "not found".
    SoftNotFound,
    /// The endpoint exists.
    Alive,
}

impl Classification {
    pub fn is_alive(self) -> bool {
        matches!(self, Self::Alive)
    }

    /// Label used in reports and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RealNotFound => "REAL_NOT_FOUND",
            Self::SoftNotFound => "SOFT_NOT_FOUND",
            Self::Alive => "ALIVE",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a response from its status code and page title.
///
/// A 404 status is authoritative and short-circuits the keyword check.
/// Otherwise the title is matched case-insensitively against `keywords`;
/// an absent or empty title can never match.
pub fn classify(status: u16, title: Option<&str>, keywords: &KeywordSet) -> Classification {
    if status == 404 {
        return Classification::RealNotFound;
    }

    match title.and_then(|t| keywords.first_match(t)) {
        Some(_) => Classification::SoftNotFound,
        None => Classification::Alive,
    }
}
