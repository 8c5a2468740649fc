//! Recon target type.
//!
//! A target is an opaque domain or host string that scopes one pipeline run.
//! It ends up in directory names and in external command lines, so parsing
//! rejects anything beyond a conservative host character set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A validated recon target (domain or host).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target(String);

/// Error type for target parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("target cannot be empty")]
    Empty,
    #[error("invalid character {1:?} in target '{0}'")]
    InvalidCharacter(String, char),
    #[error("target '{0}' cannot start with '.' or '-'")]
    InvalidStart(String),
    #[error("target is longer than {0} characters")]
    TooLong(usize),
}

impl Target {
    /// Maximum accepted length, the DNS limit for a full name.
    pub const MAX_LEN: usize = 253;

    /// Parse and validate a target string.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TargetError::Empty);
        }

        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':')))
        {
            return Err(TargetError::InvalidCharacter(s.to_string(), c));
        }

        if s.starts_with('.') || s.starts_with('-') {
            return Err(TargetError::InvalidStart(s.to_string()));
        }
        if s.len() > Self::MAX_LEN {
            return Err(TargetError::TooLong(Self::MAX_LEN));
        }

        Ok(Self(s.to_ascii_lowercase()))
    }

    /// The target as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory-safe name (`:` replaced, for host:port targets).
    pub fn dir_name(&self) -> String {
        self.0.replace(':', "_")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Target {
    type Error = TargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> Self {
        target.0
    }
}
