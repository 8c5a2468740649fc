//! Core type definitions using newtype patterns for type safety.
//!
//! Parsing happens once at the edge; everything past it works with
//! validated values.

mod keywords;
mod run_id;
mod target;
mod url_record;

pub use keywords::{KeywordError, KeywordSet, DEFAULT_NOT_FOUND_KEYWORDS};
pub use run_id::{RunId, RunIdError};
pub use target::{Target, TargetError};
pub use url_record::{UrlRecord, UrlRecordError};
