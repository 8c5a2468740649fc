//! Raw HTML capture of alive pages.

use super::artifact::write_atomic;
use crate::error::StorageResult;
use crate::types::UrlRecord;
use md5::{Digest, Md5};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Writes page bodies to a directory, skipping bodies already written.
///
/// Dedup is by MD5 of the body. Clones share the set of saved bodies, so
/// every worker of a run writes each distinct body at most once.
#[derive(Debug, Clone)]
pub struct HtmlDump {
    dir: PathBuf,
    seen: Arc<Mutex<HashSet<String>>>,
}

impl HtmlDump {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            seen: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Save `body` for `record`; returns the file written, or `None` for a
    /// duplicate body.
    pub fn save(&self, record: &UrlRecord, body: &str) -> StorageResult<Option<PathBuf>> {
        let hash = hex_md5(body.as_bytes());
        let fresh = self
            .seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hash);
        if !fresh {
            return Ok(None);
        }

        let path = self.dir.join(file_name(record));
        write_atomic(&path, body.as_bytes())?;
        tracing::debug!(url = record.as_str(), path = %path.display(), "saved HTML");
        Ok(Some(path))
    }
}

/// `<host[_port]>_<path with / replaced by _, or root>_<md5(url)[..8]>.html`
pub fn file_name(record: &UrlRecord) -> String {
    let url = record.url();
    let netloc = match url.port() {
        Some(port) => format!("{}_{}", record.host(), port),
        None => record.host().to_string(),
    };

    let path = url.path().trim_matches('/').replace('/', "_");
    let path = if path.is_empty() { "root".to_string() } else { path };

    let hash = hex_md5(record.as_str().as_bytes());
    format!("{}_{}_{}.html", netloc, path, &hash[..8])
}

fn hex_md5(bytes: &[u8]) -> String {
    format!("{:x}", Md5::digest(bytes))
}
