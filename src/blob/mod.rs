//! Durable media storage.

pub mod fs;
pub mod http;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use fs::FsBlobStore;
pub use http::{HttpBlobConfig, HttpBlobStore};
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage rejected upload: {status} {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid blob path: {0}")]
    InvalidPath(String),

    #[error("blob store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under `path` and returns a publicly resolvable URL.
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, BlobError>;
}

/// Relative, `/`-separated, no empty, `.` or `..` segments.
pub(crate) fn check_path(path: &str) -> Result<(), BlobError> {
    let valid = !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(BlobError::InvalidPath(path.to_string()))
    }
}
