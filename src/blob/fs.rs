use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::blob::{BlobError, BlobStore, check_path};

/// Stores blobs as files under `root`, served from `public_base_url`.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub async fn new(root: &Path, public_base_url: impl Into<String>) -> Result<Self, BlobError> {
        fs::create_dir_all(root).await?;

        Ok(Self {
            root: root.to_owned(),
            public_base_url: public_base_url.into(),
        })
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        check_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, &bytes).await?;
        debug!("stored {} bytes at {}", bytes.len(), target.display());

        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            path
        ))
    }
}
