use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::blob::{BlobError, BlobStore, check_path};

#[derive(Clone, Debug)]
pub struct HttpBlobConfig {
    /// Storage API root, e.g. `https://storage.example.com/storage/v1`.
    pub base_url: String,
    pub bucket: String,
    pub token: String,
}

/// Uploads blobs to an object-storage REST API.
///
/// Objects are written with `POST {base}/object/{bucket}/{path}` and served
/// from `{base}/object/public/{bucket}/{path}`.
pub struct HttpBlobStore {
    client: Client,
    config: HttpBlobConfig,
}

impl HttpBlobStore {
    pub fn new(config: HttpBlobConfig) -> Result<Self, BlobError> {
        let client = Client::builder().build()?;
        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn upload_url(&self, path: &str) -> String {
        format!("{}/object/{}/{}", self.base(), self.config.bucket, path)
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/object/public/{}/{}", self.base(), self.config.bucket, path)
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        check_path(path)?;
        let len = bytes.len();

        let response = self
            .client
            .post(self.upload_url(path))
            .header("Authorization", format!("Bearer {}", self.config.token))
            .header(
                "Content-Type",
                content_type.unwrap_or("application/octet-stream"),
            )
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("upload of {} failed: {} {}", path, status, body);
            return Err(BlobError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("uploaded {} bytes to {}", len, path);
        Ok(self.public_url(path))
    }
}
