use thiserror::Error;

use crate::blob::BlobError;
use crate::store::{StoreError, StoreOp, Table};

#[derive(Debug, Error)]
#[error("upload to {path} failed: {source}")]
pub struct UploadError {
    pub path: String,
    #[source]
    pub source: BlobError,
}

#[derive(Debug, Error)]
pub enum DependencyError {
    #[error("instructor photo upload failed: {0}")]
    Upload(#[source] UploadError),

    #[error("instructor insert failed: {0}")]
    Insert(#[source] StoreError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid course tree at {path}: {reason}")]
    Validation { path: String, reason: String },

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("instructor resolution failed: {0}")]
    Dependency(#[from] DependencyError),

    #[error("{op} on {table} failed ({target}): {source}")]
    Persistence {
        table: Table,
        op: StoreOp,
        target: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn validation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        SyncError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Attaches table/operation/target context to a store result.
pub trait StoreResultExt<T> {
    fn context(self, table: Table, op: StoreOp, target: impl Into<String>) -> Result<T, SyncError>;
}

impl<T> StoreResultExt<T> for Result<T, StoreError> {
    fn context(self, table: Table, op: StoreOp, target: impl Into<String>) -> Result<T, SyncError> {
        self.map_err(|source| SyncError::Persistence {
            table,
            op,
            target: target.into(),
            source,
        })
    }
}
