use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::blob::HttpBlobConfig;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub enum BlobConfig {
    Filesystem {
        root: PathBuf,
        public_base_url: String,
    },
    Http(HttpBlobConfig),
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    pub max_body_bytes: usize,
    pub blob: BlobConfig,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn required(key: &str) -> Result<String, AppError> {
    env::var(key).map_err(|_| AppError::Config(format!("{} is not set", key)))
}

impl AppConfig {
    pub fn new_from_env() -> Result<Self, AppError> {
        let database_url = var_or("DATABASE_URL", "sqlite://coursesync.db");
        let bind_addr = var_or("BIND_ADDR", "127.0.0.1:3000")
            .parse()
            .map_err(|e| AppError::Config(format!("BIND_ADDR is invalid: {}", e)))?;
        let max_connections = var_or("DB_MAX_CONNECTIONS", "5")
            .parse()
            .map_err(|e| AppError::Config(format!("DB_MAX_CONNECTIONS is invalid: {}", e)))?;

        let max_body_bytes = var_or("MAX_BODY_BYTES", "67108864")
            .parse()
            .map_err(|e| AppError::Config(format!("MAX_BODY_BYTES is invalid: {}", e)))?;

        let blob = match var_or("BLOB_BACKEND", "fs").as_str() {
            "fs" => BlobConfig::Filesystem {
                root: PathBuf::from(var_or("BLOB_ROOT", "./media")),
                public_base_url: var_or("BLOB_PUBLIC_URL", "http://127.0.0.1:3000/media"),
            },
            "http" => BlobConfig::Http(HttpBlobConfig {
                base_url: required("STORAGE_URL")?,
                bucket: required("STORAGE_BUCKET")?,
                token: required("STORAGE_TOKEN")?,
            }),
            other => {
                return Err(AppError::Config(format!(
                    "BLOB_BACKEND must be `fs` or `http`, got `{}`",
                    other
                )));
            }
        };

        Ok(Self {
            database_url,
            bind_addr,
            max_connections,
            max_body_bytes,
            blob,
        })
    }
}
