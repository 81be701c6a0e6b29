use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coursesync::api::router;
use coursesync::blob::{BlobStore, FsBlobStore, HttpBlobStore};
use coursesync::config::{AppConfig, BlobConfig};
use coursesync::state::AppState;
use coursesync::sync::{CourseLocks, SyncOrchestrator};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "coursesync=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let options: SqliteConnectOptions = config.database_url.parse()?;
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options.create_if_missing(true))
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let blobs: Arc<dyn BlobStore> = match &config.blob {
        BlobConfig::Filesystem {
            root,
            public_base_url,
        } => Arc::new(FsBlobStore::new(root, public_base_url.clone()).await?),
        BlobConfig::Http(http) => Arc::new(HttpBlobStore::new(http.clone())?),
    };

    let state = AppState {
        db: pool.clone(),
        orchestrator: Arc::new(SyncOrchestrator::new(blobs)),
        locks: Arc::new(CourseLocks::new()),
        max_body_bytes: config.max_body_bytes,
    };

    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
