use std::sync::Arc;

use sqlx::SqlitePool;

use crate::sync::{CourseLocks, SyncOrchestrator};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub locks: Arc<CourseLocks>,
    /// Largest accepted request body; pending media travels inline.
    pub max_body_bytes: usize,
}
