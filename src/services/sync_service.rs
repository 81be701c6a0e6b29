use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::models::CourseDraft;
use crate::store::{SqliteStore, TransactionalStore};
use crate::sync::{CourseLocks, SyncOrchestrator, SyncReport, load_course};

#[derive(Debug, Serialize)]
pub struct SyncOutcome {
    pub report: SyncReport,
    /// The submitted tree with every identifier and media URL filled in.
    pub course: CourseDraft,
}

/// Runs course synchronizations against the application database.
///
/// Each run holds the course's lock and writes its rows inside one SQLite
/// transaction: it commits as a whole or leaves no rows behind. Media is
/// uploaded before the transaction opens, so no write lock is held across
/// blob uploads. Uploaded blobs survive a rollback.
pub struct SyncService {
    store: SqliteStore,
    orchestrator: Arc<SyncOrchestrator>,
    locks: Arc<CourseLocks>,
}

impl SyncService {
    pub fn new(
        db: SqlitePool,
        orchestrator: Arc<SyncOrchestrator>,
        locks: Arc<CourseLocks>,
    ) -> Self {
        Self {
            store: SqliteStore::new(db),
            orchestrator,
            locks,
        }
    }

    pub async fn sync_course(&self, mut draft: CourseDraft) -> Result<SyncOutcome, AppError> {
        // a course without an id cannot collide with another run yet
        let _guard = match draft.id.as_deref() {
            Some(id) => Some(self.locks.acquire(id).await),
            None => None,
        };

        let uploaded = self.orchestrator.prepare(&mut draft).await?;
        let uow = self.store.begin().await?;

        let result = self.orchestrator.write(uow.as_store(), &mut draft).await;
        match result {
            Ok(mut report) => {
                uow.commit().await?;
                report.assets_uploaded += uploaded;
                info!("committed sync of course {}", report.course_id);
                Ok(SyncOutcome {
                    report,
                    course: draft,
                })
            }
            Err(err) => {
                warn!("sync failed, rolling back: {}", err);
                if let Err(rollback_err) = uow.rollback().await {
                    error!("rollback failed: {}", rollback_err);
                }
                Err(err.into())
            }
        }
    }

    pub async fn load_course(&self, course_id: &str) -> Result<CourseDraft, AppError> {
        load_course(&self.store, course_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
