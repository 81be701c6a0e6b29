use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coursesync::blob::{BlobError, BlobStore, MemoryBlobStore};
use coursesync::error::AppError;
use coursesync::models::{
    CourseDraft, CourseStatus, CourseType, InstructorRef, LessonDraft, MediaRef, ResourceDraft,
    ResourceKind, SectionDraft,
};
use coursesync::services::SyncService;
use coursesync::sync::{CourseLocks, SyncError, SyncOrchestrator};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(2))
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    sqlx::query(
        "INSERT INTO instructors (id, name, created_at) \
         VALUES ('ins-1', 'Ada Lovelace', '2026-01-01T00:00:00Z')",
    )
    .execute(&pool)
    .await
    .expect("Failed to seed instructor");
    for (id, name) in [("cat-web", "Web"), ("cat-sys", "Systems")] {
        sqlx::query("INSERT INTO categories (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&pool)
            .await
            .expect("Failed to seed category");
    }

    pool
}

fn service_with(pool: &SqlitePool, blobs: Arc<dyn BlobStore>) -> SyncService {
    SyncService::new(
        pool.clone(),
        Arc::new(SyncOrchestrator::new(blobs)),
        Arc::new(CourseLocks::new()),
    )
}

fn service(pool: &SqlitePool) -> SyncService {
    service_with(pool, Arc::new(MemoryBlobStore::new()))
}

/// Runs a query on the pool before every upload, so an upload made while the
/// pool's only connection sits in an open transaction times out.
struct PoolCheckingBlobStore {
    pool: SqlitePool,
    inner: MemoryBlobStore,
}

#[async_trait]
impl BlobStore for PoolCheckingBlobStore {
    async fn put(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String, BlobError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| BlobError::Unavailable(e.to_string()))?;
        self.inner.put(path, bytes, content_type).await
    }
}

fn draft() -> CourseDraft {
    CourseDraft {
        id: None,
        title: "Rust for Web Backends".to_string(),
        subtitle: None,
        description: Some("Axum, sqlx and friends".to_string()),
        language: Some("en".to_string()),
        level: None,
        price_cents: Some(0),
        course_type: CourseType::Recorded,
        status: CourseStatus::Published,
        instructor: InstructorRef::existing("ins-1"),
        thumbnail: Some(MediaRef::pending("thumb.png", vec![1, 2, 3])),
        preview_video: None,
        category_ids: vec!["cat-web".to_string(), "cat-sys".to_string()],
        requirements: vec!["Know some Rust".to_string()],
        learning_outcomes: vec!["Ship a service".to_string(), "Test it".to_string()],
        live: None,
        sections: vec![SectionDraft {
            id: None,
            title: "Routing".to_string(),
            description: None,
            lessons: vec![
                LessonDraft {
                    id: None,
                    title: "Handlers".to_string(),
                    description: None,
                    video: Some(MediaRef::pending("handlers.mp4", vec![0; 16])),
                    is_preview: true,
                    duration_seconds: Some(420),
                    resources: vec![ResourceDraft {
                        id: None,
                        title: "Slides".to_string(),
                        file: MediaRef::pending("slides.pdf", vec![5; 8]),
                        kind: ResourceKind::Slides,
                    }],
                },
                LessonDraft {
                    id: None,
                    title: "Extractors".to_string(),
                    description: None,
                    video: None,
                    is_preview: false,
                    duration_seconds: None,
                    resources: vec![],
                },
            ],
        }],
    }
}

async fn count(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .expect("Failed to count rows")
}

#[tokio::test]
async fn test_sync_then_load_round_trips() {
    let pool = setup_test_db().await;
    let service = service(&pool);

    let outcome = service.sync_course(draft()).await.unwrap();
    assert!(outcome.report.course_created);
    assert_eq!(count(&pool, "lessons").await, 2);
    assert_eq!(count(&pool, "resources").await, 1);

    let loaded = service.load_course(&outcome.report.course_id).await.unwrap();
    assert_eq!(loaded, outcome.course);
    assert!(loaded.sections[0].lessons[0].is_preview);
    assert_eq!(loaded.sections[0].lessons[0].resources[0].kind, ResourceKind::Slides);
}

#[tokio::test]
async fn test_resync_updates_in_place() {
    let pool = setup_test_db().await;
    let service = service(&pool);
    let mut course = service.sync_course(draft()).await.unwrap().course;

    course.title = "Rust for Web Backends, 2nd edition".to_string();
    course.sections[0].lessons.pop();
    course.category_ids = vec!["cat-sys".to_string()];
    let outcome = service.sync_course(course).await.unwrap();

    assert!(!outcome.report.course_created);
    assert_eq!(count(&pool, "courses").await, 1);
    assert_eq!(count(&pool, "sections").await, 1);
    assert_eq!(count(&pool, "lessons").await, 1);
    assert_eq!(count(&pool, "course_categories").await, 1);

    let title: String = sqlx::query_scalar("SELECT title FROM courses WHERE id = ?")
        .bind(&outcome.report.course_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(title, "Rust for Web Backends, 2nd edition");
}

#[tokio::test]
async fn test_failed_sync_rolls_back_every_row() {
    let pool = setup_test_db().await;
    let service = service(&pool);
    let mut bad = draft();
    bad.category_ids.push("cat-missing".to_string());

    let err = service.sync_course(bad).await.unwrap_err();

    assert!(matches!(err, AppError::Sync(SyncError::Persistence { .. })));
    let tables = [
        "courses",
        "course_categories",
        "course_requirements",
        "sections",
        "lessons",
        "resources",
    ];
    for table in tables {
        assert_eq!(count(&pool, table).await, 0, "{} should be empty", table);
    }
}

#[tokio::test]
async fn test_validation_error_is_reported_before_any_write() {
    let pool = setup_test_db().await;
    let service = service(&pool);
    let mut bad = draft();
    bad.title = " ".to_string();

    let err = service.sync_course(bad).await.unwrap_err();

    assert!(matches!(err, AppError::Sync(SyncError::Validation { .. })));
    assert_eq!(count(&pool, "courses").await, 0);
}

#[tokio::test]
async fn test_load_unknown_course_is_not_found() {
    let pool = setup_test_db().await;
    let err = service(&pool).load_course("nope").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound));
}

#[tokio::test]
async fn test_lessons_move_out_of_a_dropped_section() {
    let pool = setup_test_db().await;
    let service = service(&pool);
    let mut course = service.sync_course(draft()).await.unwrap().course;
    let old_section = course.sections[0].id.clone().unwrap();
    let lesson_ids: Vec<String> = course.sections[0]
        .lessons
        .iter()
        .filter_map(|l| l.id.clone())
        .collect();

    let lessons = std::mem::take(&mut course.sections[0].lessons);
    course.sections = vec![SectionDraft {
        id: None,
        title: "Advanced routing".to_string(),
        description: None,
        lessons,
    }];
    let outcome = service.sync_course(course).await.unwrap();

    let new_section = outcome.course.sections[0].id.clone().unwrap();
    assert_ne!(new_section, old_section);
    assert_eq!(count(&pool, "sections").await, 1);
    assert_eq!(count(&pool, "lessons").await, 2);
    assert_eq!(count(&pool, "resources").await, 1);
    for lesson_id in &lesson_ids {
        let section_id: String = sqlx::query_scalar("SELECT section_id FROM lessons WHERE id = ?")
            .bind(lesson_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(section_id, new_section);
    }
}

#[tokio::test]
async fn test_media_is_uploaded_before_the_transaction_opens() {
    let pool = setup_test_db().await;
    let blobs = Arc::new(PoolCheckingBlobStore {
        pool: pool.clone(),
        inner: MemoryBlobStore::new(),
    });
    let service = service_with(&pool, blobs.clone());

    let outcome = service.sync_course(draft()).await.unwrap();

    assert_eq!(outcome.report.assets_uploaded, 3);
    assert_eq!(blobs.inner.paths().len(), 3);
    assert_eq!(count(&pool, "courses").await, 1);
}
