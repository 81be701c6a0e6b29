use chrono::Utc;
use serde_json::{Value, json};
use tracing::debug;

use crate::models::{CourseDraft, CourseType};
use crate::store::{Fields, RelationalStore, StoreOp, Table};
use crate::sync::{StoreResultExt, SyncError};

/// Values the course row needs that come from earlier steps.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCourseRefs {
    pub instructor_id: String,
    pub thumbnail_url: Option<String>,
    pub preview_video_url: Option<String>,
}

fn course_fields(draft: &CourseDraft, refs: &ResolvedCourseRefs) -> Fields {
    let mut fields = Fields::new();
    fields.insert("instructor_id".into(), json!(refs.instructor_id));
    fields.insert("title".into(), json!(draft.title.trim()));
    fields.insert("subtitle".into(), json!(draft.subtitle));
    fields.insert("description".into(), json!(draft.description));
    fields.insert("language".into(), json!(draft.language));
    fields.insert("level".into(), json!(draft.level));
    fields.insert("price_cents".into(), json!(draft.price_cents));
    fields.insert("course_type".into(), json!(draft.course_type.as_str()));
    fields.insert("status".into(), json!(draft.status.as_str()));
    fields.insert("thumbnail_url".into(), json!(refs.thumbnail_url));
    fields.insert("preview_video_url".into(), json!(refs.preview_video_url));

    // live columns only hold data for live courses
    let live = match draft.course_type {
        CourseType::Live => draft.live.as_ref(),
        CourseType::Recorded => None,
    };
    fields.insert(
        "live_starts_at".into(),
        live.map_or(Value::Null, |l| json!(l.starts_at)),
    );
    fields.insert(
        "live_duration_minutes".into(),
        live.map_or(Value::Null, |l| json!(l.duration_minutes)),
    );
    fields.insert(
        "live_meeting_url".into(),
        live.map_or(Value::Null, |l| json!(l.meeting_url)),
    );
    fields.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
    fields
}

/// Inserts or overwrites the course row and stamps its id into `draft`.
///
/// Returns the course id and whether the row was created.
pub async fn upsert_course(
    store: &dyn RelationalStore,
    draft: &mut CourseDraft,
    refs: &ResolvedCourseRefs,
) -> Result<(String, bool), SyncError> {
    let fields = course_fields(draft, refs);

    match draft.id.clone() {
        Some(id) => {
            store
                .update(Table::Courses, &id, fields)
                .await
                .context(Table::Courses, StoreOp::Update, id.as_str())?;
            debug!("updated course {}", id);
            Ok((id, false))
        }
        None => {
            let id = store
                .insert(Table::Courses, fields)
                .await
                .context(Table::Courses, StoreOp::Insert, "new course")?;
            debug!("inserted course {}", id);
            draft.id = Some(id.clone());
            Ok((id, true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseStatus, InstructorRef, LiveSchedule};
    use crate::store::MemoryStore;

    fn draft(course_type: CourseType) -> CourseDraft {
        CourseDraft {
            id: None,
            title: "  Rust for Rustaceans ".to_string(),
            subtitle: None,
            description: None,
            language: Some("en".to_string()),
            level: None,
            price_cents: Some(4900),
            course_type,
            status: CourseStatus::Draft,
            instructor: InstructorRef::existing("i1"),
            thumbnail: None,
            preview_video: None,
            category_ids: vec![],
            requirements: vec![],
            learning_outcomes: vec![],
            live: Some(LiveSchedule {
                starts_at: "2026-11-01T18:00:00Z".to_string(),
                duration_minutes: 90,
                meeting_url: None,
            }),
            sections: vec![],
        }
    }

    fn refs() -> ResolvedCourseRefs {
        ResolvedCourseRefs {
            instructor_id: "i1".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_then_update_reuses_id() {
        let store = MemoryStore::new();
        let mut draft = draft(CourseType::Live);

        let (id, created) = upsert_course(&store, &mut draft, &refs()).await.unwrap();
        assert!(created);
        assert_eq!(draft.id.as_deref(), Some(id.as_str()));

        draft.status = CourseStatus::Published;
        let (again, created) = upsert_course(&store, &mut draft, &refs()).await.unwrap();
        assert!(!created);
        assert_eq!(again, id);
        assert_eq!(store.count(Table::Courses), 1);

        let row = store.row(Table::Courses, &id).unwrap();
        assert_eq!(row.text("status"), Some("published"));
        assert_eq!(row.text("title"), Some("Rust for Rustaceans"));
        assert_eq!(row.integer("live_duration_minutes"), Some(90));
    }

    #[tokio::test]
    async fn test_recorded_course_clears_live_columns() {
        let store = MemoryStore::new();
        let mut draft = draft(CourseType::Recorded);

        let (id, _) = upsert_course(&store, &mut draft, &refs()).await.unwrap();

        let row = store.row(Table::Courses, &id).unwrap();
        assert_eq!(row.fields["live_starts_at"], Value::Null);
        assert_eq!(row.text("course_type"), Some("recorded"));
    }

    #[tokio::test]
    async fn test_update_of_unknown_course_is_persistence_error() {
        let store = MemoryStore::new();
        let mut draft = draft(CourseType::Recorded);
        draft.id = Some("ghost".to_string());

        let err = upsert_course(&store, &mut draft, &refs()).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Persistence { table: Table::Courses, op: StoreOp::Update, .. }
        ));
    }
}
