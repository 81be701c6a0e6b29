use std::str::FromStr;

use crate::models::{
    CourseDraft, CourseStatus, CourseType, InstructorRef, LessonDraft, LiveSchedule, MediaRef,
    ResourceDraft, ResourceKind, SectionDraft,
};
use crate::store::{RelationalStore, StoreError, StoredRow, Table};

fn text(row: &StoredRow, column: &str) -> Option<String> {
    row.text(column).map(str::to_string)
}

fn media(row: &StoredRow, column: &str) -> Option<MediaRef> {
    row.text(column).map(MediaRef::durable)
}

fn parsed<T>(row: &StoredRow, table: Table, column: &str) -> Result<T, StoreError>
where
    T: FromStr<Err = String>,
{
    row.text(column).unwrap_or_default().parse().map_err(|reason| {
        StoreError::Corrupt(format!("{} {} {}: {}", table, row.id, column, reason))
    })
}

async fn texts(
    store: &dyn RelationalStore,
    table: Table,
    course_id: &str,
    column: &str,
) -> Result<Vec<String>, StoreError> {
    Ok(store
        .select_children(table, course_id)
        .await?
        .iter()
        .filter_map(|row| text(row, column))
        .collect())
}

/// Reads a persisted course back into a desired tree with every id set and
/// every media slot durable. Returns `None` if the course row is missing.
pub async fn load_course(
    store: &dyn RelationalStore,
    course_id: &str,
) -> Result<Option<CourseDraft>, StoreError> {
    let Some(row) = store.find(Table::Courses, course_id).await? else {
        return Ok(None);
    };
    let course_type: CourseType = parsed(&row, Table::Courses, "course_type")?;
    let status: CourseStatus = parsed(&row, Table::Courses, "status")?;

    let live = match (row.text("live_starts_at"), row.integer("live_duration_minutes")) {
        (Some(starts_at), Some(duration_minutes)) => Some(LiveSchedule {
            starts_at: starts_at.to_string(),
            duration_minutes,
            meeting_url: text(&row, "live_meeting_url"),
        }),
        _ => None,
    };

    let sections = if course_type.has_curriculum() {
        load_sections(store, course_id).await?
    } else {
        Vec::new()
    };

    Ok(Some(CourseDraft {
        id: Some(row.id.clone()),
        title: text(&row, "title").unwrap_or_default(),
        subtitle: text(&row, "subtitle"),
        description: text(&row, "description"),
        language: text(&row, "language"),
        level: text(&row, "level"),
        price_cents: row.integer("price_cents"),
        course_type,
        status,
        instructor: InstructorRef::existing(text(&row, "instructor_id").unwrap_or_default()),
        thumbnail: media(&row, "thumbnail_url"),
        preview_video: media(&row, "preview_video_url"),
        category_ids: texts(store, Table::CategoryLinks, course_id, "category_id").await?,
        requirements: texts(store, Table::Requirements, course_id, "content").await?,
        learning_outcomes: texts(store, Table::LearningOutcomes, course_id, "content").await?,
        live,
        sections,
    }))
}

async fn load_sections(
    store: &dyn RelationalStore,
    course_id: &str,
) -> Result<Vec<SectionDraft>, StoreError> {
    let mut sections = Vec::new();
    for row in store.select_children(Table::Sections, course_id).await? {
        let mut lessons = Vec::new();
        for lesson in store.select_children(Table::Lessons, &row.id).await? {
            let mut resources = Vec::new();
            for resource in store.select_children(Table::Resources, &lesson.id).await? {
                resources.push(ResourceDraft {
                    title: text(&resource, "title").unwrap_or_default(),
                    file: MediaRef::durable(text(&resource, "file_url").unwrap_or_default()),
                    kind: parsed::<ResourceKind>(&resource, Table::Resources, "kind")?,
                    id: Some(resource.id),
                });
            }
            lessons.push(LessonDraft {
                title: text(&lesson, "title").unwrap_or_default(),
                description: text(&lesson, "description"),
                video: media(&lesson, "video_url"),
                is_preview: lesson.boolean("is_preview").unwrap_or(false),
                duration_seconds: lesson.integer("duration_seconds"),
                resources,
                id: Some(lesson.id),
            });
        }
        sections.push(SectionDraft {
            title: text(&row, "title").unwrap_or_default(),
            description: text(&row, "description"),
            lessons,
            id: Some(row.id),
        });
    }
    Ok(sections)
}
