use std::collections::HashSet;

use crate::models::{CourseDraft, CourseStatus, CourseType, InstructorRef, MediaRef};
use crate::sync::SyncError;

fn require_text(path: &str, value: &str) -> Result<(), SyncError> {
    if value.trim().is_empty() {
        return Err(SyncError::validation(path, "must not be blank"));
    }
    Ok(())
}

fn check_media(path: &str, media: &MediaRef) -> Result<(), SyncError> {
    match media {
        MediaRef::Durable { url } => require_text(&format!("{}.url", path), url),
        MediaRef::Pending(pending) => {
            require_text(&format!("{}.file_name", path), &pending.file_name)?;
            if pending.bytes.is_empty() {
                return Err(SyncError::validation(
                    format!("{}.bytes", path),
                    "pending file is empty",
                ));
            }
            Ok(())
        }
    }
}

fn check_non_negative(path: &str, value: Option<i64>) -> Result<(), SyncError> {
    match value {
        Some(v) if v < 0 => Err(SyncError::validation(path, "must not be negative")),
        _ => Ok(()),
    }
}

/// Rejects an id that already appeared at the same curriculum level.
fn check_unique<'a>(
    seen: &mut HashSet<&'a str>,
    path: &str,
    id: Option<&'a str>,
) -> Result<(), SyncError> {
    match id {
        Some(id) if id.trim().is_empty() => Err(SyncError::validation(path, "identifier is blank")),
        Some(id) if !seen.insert(id) => Err(SyncError::validation(
            path,
            format!("duplicate identifier {}", id),
        )),
        _ => Ok(()),
    }
}

/// Checks a desired tree before anything touches the network.
///
/// The curriculum is only checked for recorded courses: a live course may
/// still carry stale sections that will never be written.
pub fn validate_draft(draft: &CourseDraft) -> Result<(), SyncError> {
    require_text("course.title", &draft.title)?;
    check_non_negative("course.price_cents", draft.price_cents)?;

    match &draft.instructor {
        InstructorRef::Existing { id } => require_text("course.instructor.id", id)?,
        InstructorRef::New(new) => {
            require_text("course.instructor.name", &new.name)?;
            if let Some(photo) = &new.photo {
                check_media("course.instructor.photo", photo)?;
            }
        }
    }
    if let Some(thumbnail) = &draft.thumbnail {
        check_media("course.thumbnail", thumbnail)?;
    }
    if let Some(preview) = &draft.preview_video {
        check_media("course.preview_video", preview)?;
    }

    for (i, category_id) in draft.category_ids.iter().enumerate() {
        require_text(&format!("course.category_ids[{}]", i), category_id)?;
    }
    for (i, item) in draft.requirements.iter().enumerate() {
        require_text(&format!("course.requirements[{}]", i), item)?;
    }
    for (i, item) in draft.learning_outcomes.iter().enumerate() {
        require_text(&format!("course.learning_outcomes[{}]", i), item)?;
    }

    match draft.course_type {
        CourseType::Live => {
            if let Some(live) = &draft.live {
                require_text("course.live.starts_at", &live.starts_at)?;
                if chrono::DateTime::parse_from_rfc3339(&live.starts_at).is_err() {
                    return Err(SyncError::validation(
                        "course.live.starts_at",
                        "must be an RFC3339 timestamp",
                    ));
                }
                if live.duration_minutes <= 0 {
                    return Err(SyncError::validation(
                        "course.live.duration_minutes",
                        "must be positive",
                    ));
                }
            } else if draft.status == CourseStatus::Published {
                return Err(SyncError::validation(
                    "course.live",
                    "a published live course needs a schedule",
                ));
            }
        }
        CourseType::Recorded => validate_curriculum(draft)?,
    }
    Ok(())
}

fn validate_curriculum(draft: &CourseDraft) -> Result<(), SyncError> {
    let mut section_ids = HashSet::new();
    let mut lesson_ids = HashSet::new();
    let mut resource_ids = HashSet::new();

    for (s, section) in draft.sections.iter().enumerate() {
        let path = format!("sections[{}]", s);
        check_unique(&mut section_ids, &format!("{}.id", path), section.id.as_deref())?;
        require_text(&format!("{}.title", path), &section.title)?;

        for (l, lesson) in section.lessons.iter().enumerate() {
            let path = format!("{}.lessons[{}]", path, l);
            check_unique(&mut lesson_ids, &format!("{}.id", path), lesson.id.as_deref())?;
            require_text(&format!("{}.title", path), &lesson.title)?;
            check_non_negative(&format!("{}.duration_seconds", path), lesson.duration_seconds)?;
            if let Some(video) = &lesson.video {
                check_media(&format!("{}.video", path), video)?;
            }

            for (r, resource) in lesson.resources.iter().enumerate() {
                let path = format!("{}.resources[{}]", path, r);
                check_unique(&mut resource_ids, &format!("{}.id", path), resource.id.as_deref())?;
                require_text(&format!("{}.title", path), &resource.title)?;
                check_media(&format!("{}.file", path), &resource.file)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LessonDraft, LiveSchedule, NewInstructor, SectionDraft};

    fn draft() -> CourseDraft {
        CourseDraft {
            id: None,
            title: "Async Rust".to_string(),
            subtitle: None,
            description: None,
            language: None,
            level: None,
            price_cents: None,
            course_type: CourseType::Recorded,
            status: CourseStatus::Draft,
            instructor: InstructorRef::existing("i1"),
            thumbnail: None,
            preview_video: None,
            category_ids: vec![],
            requirements: vec![],
            learning_outcomes: vec![],
            live: None,
            sections: vec![SectionDraft {
                id: Some("s1".to_string()),
                title: "Futures".to_string(),
                description: None,
                lessons: vec![LessonDraft {
                    id: None,
                    title: "Polling".to_string(),
                    description: None,
                    video: None,
                    is_preview: true,
                    duration_seconds: None,
                    resources: vec![],
                }],
            }],
        }
    }

    fn path_of(err: SyncError) -> String {
        match err {
            SyncError::Validation { path, .. } => path,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        assert!(validate_draft(&draft()).is_ok());
    }

    #[test]
    fn test_lesson_without_title_is_rejected_with_path() {
        let mut d = draft();
        d.sections[0].lessons[0].title = "  ".to_string();
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "sections[0].lessons[0].title");
    }

    #[test]
    fn test_duplicate_section_ids_are_rejected() {
        let mut d = draft();
        let copy = d.sections[0].clone();
        d.sections.push(copy);
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "sections[1].id");
    }

    #[test]
    fn test_new_instructor_needs_a_name() {
        let mut d = draft();
        d.instructor = InstructorRef::New(NewInstructor {
            name: String::new(),
            bio: None,
            credentials: None,
            photo: None,
        });
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "course.instructor.name");
    }

    #[test]
    fn test_empty_pending_file_is_rejected() {
        let mut d = draft();
        d.thumbnail = Some(MediaRef::pending("cover.png", Vec::new()));
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "course.thumbnail.bytes");
    }

    #[test]
    fn test_live_course_ignores_stale_curriculum() {
        let mut d = draft();
        d.course_type = CourseType::Live;
        d.sections[0].title.clear();
        assert!(validate_draft(&d).is_ok());

        d.status = CourseStatus::Published;
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "course.live");

        d.live = Some(LiveSchedule {
            starts_at: "tomorrow".to_string(),
            duration_minutes: 60,
            meeting_url: None,
        });
        assert_eq!(path_of(validate_draft(&d).unwrap_err()), "course.live.starts_at");
    }
}
