use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::blob::BlobStore;
use crate::models::{CourseDraft, InstructorRef, MediaRef};
use crate::store::RelationalStore;
use crate::sync::{
    AssetCategory, AssetMaterializer, CurriculumStats, DependencyError, INSTRUCTOR_MEDIA_OWNER,
    InstructorResolver, OrderedList, PersistedCurriculum, ResolvedCourseRefs, SyncError,
    TreeReconciler, UploadError, course_media_owner, sync_category_links, sync_ordered_list,
    upsert_course, validate_draft,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub course_id: String,
    pub course_created: bool,
    pub instructor_id: String,
    pub instructor_created: bool,
    /// Every upload made by this run, curriculum included.
    pub assets_uploaded: usize,
    pub categories_linked: usize,
    pub requirements_written: usize,
    pub learning_outcomes_written: usize,
    /// `None` when the course type has no curriculum.
    pub curriculum: Option<CurriculumStats>,
}

/// Runs full synchronizations of courses.
///
/// One orchestrator is meant to be shared by every run in the process: its
/// materializer hands out the upload stamps, so concurrent runs never pick
/// the same blob path.
pub struct SyncOrchestrator {
    assets: AssetMaterializer,
}

impl SyncOrchestrator {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            assets: AssetMaterializer::new(blobs),
        }
    }

    /// Reconciles `draft` against `store`: [`prepare`](Self::prepare), then
    /// [`write`](Self::write).
    ///
    /// Identifiers and durable URLs are stamped into `draft` as soon as the
    /// corresponding upload or write succeeds. The first error aborts the run
    /// without undoing earlier writes, and `draft` keeps every stamp made
    /// before it, so submitting it again finishes the job without
    /// duplicating rows.
    pub async fn synchronize(
        &self,
        store: &dyn RelationalStore,
        draft: &mut CourseDraft,
    ) -> Result<SyncReport, SyncError> {
        let uploaded = self.prepare(draft).await?;
        let mut report = self.write(store, draft).await?;
        report.assets_uploaded += uploaded;
        Ok(report)
    }

    /// Validates `draft` and uploads every pending media slot that will be
    /// written. Touches no rows. Returns the number of uploads.
    pub async fn prepare(&self, draft: &mut CourseDraft) -> Result<usize, SyncError> {
        validate_draft(draft)?;

        info!("Step 0: Uploading pending media");
        let mut uploaded = 0;
        if let InstructorRef::New(new) = &mut draft.instructor {
            uploaded += self
                .upload(new.photo.as_mut(), INSTRUCTOR_MEDIA_OWNER, AssetCategory::InstructorPhoto)
                .await
                .map_err(DependencyError::Upload)?;
        }

        let owner = course_media_owner(draft.id.as_deref());
        uploaded += self
            .upload(draft.thumbnail.as_mut(), &owner, AssetCategory::CourseThumbnail)
            .await?;
        uploaded += self
            .upload(draft.preview_video.as_mut(), &owner, AssetCategory::CoursePreview)
            .await?;

        // a live course never writes its curriculum, so its media stays put
        if draft.course_type.has_curriculum() {
            for section in &mut draft.sections {
                for lesson in &mut section.lessons {
                    uploaded += self
                        .upload(lesson.video.as_mut(), &owner, AssetCategory::LessonVideo)
                        .await?;
                    for resource in &mut lesson.resources {
                        uploaded += self
                            .upload(Some(&mut resource.file), &owner, AssetCategory::ResourceFile)
                            .await?;
                    }
                }
            }
        }
        info!("Uploaded {} pending media files", uploaded);
        Ok(uploaded)
    }

    async fn upload(
        &self,
        media: Option<&mut MediaRef>,
        owner: &str,
        category: AssetCategory,
    ) -> Result<usize, UploadError> {
        match media {
            Some(media) if media.is_pending() => {
                self.assets.materialize(media, owner, category).await?;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    /// Writes `draft` to `store` in dependency order: instructor, course row,
    /// category links, requirement and outcome lists, then the curriculum for
    /// recorded courses.
    ///
    /// Curriculum ids the course does not own are rejected before the first
    /// write. Media still pending is uploaded right before the row that
    /// references it.
    pub async fn write(
        &self,
        store: &dyn RelationalStore,
        draft: &mut CourseDraft,
    ) -> Result<SyncReport, SyncError> {
        validate_draft(draft)?;
        let mut report = SyncReport::default();

        let persisted = if draft.course_type.has_curriculum() {
            let persisted = match draft.id.as_deref() {
                Some(course_id) => PersistedCurriculum::load(store, course_id).await?,
                None => PersistedCurriculum::default(),
            };
            persisted.check(&draft.sections)?;
            Some(persisted)
        } else {
            None
        };

        info!("Step 1: Resolving instructor");
        let (instructor_id, instructor_created) = InstructorResolver::new(store, &self.assets)
            .resolve(&mut draft.instructor)
            .await?;
        report.instructor_id = instructor_id.clone();
        report.instructor_created = instructor_created;

        info!("Step 2: Resolving course media");
        let owner = course_media_owner(draft.id.as_deref());
        report.assets_uploaded += draft.thumbnail.iter().filter(|m| m.is_pending()).count();
        report.assets_uploaded += draft.preview_video.iter().filter(|m| m.is_pending()).count();
        let thumbnail_url = self
            .assets
            .materialize_opt(draft.thumbnail.as_mut(), &owner, AssetCategory::CourseThumbnail)
            .await?;
        let preview_video_url = self
            .assets
            .materialize_opt(draft.preview_video.as_mut(), &owner, AssetCategory::CoursePreview)
            .await?;

        info!("Step 3: Writing course row");
        let refs = ResolvedCourseRefs {
            instructor_id,
            thumbnail_url,
            preview_video_url,
        };
        let (course_id, course_created) = upsert_course(store, draft, &refs).await?;
        report.course_id = course_id.clone();
        report.course_created = course_created;

        info!("Step 4: Replacing category links for course {}", course_id);
        report.categories_linked =
            sync_category_links(store, &course_id, &draft.category_ids).await?;

        info!("Step 5: Replacing requirements and learning outcomes");
        report.requirements_written =
            sync_ordered_list(store, OrderedList::Requirements, &course_id, &draft.requirements)
                .await?;
        report.learning_outcomes_written = sync_ordered_list(
            store,
            OrderedList::LearningOutcomes,
            &course_id,
            &draft.learning_outcomes,
        )
        .await?;

        match persisted {
            Some(persisted) => {
                info!("Step 6: Reconciling curriculum");
                let stats = TreeReconciler::new(store, &self.assets, &course_id, persisted)
                    .reconcile(&mut draft.sections)
                    .await?;
                info!(
                    "Curriculum synced: sections {:?}, lessons {:?}, resources {:?}",
                    stats.sections, stats.lessons, stats.resources
                );
                report.assets_uploaded += stats.assets_uploaded;
                report.curriculum = Some(stats);
            }
            None => info!("Step 6: Skipping curriculum for {} course", draft.course_type),
        }

        info!("Sync completed successfully: {:?}", report);
        Ok(report)
    }
}
