//! Course-content synchronization engine.
//!
//! Reconciles a [`CourseDraft`](crate::models::CourseDraft) against a
//! [`RelationalStore`](crate::store::RelationalStore). Calls are independent
//! and fail fast: the first error aborts the run and everything already
//! written stays written. Resubmitting the (stamped) draft is the recovery
//! path, see [`SyncOrchestrator::synchronize`].

pub mod assets;
pub mod collections;
pub mod course;
pub mod curriculum;
pub mod error;
pub mod instructor;
pub mod lock;
pub mod orchestrator;
pub mod snapshot;
pub mod validate;

pub use assets::{AssetCategory, AssetMaterializer, INSTRUCTOR_MEDIA_OWNER, course_media_owner};
pub use collections::{OrderedList, sync_category_links, sync_ordered_list};
pub use course::{ResolvedCourseRefs, upsert_course};
pub use curriculum::{CurriculumStats, LevelStats, PersistedCurriculum, TreeReconciler};
pub use error::{DependencyError, StoreResultExt, SyncError, UploadError};
pub use instructor::InstructorResolver;
pub use lock::CourseLocks;
pub use orchestrator::{SyncOrchestrator, SyncReport};
pub use snapshot::load_course;
pub use validate::validate_draft;
