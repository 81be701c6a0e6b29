use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::debug;

use crate::blob::BlobStore;
use crate::models::MediaRef;
use crate::sync::UploadError;

/// What a media file is used for; becomes the middle path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetCategory {
    InstructorPhoto,
    CourseThumbnail,
    CoursePreview,
    LessonVideo,
    ResourceFile,
}

impl AssetCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetCategory::InstructorPhoto => "photos",
            AssetCategory::CourseThumbnail => "thumbnails",
            AssetCategory::CoursePreview => "previews",
            AssetCategory::LessonVideo => "videos",
            AssetCategory::ResourceFile => "resources",
        }
    }
}

/// Owner path of instructor photos.
pub const INSTRUCTOR_MEDIA_OWNER: &str = "instructors";

/// Owner path of a course's media. Courses without an id yet share
/// `courses/unsaved`; the materializer's stamps keep their paths apart.
pub fn course_media_owner(course_id: Option<&str>) -> String {
    match course_id {
        Some(id) => format!("courses/{}", id),
        None => "courses/unsaved".to_string(),
    }
}

/// Turns pending media into durable URLs.
///
/// Objects land at `<owner>/<category>/<millis>.<ext>`. The millisecond stamp
/// is kept strictly increasing per materializer so paths never collide.
pub struct AssetMaterializer {
    blobs: Arc<dyn BlobStore>,
    last_stamp: AtomicI64,
}

impl AssetMaterializer {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Uploads `media` if it is pending and replaces it with the durable URL.
    /// Durable media passes through untouched.
    pub async fn materialize(
        &self,
        media: &mut MediaRef,
        owner: &str,
        category: AssetCategory,
    ) -> Result<String, UploadError> {
        let pending = match &mut *media {
            MediaRef::Durable { url } => return Ok(url.clone()),
            MediaRef::Pending(pending) => pending,
        };

        let path = format!(
            "{}/{}/{}.{}",
            owner,
            category.as_str(),
            self.next_stamp(),
            extension(&pending.file_name, pending.content_type.as_deref())
        );
        let bytes = pending.bytes.clone();
        let content_type = pending.content_type.clone();

        match self.blobs.put(&path, bytes, content_type.as_deref()).await {
            Ok(url) => {
                debug!("materialized {} -> {}", path, url);
                *media = MediaRef::durable(url.clone());
                Ok(url)
            }
            Err(source) => Err(UploadError { path, source }),
        }
    }

    /// Like [`materialize`](Self::materialize) for optional slots.
    pub async fn materialize_opt(
        &self,
        media: Option<&mut MediaRef>,
        owner: &str,
        category: AssetCategory,
    ) -> Result<Option<String>, UploadError> {
        match media {
            Some(media) => self.materialize(media, owner, category).await.map(Some),
            None => Ok(None),
        }
    }

    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_stamp
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

fn extension(file_name: &str, content_type: Option<&str>) -> String {
    let from_name = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }

    let from_type = match content_type {
        Some("image/png") => "png",
        Some("image/jpeg") => "jpg",
        Some("image/webp") => "webp",
        Some("video/mp4") => "mp4",
        Some("video/webm") => "webm",
        Some("application/pdf") => "pdf",
        Some("application/zip") => "zip",
        Some("audio/mpeg") => "mp3",
        _ => "bin",
    };
    from_type.to_string()
}
