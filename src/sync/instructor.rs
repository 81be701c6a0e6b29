use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::models::InstructorRef;
use crate::store::{Fields, RelationalStore, Table};
use crate::sync::{AssetCategory, AssetMaterializer, DependencyError, INSTRUCTOR_MEDIA_OWNER};

/// Resolves a course's instructor to a persisted identifier.
pub struct InstructorResolver<'a> {
    store: &'a dyn RelationalStore,
    assets: &'a AssetMaterializer,
}

impl<'a> InstructorResolver<'a> {
    pub fn new(store: &'a dyn RelationalStore, assets: &'a AssetMaterializer) -> Self {
        Self { store, assets }
    }

    /// Returns the instructor id and whether a new row was created.
    ///
    /// Existing ids are returned as-is; the store's foreign key is the only
    /// existence check. Inline instructors get their photo uploaded, a row
    /// inserted, and are replaced in the tree by a reference to the new id.
    pub async fn resolve(
        &self,
        instructor: &mut InstructorRef,
    ) -> Result<(String, bool), DependencyError> {
        let new = match &mut *instructor {
            InstructorRef::Existing { id } => return Ok((id.clone(), false)),
            InstructorRef::New(new) => new,
        };

        let photo_url = self
            .assets
            .materialize_opt(
                new.photo.as_mut(),
                INSTRUCTOR_MEDIA_OWNER,
                AssetCategory::InstructorPhoto,
            )
            .await
            .map_err(DependencyError::Upload)?;

        let mut fields = Fields::new();
        fields.insert("name".into(), json!(new.name.trim()));
        fields.insert("bio".into(), json!(new.bio));
        fields.insert("credentials".into(), json!(new.credentials));
        fields.insert("photo_url".into(), json!(photo_url));
        fields.insert("created_at".into(), json!(Utc::now().to_rfc3339()));

        let id = self
            .store
            .insert(Table::Instructors, fields)
            .await
            .map_err(DependencyError::Insert)?;
        info!("created instructor {} ({})", new.name, id);

        *instructor = InstructorRef::existing(id.clone());
        Ok((id, true))
    }
}
