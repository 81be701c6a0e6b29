//! Section → Lesson → Resource reconciliation.
//!
//! The course's persisted curriculum is read once up front. Every id the
//! desired tree carries must belong to it. The tree is then written top-down
//! (update when a node has an id, insert and stamp otherwise, children after
//! their parent) and finally every owned row the tree no longer mentions is
//! deleted, deepest level first. Deleting last lets a node move to another
//! parent: it is rewritten with its new parent column before the old parent
//! goes away.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::models::{LessonDraft, MediaRef, ResourceDraft, SectionDraft};
use crate::store::{Fields, RelationalStore, StoreOp, Table};
use crate::sync::{
    AssetCategory, AssetMaterializer, StoreResultExt, SyncError, course_media_owner,
};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type IdSets = HashMap<Table, HashSet<String>>;

const LEVELS: [Table; 3] = [Table::Sections, Table::Lessons, Table::Resources];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CurriculumStats {
    pub sections: LevelStats,
    pub lessons: LevelStats,
    pub resources: LevelStats,
    pub assets_uploaded: usize,
}

impl CurriculumStats {
    fn level_mut(&mut self, table: Table) -> &mut LevelStats {
        match table {
            Table::Lessons => &mut self.lessons,
            Table::Resources => &mut self.resources,
            _ => &mut self.sections,
        }
    }
}

/// The curriculum row ids a course owns in the store, per level.
#[derive(Debug, Clone, Default)]
pub struct PersistedCurriculum {
    ids: IdSets,
}

impl PersistedCurriculum {
    /// Reads the persisted tree of `course_id` one level at a time.
    pub async fn load(store: &dyn RelationalStore, course_id: &str) -> Result<Self, SyncError> {
        let mut ids = IdSets::new();
        let mut parents = vec![course_id.to_string()];
        let mut level = Some(Table::Sections);

        while let Some(table) = level {
            if parents.is_empty() {
                break;
            }
            let mut children = Vec::new();
            for parent_id in &parents {
                let rows = store
                    .select_children(table, parent_id)
                    .await
                    .context(table, StoreOp::SelectChildren, format!("parent {}", parent_id))?;
                children.extend(rows.into_iter().map(|row| row.id));
            }
            ids.entry(table).or_default().extend(children.iter().cloned());
            parents = children;
            level = table.child();
        }
        Ok(Self { ids })
    }

    pub fn contains(&self, table: Table, id: &str) -> bool {
        self.ids.get(&table).is_some_and(|ids| ids.contains(id))
    }

    /// Rejects a tree carrying an id this course does not own.
    ///
    /// Such an id belongs to another course or to a row that is gone; writing
    /// it would re-parent a foreign row or fail halfway through the tree.
    pub fn check(&self, sections: &[SectionDraft]) -> Result<(), SyncError> {
        self.claim(sections).map(|_| ())
    }

    fn claim(&self, sections: &[SectionDraft]) -> Result<IdSets, SyncError> {
        let mut claimed = IdSets::new();
        for (s, section) in sections.iter().enumerate() {
            let path = format!("sections[{}]", s);
            self.claim_one(&mut claimed, Table::Sections, &path, section.id.as_deref())?;

            for (l, lesson) in section.lessons.iter().enumerate() {
                let path = format!("{}.lessons[{}]", path, l);
                self.claim_one(&mut claimed, Table::Lessons, &path, lesson.id.as_deref())?;

                for (r, resource) in lesson.resources.iter().enumerate() {
                    let path = format!("{}.resources[{}]", path, r);
                    self.claim_one(&mut claimed, Table::Resources, &path, resource.id.as_deref())?;
                }
            }
        }
        Ok(claimed)
    }

    fn claim_one(
        &self,
        claimed: &mut IdSets,
        table: Table,
        path: &str,
        id: Option<&str>,
    ) -> Result<(), SyncError> {
        let Some(id) = id else {
            return Ok(());
        };
        if !self.contains(table, id) {
            return Err(SyncError::validation(
                format!("{}.id", path),
                format!("{} is not a {} row of this course", id, table),
            ));
        }
        claimed.entry(table).or_default().insert(id.to_string());
        Ok(())
    }

    /// Owned ids of `table` missing from `claimed`, sorted.
    fn removed(&self, claimed: &IdSets, table: Table) -> Vec<String> {
        let kept = claimed.get(&table);
        let mut removed: Vec<String> = self
            .ids
            .get(&table)
            .into_iter()
            .flatten()
            .filter(|id| !kept.is_some_and(|kept| kept.contains(*id)))
            .cloned()
            .collect();
        removed.sort();
        removed
    }
}

/// The nested children of a node, one level down.
pub(crate) enum Children<'a> {
    Lessons(&'a mut [LessonDraft]),
    Resources(&'a mut [ResourceDraft]),
    Leaf,
}

/// One curriculum level as seen by the reconciler.
pub(crate) trait CurriculumNode: Send {
    const TABLE: Table;

    fn id(&self) -> Option<&str>;
    fn stamp_id(&mut self, id: String);
    /// Media that must be durable before the row is written.
    fn media(&mut self) -> Option<(&mut MediaRef, AssetCategory)>;
    fn fields(&self, parent_id: &str, position: usize) -> Fields;
    fn children(&mut self) -> Children<'_>;
}

fn media_url(media: Option<&MediaRef>) -> Value {
    json!(media.and_then(MediaRef::durable_url))
}

impl CurriculumNode for SectionDraft {
    const TABLE: Table = Table::Sections;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn stamp_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn media(&mut self) -> Option<(&mut MediaRef, AssetCategory)> {
        None
    }

    fn fields(&self, parent_id: &str, position: usize) -> Fields {
        let mut fields = Fields::new();
        fields.insert("course_id".into(), json!(parent_id));
        fields.insert("title".into(), json!(self.title.trim()));
        fields.insert("description".into(), json!(self.description));
        fields.insert("position".into(), json!(position));
        fields
    }

    fn children(&mut self) -> Children<'_> {
        Children::Lessons(&mut self.lessons)
    }
}

impl CurriculumNode for LessonDraft {
    const TABLE: Table = Table::Lessons;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn stamp_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn media(&mut self) -> Option<(&mut MediaRef, AssetCategory)> {
        self.video.as_mut().map(|m| (m, AssetCategory::LessonVideo))
    }

    fn fields(&self, parent_id: &str, position: usize) -> Fields {
        let mut fields = Fields::new();
        fields.insert("section_id".into(), json!(parent_id));
        fields.insert("title".into(), json!(self.title.trim()));
        fields.insert("description".into(), json!(self.description));
        fields.insert("video_url".into(), media_url(self.video.as_ref()));
        fields.insert("is_preview".into(), json!(self.is_preview));
        fields.insert("duration_seconds".into(), json!(self.duration_seconds));
        fields.insert("position".into(), json!(position));
        fields
    }

    fn children(&mut self) -> Children<'_> {
        Children::Resources(&mut self.resources)
    }
}

impl CurriculumNode for ResourceDraft {
    const TABLE: Table = Table::Resources;

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn stamp_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn media(&mut self) -> Option<(&mut MediaRef, AssetCategory)> {
        Some((&mut self.file, AssetCategory::ResourceFile))
    }

    // resources keep insertion order and carry no position column
    fn fields(&self, parent_id: &str, _position: usize) -> Fields {
        let mut fields = Fields::new();
        fields.insert("lesson_id".into(), json!(parent_id));
        fields.insert("title".into(), json!(self.title.trim()));
        fields.insert("file_url".into(), media_url(Some(&self.file)));
        fields.insert("kind".into(), json!(self.kind.as_str()));
        fields
    }

    fn children(&mut self) -> Children<'_> {
        Children::Leaf
    }
}

/// Synchronizes the curriculum of one recorded course.
pub struct TreeReconciler<'a> {
    store: &'a dyn RelationalStore,
    assets: &'a AssetMaterializer,
    course_id: &'a str,
    persisted: PersistedCurriculum,
    stats: CurriculumStats,
}

impl<'a> TreeReconciler<'a> {
    /// `persisted` is the course's curriculum as loaded before this run.
    pub fn new(
        store: &'a dyn RelationalStore,
        assets: &'a AssetMaterializer,
        course_id: &'a str,
        persisted: PersistedCurriculum,
    ) -> Self {
        Self {
            store,
            assets,
            course_id,
            persisted,
            stats: CurriculumStats::default(),
        }
    }

    /// Reconciles `sections` under the course, stamping ids into new nodes.
    ///
    /// On error the traversal stops; rows written so far stay written and
    /// their ids stay stamped in `sections`.
    pub async fn reconcile(
        mut self,
        sections: &mut [SectionDraft],
    ) -> Result<CurriculumStats, SyncError> {
        let claimed = self.persisted.claim(sections)?;
        let course_id = self.course_id;
        self.sync_level(course_id, sections).await?;
        self.sweep(&claimed).await?;
        Ok(self.stats)
    }

    fn sync_level<'s, N: CurriculumNode>(
        &'s mut self,
        parent_id: &'s str,
        nodes: &'s mut [N],
    ) -> BoxFuture<'s, Result<(), SyncError>> {
        Box::pin(async move {
            let table = N::TABLE;
            for (position, node) in nodes.iter_mut().enumerate() {
                if let Some((media, category)) = node.media() {
                    if media.is_pending() {
                        let owner = course_media_owner(Some(self.course_id));
                        self.assets.materialize(media, &owner, category).await?;
                        self.stats.assets_uploaded += 1;
                    }
                }

                let fields = node.fields(parent_id, position);
                let id = match node.id().map(str::to_string) {
                    Some(id) => {
                        self.store
                            .update(table, &id, fields)
                            .await
                            .context(table, StoreOp::Update, id.as_str())?;
                        self.stats.level_mut(table).updated += 1;
                        id
                    }
                    None => {
                        let id = self
                            .store
                            .insert(table, fields)
                            .await
                            .context(table, StoreOp::Insert, format!("child of {}", parent_id))?;
                        node.stamp_id(id.clone());
                        self.stats.level_mut(table).created += 1;
                        id
                    }
                };

                match node.children() {
                    Children::Lessons(lessons) => self.sync_level(&id, lessons).await?,
                    Children::Resources(resources) => self.sync_level(&id, resources).await?,
                    Children::Leaf => {}
                }
            }
            Ok(())
        })
    }

    /// Deletes every owned row the tree dropped, deepest level first.
    async fn sweep(&mut self, claimed: &IdSets) -> Result<(), SyncError> {
        for table in LEVELS.into_iter().rev() {
            let removed = self.persisted.removed(claimed, table);
            if removed.is_empty() {
                continue;
            }
            let deleted = self
                .store
                .delete_many(table, &removed)
                .await
                .context(table, StoreOp::DeleteMany, removed.join(","))?;
            debug!("deleted {} rows from {}", deleted, table);
            self.stats.level_mut(table).deleted += removed.len();
        }
        Ok(())
    }
}
