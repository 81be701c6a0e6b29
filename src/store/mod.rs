//! Relational storage boundary.
//!
//! The engine talks to persisted rows only through [`RelationalStore`]. Rows
//! are addressed by a closed [`Table`] enum whose column list doubles as a
//! whitelist, so a store implementation can build SQL from it safely.

pub mod memory;
pub mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SqliteUnitOfWork};

/// Column values for one row, keyed by column name. `id` is never part of it.
pub type Fields = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row {id} not found in {table}")]
    NotFound { table: Table, id: String },

    #[error("unknown column `{column}` for {table}")]
    UnknownColumn { table: Table, column: String },

    #[error("{0} has no parent column")]
    NoParent(Table),

    #[error("unit of work already finished")]
    Finished,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Instructors,
    Courses,
    CategoryLinks,
    Requirements,
    LearningOutcomes,
    Sections,
    Lessons,
    Resources,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Boolean,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Text }
}

const fn integer(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Integer }
}

const fn boolean(name: &'static str) -> Column {
    Column { name, kind: ColumnKind::Boolean }
}

const INSTRUCTOR_COLUMNS: &[Column] = &[
    text("name"),
    text("bio"),
    text("credentials"),
    text("photo_url"),
    text("created_at"),
];

const COURSE_COLUMNS: &[Column] = &[
    text("instructor_id"),
    text("title"),
    text("subtitle"),
    text("description"),
    text("language"),
    text("level"),
    integer("price_cents"),
    text("course_type"),
    text("status"),
    text("thumbnail_url"),
    text("preview_video_url"),
    text("live_starts_at"),
    integer("live_duration_minutes"),
    text("live_meeting_url"),
    text("updated_at"),
];

const CATEGORY_LINK_COLUMNS: &[Column] = &[text("course_id"), text("category_id")];

const LIST_ITEM_COLUMNS: &[Column] = &[text("course_id"), text("content"), integer("position")];

const SECTION_COLUMNS: &[Column] = &[
    text("course_id"),
    text("title"),
    text("description"),
    integer("position"),
];

const LESSON_COLUMNS: &[Column] = &[
    text("section_id"),
    text("title"),
    text("description"),
    text("video_url"),
    boolean("is_preview"),
    integer("duration_seconds"),
    integer("position"),
];

const RESOURCE_COLUMNS: &[Column] = &[
    text("lesson_id"),
    text("title"),
    text("file_url"),
    text("kind"),
];

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Instructors => "instructors",
            Table::Courses => "courses",
            Table::CategoryLinks => "course_categories",
            Table::Requirements => "course_requirements",
            Table::LearningOutcomes => "course_learning_outcomes",
            Table::Sections => "sections",
            Table::Lessons => "lessons",
            Table::Resources => "resources",
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Table::Instructors => INSTRUCTOR_COLUMNS,
            Table::Courses => COURSE_COLUMNS,
            Table::CategoryLinks => CATEGORY_LINK_COLUMNS,
            Table::Requirements | Table::LearningOutcomes => LIST_ITEM_COLUMNS,
            Table::Sections => SECTION_COLUMNS,
            Table::Lessons => LESSON_COLUMNS,
            Table::Resources => RESOURCE_COLUMNS,
        }
    }

    pub fn parent_column(&self) -> Option<&'static str> {
        match self {
            Table::Instructors | Table::Courses => None,
            Table::CategoryLinks
            | Table::Requirements
            | Table::LearningOutcomes
            | Table::Sections => Some("course_id"),
            Table::Lessons => Some("section_id"),
            Table::Resources => Some("lesson_id"),
        }
    }

    /// The curriculum level directly below this one.
    pub fn child(&self) -> Option<Table> {
        match self {
            Table::Sections => Some(Table::Lessons),
            Table::Lessons => Some(Table::Resources),
            _ => None,
        }
    }

    pub fn is_ordered(&self) -> bool {
        self.columns().iter().any(|c| c.name == "position")
    }

    /// Rejects any field that is not a known column of this table.
    pub fn check_fields(&self, fields: &Fields) -> Result<(), StoreError> {
        let columns = self.columns();
        match fields
            .keys()
            .find(|key| !columns.iter().any(|c| c.name == key.as_str()))
        {
            Some(column) => Err(StoreError::UnknownColumn {
                table: *self,
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Insert,
    Update,
    Find,
    SelectChildren,
    Delete,
    DeleteMany,
    DeleteAllForParent,
}

impl StoreOp {
    pub fn is_write(&self) -> bool {
        !matches!(self, StoreOp::Find | StoreOp::SelectChildren)
    }
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::Insert => "insert",
            StoreOp::Update => "update",
            StoreOp::Find => "find",
            StoreOp::SelectChildren => "select children",
            StoreOp::Delete => "delete",
            StoreOp::DeleteMany => "delete many",
            StoreOp::DeleteAllForParent => "delete all for parent",
        };
        f.write_str(name)
    }
}

/// A persisted row as returned by reads. Every column of the table is
/// present in `fields`; missing values are `Null`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub id: String,
    pub fields: Fields,
}

impl StoredRow {
    pub fn text(&self, column: &str) -> Option<&str> {
        self.fields.get(column).and_then(Value::as_str)
    }

    pub fn integer(&self, column: &str) -> Option<i64> {
        self.fields.get(column).and_then(Value::as_i64)
    }

    pub fn boolean(&self, column: &str) -> Option<bool> {
        self.fields.get(column).and_then(Value::as_bool)
    }
}

/// The operations the synchronization engine needs from relational storage.
///
/// No call spans another: each one commits on its own unless the
/// implementation is itself a [`UnitOfWork`].
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Inserts a row and returns its generated identifier.
    async fn insert(&self, table: Table, fields: Fields) -> Result<String, StoreError>;

    /// Overwrites the given columns of an existing row.
    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<(), StoreError>;

    async fn find(&self, table: Table, id: &str) -> Result<Option<StoredRow>, StoreError>;

    /// Rows whose parent column equals `parent_id`, by position when the
    /// table is ordered, otherwise in insertion order.
    async fn select_children(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<Vec<StoredRow>, StoreError>;

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError>;

    async fn delete_many(&self, table: Table, ids: &[String]) -> Result<u64, StoreError>;

    async fn delete_all_for_parent(&self, table: Table, parent_id: &str)
    -> Result<u64, StoreError>;
}

/// A store able to group many calls under one commit boundary.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError>;
}

#[async_trait]
pub trait UnitOfWork: RelationalStore {
    fn as_store(&self) -> &dyn RelationalStore;
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Fills every column of `table` absent from `fields` with `Null`.
pub(crate) fn complete_fields(table: Table, mut fields: Fields) -> Fields {
    for column in table.columns() {
        fields.entry(column.name).or_insert(Value::Null);
    }
    fields
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn check_fields_rejects_unknown_columns() {
        let mut fields = Fields::new();
        fields.insert("title".into(), json!("Intro"));
        assert!(Table::Sections.check_fields(&fields).is_ok());

        fields.insert("video_url".into(), json!("x"));
        let err = Table::Sections.check_fields(&fields).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { column, .. } if column == "video_url"));
    }

    #[test]
    fn curriculum_levels_chain_downwards() {
        assert_eq!(Table::Sections.child(), Some(Table::Lessons));
        assert_eq!(Table::Lessons.child(), Some(Table::Resources));
        assert_eq!(Table::Resources.child(), None);
        assert!(Table::Lessons.is_ordered());
        assert!(!Table::Resources.is_ordered());
        assert!(!Table::CategoryLinks.is_ordered());
    }
}
