//! Full-replace reconciliation for the course's flat child collections.
//!
//! Rows in these tables carry nothing but their value (and position), so the
//! persisted collection is dropped and rewritten from the desired one on
//! every synchronization. Row ids are therefore not stable across saves.

use std::collections::HashSet;

use serde_json::json;

use crate::store::{Fields, RelationalStore, StoreOp, Table};
use crate::sync::{StoreResultExt, SyncError};

/// The ordered text lists hanging off a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedList {
    Requirements,
    LearningOutcomes,
}

impl OrderedList {
    pub fn table(&self) -> Table {
        match self {
            OrderedList::Requirements => Table::Requirements,
            OrderedList::LearningOutcomes => Table::LearningOutcomes,
        }
    }
}

async fn clear(
    store: &dyn RelationalStore,
    table: Table,
    course_id: &str,
) -> Result<(), SyncError> {
    store
        .delete_all_for_parent(table, course_id)
        .await
        .context(table, StoreOp::DeleteAllForParent, format!("course {}", course_id))?;
    Ok(())
}

/// Replaces the course's category links with `category_ids`.
///
/// Duplicates collapse to one link. Returns the number of links written.
pub async fn sync_category_links(
    store: &dyn RelationalStore,
    course_id: &str,
    category_ids: &[String],
) -> Result<usize, SyncError> {
    let table = Table::CategoryLinks;
    clear(store, table, course_id).await?;

    let mut seen = HashSet::new();
    for category_id in category_ids.iter().filter(|id| seen.insert(id.as_str())) {
        let mut fields = Fields::new();
        fields.insert("course_id".into(), json!(course_id));
        fields.insert("category_id".into(), json!(category_id));
        store
            .insert(table, fields)
            .await
            .context(table, StoreOp::Insert, format!("category {}", category_id))?;
    }
    Ok(seen.len())
}

/// Replaces one ordered list, stamping `position` from the array index.
pub async fn sync_ordered_list(
    store: &dyn RelationalStore,
    list: OrderedList,
    course_id: &str,
    items: &[String],
) -> Result<usize, SyncError> {
    let table = list.table();
    clear(store, table, course_id).await?;

    for (position, item) in items.iter().enumerate() {
        let mut fields = Fields::new();
        fields.insert("course_id".into(), json!(course_id));
        fields.insert("content".into(), json!(item.trim()));
        fields.insert("position".into(), json!(position));
        store
            .insert(table, fields)
            .await
            .context(table, StoreOp::Insert, format!("position {}", position))?;
    }
    Ok(items.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn linked(store: &MemoryStore) -> Vec<String> {
        store
            .rows(Table::CategoryLinks)
            .iter()
            .filter_map(|r| r.text("category_id").map(str::to_string))
            .collect()
    }

    #[tokio::test]
    async fn test_category_set_is_fully_replaced() {
        let store = MemoryStore::new();

        sync_category_links(&store, "c1", &strings(&["A", "B"])).await.unwrap();
        assert_eq!(linked(&store), strings(&["A", "B"]));

        sync_category_links(&store, "c1", &strings(&["B", "C"])).await.unwrap();
        assert_eq!(linked(&store), strings(&["B", "C"]));
    }

    #[tokio::test]
    async fn test_duplicate_categories_collapse() {
        let store = MemoryStore::new();
        let written = sync_category_links(&store, "c1", &strings(&["A", "A", "B"]))
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(store.count(Table::CategoryLinks), 2);
    }

    #[tokio::test]
    async fn test_ordered_list_positions_follow_array_order() {
        let store = MemoryStore::new();
        sync_ordered_list(&store, OrderedList::Requirements, "c1", &strings(&["x", "y", "z"]))
            .await
            .unwrap();
        sync_ordered_list(&store, OrderedList::Requirements, "c1", &strings(&["z", "x"]))
            .await
            .unwrap();

        let rows = store.select_children(Table::Requirements, "c1").await.unwrap();
        let items: Vec<(Option<&str>, Option<i64>)> = rows
            .iter()
            .map(|r| (r.text("content"), r.integer("position")))
            .collect();
        assert_eq!(items, vec![(Some("z"), Some(0)), (Some("x"), Some(1))]);
        assert_eq!(store.count(Table::LearningOutcomes), 0);
    }

    #[tokio::test]
    async fn test_insert_failure_leaves_deletes_committed() {
        let store = MemoryStore::new();
        sync_category_links(&store, "c1", &strings(&["A"])).await.unwrap();
        store.fail_on(Table::CategoryLinks, StoreOp::Insert, 0);

        let err = sync_category_links(&store, "c1", &strings(&["B"])).await.unwrap_err();
        assert!(matches!(err, SyncError::Persistence { op: StoreOp::Insert, .. }));
        assert_eq!(store.count(Table::CategoryLinks), 0);
    }
}
