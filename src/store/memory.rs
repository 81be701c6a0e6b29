use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::{
    Fields, RelationalStore, StoreError, StoreOp, StoredRow, Table, complete_fields,
};

/// One call recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub op: StoreOp,
    pub table: Table,
    /// Row id, parent id or comma-joined id set, depending on `op`.
    pub target: String,
}

#[derive(Debug, Clone, Copy)]
struct FailurePlan {
    table: Table,
    op: StoreOp,
    skip: usize,
}

#[derive(Default)]
struct State {
    tables: HashMap<Table, Vec<StoredRow>>,
    log: Vec<Operation>,
    failure: Option<FailurePlan>,
}

/// In-process [`RelationalStore`] keeping rows in insertion order.
///
/// Every call is logged, and a single failure can be armed with
/// [`MemoryStore::fail_on`] to exercise partial-failure paths.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the `skip + 1`-th matching call fail with `StoreError::Unavailable`.
    pub fn fail_on(&self, table: Table, op: StoreOp, skip: usize) {
        self.state().failure = Some(FailurePlan { table, op, skip });
    }

    pub fn rows(&self, table: Table) -> Vec<StoredRow> {
        self.state().tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: Table, id: &str) -> Option<StoredRow> {
        self.state()
            .tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned())
    }

    pub fn count(&self, table: Table) -> usize {
        self.state().tables.get(&table).map_or(0, Vec::len)
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.state().log.clone()
    }

    /// Write operations (insert/update/delete) recorded against `table`.
    pub fn writes_to(&self, table: Table) -> Vec<Operation> {
        self.state()
            .log
            .iter()
            .filter(|o| o.table == table && o.op.is_write())
            .cloned()
            .collect()
    }

    pub fn clear_operations(&self) {
        self.state().log.clear();
    }

    /// Logs the call and trips the armed failure if it matches.
    fn record(
        &self,
        state: &mut State,
        op: StoreOp,
        table: Table,
        target: String,
    ) -> Result<(), StoreError> {
        if let Some(plan) = state.failure.as_mut() {
            if plan.table == table && plan.op == op {
                if plan.skip == 0 {
                    state.failure = None;
                    return Err(StoreError::Unavailable(format!(
                        "injected failure on {} {} ({})",
                        op, table, target
                    )));
                }
                plan.skip -= 1;
            }
        }
        state.log.push(Operation { op, table, target });
        Ok(())
    }
}

fn parent_of(table: Table, row: &StoredRow) -> Option<&str> {
    table.parent_column().and_then(|column| row.text(column))
}

#[async_trait]
impl RelationalStore for MemoryStore {
    async fn insert(&self, table: Table, fields: Fields) -> Result<String, StoreError> {
        table.check_fields(&fields)?;
        let mut state = self.state();
        let id = Uuid::new_v4().to_string();
        self.record(&mut state, StoreOp::Insert, table, id.clone())?;

        state.tables.entry(table).or_default().push(StoredRow {
            id: id.clone(),
            fields: complete_fields(table, fields),
        });
        Ok(id)
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<(), StoreError> {
        table.check_fields(&fields)?;
        let mut state = self.state();
        self.record(&mut state, StoreOp::Update, table, id.to_string())?;

        let row = state
            .tables
            .get_mut(&table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| StoreError::NotFound {
                table,
                id: id.to_string(),
            })?;
        row.fields.extend(fields);
        Ok(())
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<StoredRow>, StoreError> {
        let mut state = self.state();
        self.record(&mut state, StoreOp::Find, table, id.to_string())?;

        Ok(state
            .tables
            .get(&table)
            .and_then(|rows| rows.iter().find(|r| r.id == id).cloned()))
    }

    async fn select_children(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<Vec<StoredRow>, StoreError> {
        if table.parent_column().is_none() {
            return Err(StoreError::NoParent(table));
        }
        let mut state = self.state();
        self.record(&mut state, StoreOp::SelectChildren, table, parent_id.to_string())?;

        let mut rows: Vec<StoredRow> = state
            .tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| parent_of(table, r) == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if table.is_ordered() {
            // stable sort keeps insertion order between equal positions
            rows.sort_by_key(|r| r.integer("position").unwrap_or(i64::MAX));
        }
        Ok(rows)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        self.record(&mut state, StoreOp::Delete, table, id.to_string())?;

        if let Some(rows) = state.tables.get_mut(&table) {
            rows.retain(|r| r.id != id);
        }
        Ok(())
    }

    async fn delete_many(&self, table: Table, ids: &[String]) -> Result<u64, StoreError> {
        let mut state = self.state();
        self.record(&mut state, StoreOp::DeleteMany, table, ids.join(","))?;

        let Some(rows) = state.tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !ids.contains(&r.id));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all_for_parent(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<u64, StoreError> {
        if table.parent_column().is_none() {
            return Err(StoreError::NoParent(table));
        }
        let mut state = self.state();
        self.record(&mut state, StoreOp::DeleteAllForParent, table, parent_id.to_string())?;

        let Some(rows) = state.tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| parent_of(table, r) != Some(parent_id));
        Ok((before - rows.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn section(course_id: &str, title: &str, position: i64) -> Fields {
        let mut fields = Fields::new();
        fields.insert("course_id".into(), json!(course_id));
        fields.insert("title".into(), json!(title));
        fields.insert("position".into(), json!(position));
        fields
    }

    #[tokio::test]
    async fn test_select_children_orders_by_position() {
        let store = MemoryStore::new();
        let second = store.insert(Table::Sections, section("c1", "Second", 1)).await.unwrap();
        let first = store.insert(Table::Sections, section("c1", "First", 0)).await.unwrap();
        store.insert(Table::Sections, section("c2", "Other", 0)).await.unwrap();

        let rows = store.select_children(Table::Sections, "c1").await.unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![first.as_str(), second.as_str()]);
        assert_eq!(rows[0].fields["description"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .update(Table::Sections, "missing", section("c1", "x", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_injected_failure_fires_once_after_skips() {
        let store = MemoryStore::new();
        store.fail_on(Table::Sections, StoreOp::Insert, 1);

        assert!(store.insert(Table::Sections, section("c1", "a", 0)).await.is_ok());
        assert!(matches!(
            store.insert(Table::Sections, section("c1", "b", 1)).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.insert(Table::Sections, section("c1", "c", 2)).await.is_ok());
        assert_eq!(store.count(Table::Sections), 2);
    }

    #[tokio::test]
    async fn test_delete_all_for_parent_only_touches_that_parent() {
        let store = MemoryStore::new();
        store.insert(Table::Sections, section("c1", "a", 0)).await.unwrap();
        store.insert(Table::Sections, section("c2", "b", 0)).await.unwrap();

        let removed = store.delete_all_for_parent(Table::Sections, "c1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Table::Sections), 1);
        assert_eq!(store.writes_to(Table::Sections).len(), 3);
    }
}
