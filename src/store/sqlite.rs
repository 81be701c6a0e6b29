use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Executor, Row, Sqlite, SqliteConnection, SqlitePool, Transaction};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::store::{
    ColumnKind, Fields, RelationalStore, StoreError, StoredRow, Table, TransactionalStore,
    UnitOfWork,
};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A SQL statement with its positional bind values.
struct Statement {
    sql: String,
    binds: Vec<Value>,
}

impl Statement {
    fn insert(table: Table, id: &str, fields: Fields) -> Result<Self, StoreError> {
        table.check_fields(&fields)?;
        let mut columns = vec!["id".to_string()];
        let mut binds = vec![Value::String(id.to_string())];
        for (column, value) in fields {
            columns.push(column);
            binds.push(value);
        }
        let placeholders = vec!["?"; columns.len()].join(", ");

        Ok(Self {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table.name(),
                columns.join(", "),
                placeholders
            ),
            binds,
        })
    }

    fn update(table: Table, id: &str, fields: Fields) -> Result<Self, StoreError> {
        table.check_fields(&fields)?;
        let mut assignments = Vec::with_capacity(fields.len());
        let mut binds = Vec::with_capacity(fields.len() + 1);
        for (column, value) in fields {
            assignments.push(format!("{} = ?", column));
            binds.push(value);
        }
        binds.push(Value::String(id.to_string()));

        Ok(Self {
            sql: format!(
                "UPDATE {} SET {} WHERE id = ?",
                table.name(),
                assignments.join(", ")
            ),
            binds,
        })
    }

    fn select(table: Table, filter_column: &str, value: &str) -> Self {
        let columns: Vec<&str> = table.columns().iter().map(|c| c.name).collect();
        let order = if table.is_ordered() {
            "position, rowid"
        } else {
            "rowid"
        };
        Self {
            sql: format!(
                "SELECT id, {} FROM {} WHERE {} = ? ORDER BY {}",
                columns.join(", "),
                table.name(),
                filter_column,
                order
            ),
            binds: vec![Value::String(value.to_string())],
        }
    }

    fn children(table: Table, parent_id: &str) -> Result<Self, StoreError> {
        let parent = table.parent_column().ok_or(StoreError::NoParent(table))?;
        Ok(Self::select(table, parent, parent_id))
    }

    fn delete(table: Table, id: &str) -> Self {
        Self {
            sql: format!("DELETE FROM {} WHERE id = ?", table.name()),
            binds: vec![Value::String(id.to_string())],
        }
    }

    fn delete_many(table: Table, ids: &[String]) -> Self {
        let placeholders = vec!["?"; ids.len()].join(", ");
        Self {
            sql: format!("DELETE FROM {} WHERE id IN ({})", table.name(), placeholders),
            binds: ids.iter().cloned().map(Value::String).collect(),
        }
    }

    fn delete_for_parent(table: Table, parent_id: &str) -> Result<Self, StoreError> {
        let parent = table.parent_column().ok_or(StoreError::NoParent(table))?;
        Ok(Self {
            sql: format!("DELETE FROM {} WHERE {} = ?", table.name(), parent),
            binds: vec![Value::String(parent_id.to_string())],
        })
    }

    fn query(&self) -> SqliteQuery<'_> {
        self.binds
            .iter()
            .fold(sqlx::query(&self.sql), |query, value| bind_value(query, value))
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

fn decode_row(table: Table, row: &SqliteRow) -> Result<StoredRow, StoreError> {
    let id: String = row.try_get("id")?;
    let mut fields = Fields::new();
    for column in table.columns() {
        let value = match column.kind {
            ColumnKind::Text => row.try_get::<Option<String>, _>(column.name)?.map(Value::from),
            ColumnKind::Integer => row.try_get::<Option<i64>, _>(column.name)?.map(Value::from),
            ColumnKind::Boolean => row.try_get::<Option<bool>, _>(column.name)?.map(Value::from),
        };
        fields.insert(column.name.to_string(), value.unwrap_or(Value::Null));
    }
    Ok(StoredRow { id, fields })
}

async fn execute<'c, E>(executor: E, stmt: &Statement) -> Result<u64, StoreError>
where
    E: Executor<'c, Database = Sqlite>,
{
    debug!("sql: {}", stmt.sql);
    Ok(stmt.query().execute(executor).await?.rows_affected())
}

async fn fetch<'c, E>(
    executor: E,
    table: Table,
    stmt: &Statement,
) -> Result<Vec<StoredRow>, StoreError>
where
    E: Executor<'c, Database = Sqlite>,
{
    debug!("sql: {}", stmt.sql);
    stmt.query()
        .fetch_all(executor)
        .await?
        .iter()
        .map(|row| decode_row(table, row))
        .collect()
}

fn expect_one(table: Table, id: &str, affected: u64) -> Result<(), StoreError> {
    if affected == 0 {
        return Err(StoreError::NotFound {
            table,
            id: id.to_string(),
        });
    }
    Ok(())
}

/// [`RelationalStore`] over a SQLite pool; every call commits on its own.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqlitePool,
}

impl SqliteStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RelationalStore for SqliteStore {
    async fn insert(&self, table: Table, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        execute(&self.db, &Statement::insert(table, &id, fields)?).await?;
        Ok(id)
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<(), StoreError> {
        let affected = execute(&self.db, &Statement::update(table, id, fields)?).await?;
        expect_one(table, id, affected)
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<StoredRow>, StoreError> {
        let rows = fetch(&self.db, table, &Statement::select(table, "id", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn select_children(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<Vec<StoredRow>, StoreError> {
        fetch(&self.db, table, &Statement::children(table, parent_id)?).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        execute(&self.db, &Statement::delete(table, id)).await?;
        Ok(())
    }

    async fn delete_many(&self, table: Table, ids: &[String]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        execute(&self.db, &Statement::delete_many(table, ids)).await
    }

    async fn delete_all_for_parent(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<u64, StoreError> {
        execute(&self.db, &Statement::delete_for_parent(table, parent_id)?).await
    }
}

#[async_trait]
impl TransactionalStore for SqliteStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, StoreError> {
        let tx = self.db.begin().await?;
        Ok(Box::new(SqliteUnitOfWork {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

/// A SQLite transaction exposed as a [`RelationalStore`].
///
/// Nothing written through it is visible to other connections until
/// [`UnitOfWork::commit`]; dropping it without committing rolls back.
pub struct SqliteUnitOfWork {
    tx: Mutex<Option<Transaction<'static, Sqlite>>>,
}

impl SqliteUnitOfWork {
    async fn run(&self, stmt: Statement) -> Result<u64, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let conn: &mut SqliteConnection = tx;
        execute(conn, &stmt).await
    }

    async fn read(&self, table: Table, stmt: Statement) -> Result<Vec<StoredRow>, StoreError> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or(StoreError::Finished)?;
        let conn: &mut SqliteConnection = tx;
        fetch(conn, table, &stmt).await
    }

    async fn take(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        self.tx.lock().await.take().ok_or(StoreError::Finished)
    }
}

#[async_trait]
impl RelationalStore for SqliteUnitOfWork {
    async fn insert(&self, table: Table, fields: Fields) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.run(Statement::insert(table, &id, fields)?).await?;
        Ok(id)
    }

    async fn update(&self, table: Table, id: &str, fields: Fields) -> Result<(), StoreError> {
        let affected = self.run(Statement::update(table, id, fields)?).await?;
        expect_one(table, id, affected)
    }

    async fn find(&self, table: Table, id: &str) -> Result<Option<StoredRow>, StoreError> {
        let rows = self.read(table, Statement::select(table, "id", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn select_children(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<Vec<StoredRow>, StoreError> {
        self.read(table, Statement::children(table, parent_id)?).await
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        self.run(Statement::delete(table, id)).await?;
        Ok(())
    }

    async fn delete_many(&self, table: Table, ids: &[String]) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.run(Statement::delete_many(table, ids)).await
    }

    async fn delete_all_for_parent(
        &self,
        table: Table,
        parent_id: &str,
    ) -> Result<u64, StoreError> {
        self.run(Statement::delete_for_parent(table, parent_id)?).await
    }
}

#[async_trait]
impl UnitOfWork for SqliteUnitOfWork {
    fn as_store(&self) -> &dyn RelationalStore {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.take().await?.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.take().await?.rollback().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create test db");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn instructor(name: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields.insert("created_at".into(), json!("2026-01-01T00:00:00Z"));
        fields
    }

    #[test]
    fn test_insert_statement_lists_id_first() {
        let stmt = Statement::insert(Table::Instructors, "i1", instructor("Ada")).unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO instructors (id, created_at, name) VALUES (?, ?, ?)"
        );
        assert_eq!(stmt.binds[0], json!("i1"));
    }

    #[tokio::test]
    async fn test_insert_find_and_update() {
        let store = SqliteStore::new(setup_test_db().await);

        let id = store.insert(Table::Instructors, instructor("Ada")).await.unwrap();
        let row = store.find(Table::Instructors, &id).await.unwrap().unwrap();
        assert_eq!(row.text("name"), Some("Ada"));
        assert_eq!(row.fields["bio"], Value::Null);

        let mut patch = Fields::new();
        patch.insert("bio".into(), json!("Mathematician"));
        store.update(Table::Instructors, &id, patch).await.unwrap();

        let row = store.find(Table::Instructors, &id).await.unwrap().unwrap();
        assert_eq!(row.text("bio"), Some("Mathematician"));
        assert_eq!(row.text("name"), Some("Ada"));
    }

    #[tokio::test]
    async fn test_update_missing_row_is_not_found() {
        let store = SqliteStore::new(setup_test_db().await);
        let err = store
            .update(Table::Instructors, "missing", instructor("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_rolled_back_unit_of_work_leaves_nothing() {
        let store = SqliteStore::new(setup_test_db().await);

        let uow = store.begin().await.unwrap();
        let id = uow.insert(Table::Instructors, instructor("Ada")).await.unwrap();
        assert!(uow.find(Table::Instructors, &id).await.unwrap().is_some());
        uow.rollback().await.unwrap();

        assert!(store.find(Table::Instructors, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_committed_unit_of_work_is_visible() {
        let store = SqliteStore::new(setup_test_db().await);

        let uow = store.begin().await.unwrap();
        let id = uow.insert(Table::Instructors, instructor("Ada")).await.unwrap();
        uow.commit().await.unwrap();

        assert!(store.find(Table::Instructors, &id).await.unwrap().is_some());
    }
}
